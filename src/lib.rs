//! Parser and simulator for a small combinational HDL.
//!
//! Chips are built from the gates `Nand`, `Not`, `And` and `Or` and from
//! other chips. Chips referenced by a part are loaded on first use through
//! an [`HdlProvider`].

pub mod error;
pub mod parser;
pub mod primitive;
pub mod registry;
pub mod scanner;
pub mod signalmap;
pub mod simulator;
pub mod test_runner;
pub mod vectors;

pub use crate::error::{error_kind, ErrorKind, N2VError, TransformedError};
pub use crate::parser::{
    parse_hdl, parse_hdl_path, ChipDefinition, ChipInstance, Connection, FileReader, HdlProvider,
};
pub use crate::primitive::Primitive;
pub use crate::registry::Registry;
pub use crate::signalmap::SignalMap;
pub use crate::simulator::{Simulator, TruthRow, TruthTable, DEFAULT_MAX_ITERATIONS};
pub use crate::test_runner::{run_tests, run_vectors, CaseResult, TestReport};
pub use crate::vectors::{parse_vectors, read_vectors, TestVector, VectorFile};

use rust_embed::RustEmbed;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

#[derive(RustEmbed)]
#[folder = "resources/chips"]
struct HdlAsset;

/// Serves the bundled chip library.
pub struct EmbedReader;

impl HdlProvider for EmbedReader {
    fn get_hdl(&self, path: &str) -> Result<String, std::io::Error> {
        match HdlAsset::get(path) {
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Unable to get HDL for {}", path),
            )),
            Some(hdl_asset) => match std::str::from_utf8(hdl_asset.data.as_ref()) {
                Ok(s) => Ok(String::from(s)),
                Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            },
        }
    }

    fn get_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(file_name)
    }
}

fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Simulates HDL text against a JSON object of input values, e.g.
/// `{"a": 1, "b": 0}`. Returns the outputs as a JSON object.
#[wasm_bindgen]
pub fn simulate(s: &str, inputs: &str) -> Result<String, JsValue> {
    set_panic_hook();
    simulate_internal(s, inputs, Rc::new(EmbedReader)).map_err(|e| JsValue::from(e.to_string()))
}

/// Returns the full truth table of HDL text as JSON.
#[wasm_bindgen]
pub fn full_table(s: &str) -> Result<String, JsValue> {
    set_panic_hook();
    let table = match full_table_internal(s, Rc::new(EmbedReader)) {
        Ok(x) => x,
        Err(e) => {
            return Err(JsValue::from(e.to_string()));
        }
    };
    serde_json::to_string(&table).map_err(|e| JsValue::from(e.to_string()))
}

pub fn simulate_internal(
    s: &str,
    inputs: &str,
    provider: Rc<dyn HdlProvider>,
) -> Result<String, Box<dyn Error>> {
    let mut simulator = Simulator::new(provider);
    let chip = simulator.parse(s, Path::new(""), None)?;
    let chip_inputs: SignalMap = match serde_json::from_str(inputs) {
        Ok(x) => x,
        Err(e) => {
            return Err(Box::new(N2VError {
                msg: format!("Unable to parse inputs {}: {}", inputs, e),
                kind: ErrorKind::Other,
            }));
        }
    };
    let outputs = simulator.simulate(&chip, &chip_inputs)?;
    Ok(serde_json::to_string(&outputs)?)
}

pub fn full_table_internal(
    s: &str,
    provider: Rc<dyn HdlProvider>,
) -> Result<TruthTable, Box<dyn Error>> {
    let mut simulator = Simulator::new(provider);
    let chip = simulator.parse(s, Path::new(""), None)?;
    simulator.truth_table(&chip)
}

#[cfg(test)]
mod libtest {
    use super::*;

    use std::env;

    const HALF_ADDER: &str = "
        CHIP HalfAdder {
            IN a, b;
            OUT sum, carry;
            PARTS:
            Xor(a=a, b=b, out=sum);
            And(a=a, b=b, out=carry);
        }";

    #[test]
    fn test_embedded_library() {
        let reader = EmbedReader;
        for name in ["Xor", "Mux", "DMux", "HalfAdder", "FullAdder", "Or4Way"] {
            let hdl = reader
                .get_hdl(&parser::hdl_file_name(name))
                .expect("missing embedded chip");
            let chip = parse_hdl(&hdl, Path::new(""), Some(name)).expect("Parse error");
            assert_eq!(chip.name, name);
        }
        assert!(reader.get_hdl("Nope.hdl").is_err());
    }

    #[test]
    fn test_simulate_internal() {
        let outputs = simulate_internal(HALF_ADDER, r#"{"a": 1, "b": 1}"#, Rc::new(EmbedReader))
            .expect("simulation failure");
        assert_eq!(outputs, r#"{"carry":1,"sum":0}"#);

        let e = simulate_internal(HALF_ADDER, r#"{"a": 5}"#, Rc::new(EmbedReader)).unwrap_err();
        assert!(e.to_string().contains("Unable to parse inputs"));

        assert!(simulate_internal("CHIP", "{}", Rc::new(EmbedReader)).is_err());
    }

    #[test]
    fn test_full_table_internal() {
        let table = full_table_internal(HALF_ADDER, Rc::new(EmbedReader)).expect("table failure");
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[2].outputs, SignalMap::from([("sum", true), ("carry", false)]));
    }

    #[test]
    fn test_full_table_from_files() {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let base_path = manifest_dir.join("resources").join("chips");
        let provider = Rc::new(FileReader::new(&base_path));
        let contents = provider.get_hdl("FullAdder.hdl").unwrap();
        let table = full_table_internal(&contents, provider).unwrap();
        assert_eq!(table.rows.len(), 8);
        let carries = table.rows.iter().filter(|r| r.outputs.get("carry")).count();
        assert_eq!(carries, 4);
    }
}
