//! Runs test vectors through the simulator and collects the results.

use std::error::Error;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::parser::ChipDefinition;
use crate::signalmap::SignalMap;
use crate::simulator::Simulator;
use crate::vectors::{read_vectors, VectorFile};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CaseResult {
    /// Line of the vector in its file.
    pub line: usize,
    pub inputs: SignalMap,
    pub expected: SignalMap,
    pub actual: SignalMap,
    pub passed: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TestReport {
    pub chip: String,
    pub passed: usize,
    pub total: usize,
    pub cases: Vec<CaseResult>,
}

impl TestReport {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.passed)
    }
}

const RULE: &str = "==================================================";

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Testing {} chip", self.chip)?;
        writeln!(f, "{}", RULE)?;
        if self.cases.is_empty() {
            writeln!(f, "No test cases found!")?;
        }
        for (i, case) in self.cases.iter().enumerate() {
            let status = if case.passed { "PASS" } else { "FAIL" };
            writeln!(f, "Test {}: {}", i + 1, status)?;
            writeln!(f, "  Inputs:   {}", case.inputs)?;
            writeln!(f, "  Expected: {}", case.expected)?;
            if !case.passed {
                writeln!(f, "  Actual:   {}", case.actual)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Summary: {}/{} tests passed", self.passed, self.total)
    }
}

/// Simulates every vector against `chip`. A case passes when each expected
/// pin has the expected value in the outputs, where absent pins read as 0.
pub fn run_vectors(
    sim: &mut Simulator,
    chip: &ChipDefinition,
    vectors: &VectorFile,
) -> Result<TestReport, Box<dyn Error>> {
    for name in &vectors.output_names {
        if !chip.is_output(name) {
            warn!(chip = chip.name.as_str(), pin = name.as_str(), "expected pin is not an output of the chip");
        }
    }

    let mut cases = Vec::with_capacity(vectors.vectors.len());
    for vector in &vectors.vectors {
        let actual = sim.simulate(chip, &vector.inputs)?;
        let passed = actual.satisfies(&vector.expected);
        cases.push(CaseResult {
            line: vector.line,
            inputs: vector.inputs.clone(),
            expected: vector.expected.clone(),
            actual,
            passed,
        });
    }

    let passed = cases.iter().filter(|c| c.passed).count();
    info!(chip = chip.name.as_str(), passed, total = cases.len(), "ran test vectors");

    Ok(TestReport {
        chip: chip.name.clone(),
        passed,
        total: cases.len(),
        cases,
    })
}

/// Parses the chip at `chip_path` and runs the vectors at `vectors_path`
/// against it.
pub fn run_tests(
    sim: &mut Simulator,
    chip_path: &Path,
    vectors_path: &Path,
) -> Result<TestReport, Box<dyn Error>> {
    let chip = sim.parse_file(chip_path)?;
    let vectors = read_vectors(vectors_path)?;
    run_vectors(sim, &chip, &vectors)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{error_kind, ErrorKind};
    use crate::parser::{FileReader, HdlProvider};
    use crate::vectors::parse_vectors;
    use std::env;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn resource_dir(name: &str) -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.join("resources").join(name)
    }

    fn simulator_for(path: &Path) -> Simulator {
        let base = path.parent().unwrap_or(Path::new("."));
        let provider: Rc<dyn HdlProvider> = Rc::new(FileReader::new(base));
        Simulator::new(provider)
    }

    #[test]
    fn test_chip_library_passes() {
        let chips = resource_dir("chips");
        for name in ["Xor", "Mux", "DMux", "HalfAdder", "FullAdder", "Or4Way"] {
            let chip_path = chips.join(format!("{}.hdl", name));
            let mut sim = simulator_for(&chip_path);
            let report = run_tests(&mut sim, &chip_path, &chips.join(format!("{}.tst", name)))
                .expect("test run failed");
            assert!(report.all_passed(), "{}", report);
            more_asserts::assert_gt!(report.total, 3);
        }
    }

    #[test]
    fn test_failing_chip() {
        let chip_path = resource_dir("tests").join("bad").join("BrokenAnd.hdl");
        let vectors_path = resource_dir("tests").join("vectors").join("And.tst");
        let mut sim = simulator_for(&chip_path);
        let report = run_tests(&mut sim, &chip_path, &vectors_path).expect("test run failed");

        assert_eq!(report.chip, "BrokenAnd");
        assert_eq!(report.total, 4);
        assert_eq!(report.passed, 2);
        assert!(!report.all_passed());

        let failed: Vec<usize> = report.failures().map(|c| c.line).collect();
        assert_eq!(failed, vec![6, 9]);
        assert_eq!(report.cases[1].actual, SignalMap::from([("out", true)]));

        let text = report.to_string();
        assert!(text.starts_with("Testing BrokenAnd chip\n"));
        assert!(text.contains("Test 2: FAIL\n  Inputs:   a=0, b=1\n  Expected: out=0\n  Actual:   out=1\n"));
        assert!(text.contains("Test 1: PASS\n  Inputs:   a=0, b=0\n  Expected: out=0\n\n"));
        assert!(text.ends_with("Summary: 2/4 tests passed\n"));
    }

    #[test]
    fn test_unchecked_pins() {
        let chip_path = resource_dir("chips").join("HalfAdder.hdl");
        let mut sim = simulator_for(&chip_path);
        let chip = sim.parse_file(&chip_path).expect("parse failed");

        // Only `carry` is checked, and `missing` reads as 0.
        let vectors = parse_vectors("a,b;carry,missing\n1,1;1,0\n0,1;0,0\n", None)
            .expect("bad vectors");
        let report = run_vectors(&mut sim, &chip, &vectors).expect("test run failed");
        assert!(report.all_passed());

        let vectors = parse_vectors("a,b;missing\n1,1;1\n", None).expect("bad vectors");
        let report = run_vectors(&mut sim, &chip, &vectors).expect("test run failed");
        assert_eq!(report.passed, 0);
    }

    #[test]
    fn test_empty_vector_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vectors_path = dir.path().join("Empty.tst");
        std::fs::write(&vectors_path, "").unwrap();

        let chip_path = resource_dir("chips").join("Xor.hdl");
        let mut sim = simulator_for(&chip_path);
        let report = run_tests(&mut sim, &chip_path, &vectors_path).expect("test run failed");
        assert_eq!(report.total, 0);
        assert!(report.all_passed());
        assert!(report.to_string().contains("No test cases found!"));
        assert!(report.to_string().ends_with("Summary: 0/0 tests passed\n"));
    }

    #[test]
    fn test_report_json() {
        let chip_path = resource_dir("chips").join("Xor.hdl");
        let mut sim = simulator_for(&chip_path);
        let chip = sim.parse_file(&chip_path).expect("parse failed");
        let vectors = parse_vectors("a,b;out\n1,0;1\n", None).expect("bad vectors");
        let report = run_vectors(&mut sim, &chip, &vectors).expect("test run failed");

        let json: serde_json::Value = serde_json::to_value(&report).expect("serialize failed");
        assert_eq!(json["chip"], "Xor");
        assert_eq!(json["passed"], 1);
        assert_eq!(json["total"], 1);
        assert_eq!(json["cases"][0]["inputs"]["a"], 1);
        assert_eq!(json["cases"][0]["actual"]["out"], 1);
        assert_eq!(json["cases"][0]["passed"], true);
    }

    #[test]
    fn test_errors_propagate() {
        let bad = resource_dir("tests").join("bad");
        let vectors_path = resource_dir("tests").join("vectors").join("And.tst");

        let chip_path = bad.join("UsesMissing.hdl");
        let mut sim = simulator_for(&chip_path);
        let e = run_tests(&mut sim, &chip_path, &vectors_path).unwrap_err();
        assert!(matches!(error_kind(e.as_ref()), Some(ErrorKind::UnknownChip(_))));

        let chip_path = bad.join("NoChip.hdl");
        let e = run_tests(&mut sim, &chip_path, &vectors_path).unwrap_err();
        assert!(matches!(error_kind(e.as_ref()), Some(ErrorKind::FormatError(_))));

        let chip_path = bad.join("DoesNotExist.hdl");
        let e = run_tests(&mut sim, &chip_path, &vectors_path).unwrap_err();
        assert!(matches!(error_kind(e.as_ref()), Some(ErrorKind::NotFound(_))));
    }
}
