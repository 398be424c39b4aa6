use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use bitvec::prelude::*;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{error_kind, ErrorKind, N2VError, TransformedError};
use crate::parser::*;
use crate::primitive::Primitive;
use crate::registry::Registry;
use crate::signalmap::SignalMap;

/// Passes over a chip's parts before giving up on the circuit settling.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Truth tables are limited to 2^16 rows.
pub const MAX_TABLE_INPUTS: usize = 16;

/// What a part's chip type is bound to at simulation time.
#[derive(Clone)]
enum Binding {
    Primitive(Primitive),
    Chip(Rc<ChipDefinition>),
}

/// A part with its chip type resolved and its connections split by the
/// direction of the pin they name.
struct ScheduledPart<'a> {
    part: &'a ChipInstance,
    binding: Binding,
    inputs: Vec<&'a Connection>,
    outputs: Vec<&'a Connection>,
}

/// Evaluates chip definitions.
///
/// The simulator owns the registry of known chips. Chip types that are not
/// registered yet are loaded through the HDL provider the first time a part
/// refers to them.
pub struct Simulator {
    registry: Registry,
    provider: Rc<dyn HdlProvider>,
    max_iterations: usize,
}

impl Simulator {
    pub fn new(provider: Rc<dyn HdlProvider>) -> Simulator {
        Simulator::with_registry(Registry::new(), provider)
    }

    pub fn with_registry(registry: Registry, provider: Rc<dyn HdlProvider>) -> Simulator {
        Simulator {
            registry,
            provider,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Simulator {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parses HDL text and registers the chip.
    pub fn parse(
        &mut self,
        source: &str,
        path: &Path,
        expected_name: Option<&str>,
    ) -> Result<Rc<ChipDefinition>, Box<dyn Error>> {
        self.registry.parse(source, path, expected_name)
    }

    /// Parses an HDL file and registers the chip. The expected chip name is
    /// the file stem.
    pub fn parse_file(&mut self, hdl_path: &Path) -> Result<Rc<ChipDefinition>, Box<dyn Error>> {
        let contents = read_hdl(hdl_path)?;
        let expected_name = hdl_path.file_stem().and_then(|s| s.to_str());
        self.parse(&contents, hdl_path, expected_name)
    }

    /// Looks up a chip type in the registry, loading it through the provider
    /// if needed. A chip with no source unit is an unknown chip.
    pub fn resolve(&mut self, name: &str) -> Result<Rc<ChipDefinition>, Box<dyn Error>> {
        match self.registry.resolve(name, self.provider.as_ref()) {
            Ok(chip) => Ok(chip),
            Err(e) => {
                if let Some(ErrorKind::NotFound(_)) = error_kind(e.as_ref()) {
                    return Err(Box::new(TransformedError {
                        msg: format!("Unknown chip type: {}", name),
                        kind: ErrorKind::UnknownChip(String::from(name)),
                        source: Some(e),
                    }));
                }
                Err(e)
            }
        }
    }

    /// Computes the outputs of `chip` for the given inputs.
    ///
    /// Inputs that are not given read as 0, and names that are not inputs
    /// of the chip are ignored. The result holds exactly the chip's outputs.
    pub fn simulate(
        &mut self,
        chip: &ChipDefinition,
        inputs: &SignalMap,
    ) -> Result<SignalMap, Box<dyn Error>> {
        for name in inputs.signals() {
            if !chip.is_input(&name) {
                debug!(chip = chip.name.as_str(), signal = name.as_str(), "ignoring undeclared input");
            }
        }

        let mut chain = Vec::new();
        self.simulate_chip(chip, inputs, &mut chain)
    }

    // `chain` holds the chip types currently being simulated, outermost first.
    fn simulate_chip(
        &mut self,
        chip: &ChipDefinition,
        inputs: &SignalMap,
        chain: &mut Vec<String>,
    ) -> Result<SignalMap, Box<dyn Error>> {
        if chip.is_primitive() {
            if let Some(p) = Primitive::from_name(&chip.name) {
                return Ok(SignalMap::from([(p.output(), p.eval(inputs))]));
            }
        }

        if chain.contains(&chip.name) {
            let mut cycle = chain.clone();
            cycle.push(chip.name.clone());
            let msg = format!("Chip {} instantiates itself: {}", chip.name, cycle.join(" -> "));
            return Err(Box::new(N2VError::new(msg, ErrorKind::CyclicDefinition(cycle))));
        }

        chain.push(chip.name.clone());
        let result = self.relax(chip, inputs, chain);
        chain.pop();
        result
    }

    /// Evaluates the parts of a composite chip until a full pass changes no
    /// signal.
    fn relax(
        &mut self,
        chip: &ChipDefinition,
        inputs: &SignalMap,
        chain: &mut Vec<String>,
    ) -> Result<SignalMap, Box<dyn Error>> {
        let schedule = self.schedule(chip)?;

        let mut env = SignalMap::new();
        for pin in &chip.inputs {
            env.insert(pin, inputs.get(pin));
        }
        for signal in &chip.internal_signals {
            env.insert(signal, false);
        }
        for pin in &chip.outputs {
            if !env.contains(pin) {
                env.insert(pin, false);
            }
        }

        // Last inputs and outputs of each part. A part whose inputs did not
        // change is not evaluated again, but its outputs are still written.
        let mut last: Vec<Option<(SignalMap, SignalMap)>> = vec![None; schedule.len()];

        let mut passes = 0;
        let mut stable = false;
        while passes < self.max_iterations {
            passes += 1;
            let mut changed = false;

            for (idx, scheduled) in schedule.iter().enumerate() {
                let part_inputs: SignalMap = scheduled
                    .inputs
                    .iter()
                    .map(|c| (c.destination.clone(), env.get(&c.source)))
                    .collect();

                let cached = match &last[idx] {
                    Some((prev_inputs, prev_outputs)) if *prev_inputs == part_inputs => {
                        Some(prev_outputs.clone())
                    }
                    _ => None,
                };

                let part_outputs = match cached {
                    Some(x) => x,
                    None => {
                        let computed = self.evaluate(scheduled, &part_inputs, chain)?;
                        last[idx] = Some((part_inputs, computed.clone()));
                        computed
                    }
                };

                for c in &scheduled.outputs {
                    if env.set(&c.source, part_outputs.get(&c.destination)) {
                        changed = true;
                    }
                }
            }

            if !changed {
                stable = true;
                break;
            }
        }

        if !stable {
            return Err(Box::new(N2VError::new(
                format!(
                    "Chip {} did not settle after {} passes. The circuit may contain a combinational loop.",
                    chip.name, passes
                ),
                ErrorKind::DidNotConverge {
                    chip: chip.name.clone(),
                    iterations: passes,
                },
            )));
        }

        trace!(chip = chip.name.as_str(), passes, "settled");

        Ok(chip
            .outputs
            .iter()
            .map(|pin| (pin.clone(), env.get(pin)))
            .collect())
    }

    fn evaluate(
        &mut self,
        scheduled: &ScheduledPart,
        inputs: &SignalMap,
        chain: &mut Vec<String>,
    ) -> Result<SignalMap, Box<dyn Error>> {
        match &scheduled.binding {
            Binding::Primitive(p) => Ok(SignalMap::from([(p.output(), p.eval(inputs))])),
            Binding::Chip(def) => {
                let def = Rc::clone(def);
                self.simulate_chip(&def, inputs, chain)
            }
        }
    }

    /// Binds every part of `chip` and orders the parts so that a part comes
    /// after the parts that write its inputs. When the parts feed back into
    /// each other, declaration order is kept.
    fn schedule<'a>(
        &mut self,
        chip: &'a ChipDefinition,
    ) -> Result<Vec<ScheduledPart<'a>>, Box<dyn Error>> {
        let mut parts = Vec::with_capacity(chip.parts.len());
        for part in &chip.parts {
            parts.push(self.bind(part)?);
        }

        let mut graph: Graph<usize, String> = Graph::new();
        let nodes: Vec<NodeIndex> = (0..parts.len()).map(|i| graph.add_node(i)).collect();

        let mut writers: HashMap<&str, Vec<NodeIndex>> = HashMap::new();
        for (idx, scheduled) in parts.iter().enumerate() {
            for c in &scheduled.outputs {
                writers.entry(c.source.as_str()).or_default().push(nodes[idx]);
            }
        }

        for (idx, scheduled) in parts.iter().enumerate() {
            for c in &scheduled.inputs {
                if let Some(sources) = writers.get(c.source.as_str()) {
                    for source in sources {
                        graph.add_edge(*source, nodes[idx], c.source.clone());
                    }
                }
            }
        }

        let order: Vec<usize> = match toposort(&graph, None) {
            Ok(sorted) => sorted.iter().map(|n| graph[*n]).collect(),
            Err(cycle) => {
                debug!(
                    chip = chip.name.as_str(),
                    part = parts[graph[cycle.node_id()]].part.name.as_str(),
                    "parts form a feedback loop, keeping declaration order"
                );
                (0..parts.len()).collect()
            }
        };

        let mut slots: Vec<Option<ScheduledPart>> = parts.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect())
    }

    fn bind<'a>(&mut self, part: &'a ChipInstance) -> Result<ScheduledPart<'a>, Box<dyn Error>> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        // Gate names always mean the gate, even if a composite chip with the
        // same name has been parsed.
        let binding = match Primitive::from_name(&part.chip_type) {
            Some(p) => {
                for c in &part.connections {
                    if !p.has_pin(&c.destination) {
                        return Err(unknown_pin(part, &c.destination));
                    }
                    if c.destination == p.output() {
                        outputs.push(c);
                    } else {
                        inputs.push(c);
                    }
                }
                Binding::Primitive(p)
            }
            None => {
                let def = self.resolve(&part.chip_type)?;
                for c in &part.connections {
                    if def.is_input(&c.destination) {
                        inputs.push(c);
                    } else if def.is_output(&c.destination) {
                        outputs.push(c);
                    } else {
                        return Err(unknown_pin(part, &c.destination));
                    }
                }
                Binding::Chip(def)
            }
        };

        Ok(ScheduledPart {
            part,
            binding,
            inputs,
            outputs,
        })
    }

    /// Simulates every combination of input values. The first declared input
    /// is the most significant bit of the row number.
    pub fn truth_table(&mut self, chip: &ChipDefinition) -> Result<TruthTable, Box<dyn Error>> {
        let width = chip.inputs.len();
        if width > MAX_TABLE_INPUTS {
            return Err(Box::new(N2VError {
                msg: format!(
                    "Chip {} has {} inputs, too many rows to tabulate (max {} inputs).",
                    chip.name, width, MAX_TABLE_INPUTS
                ),
                kind: ErrorKind::Other,
            }));
        }

        let mut rows = Vec::with_capacity(1 << width);
        for row in 0u32..(1u32 << width) {
            let bits = row.view_bits::<Lsb0>();
            let inputs: SignalMap = chip
                .inputs
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), bits[width - 1 - i]))
                .collect();
            let outputs = self.simulate(chip, &inputs)?;
            rows.push(TruthRow { inputs, outputs });
        }

        Ok(TruthTable {
            inputs: chip.inputs.clone(),
            outputs: chip.outputs.clone(),
            rows,
        })
    }
}

fn unknown_pin(part: &ChipInstance, pin: &str) -> Box<dyn Error> {
    Box::new(N2VError::new(
        format!("Chip {} has no pin named {} (part {}).", part.chip_type, pin, part.name),
        ErrorKind::UnknownPin {
            chip: part.chip_type.clone(),
            pin: String::from(pin),
        },
    ))
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TruthRow {
    pub inputs: SignalMap,
    pub outputs: SignalMap,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TruthTable {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub rows: Vec<TruthRow>,
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} | {}", self.inputs.join(" "), self.outputs.join(" "))?;
        for row in &self.rows {
            let ins: Vec<String> = self
                .inputs
                .iter()
                .map(|n| format!("{:>w$}", u8::from(row.inputs.get(n)), w = n.len()))
                .collect();
            let outs: Vec<String> = self
                .outputs
                .iter()
                .map(|n| format!("{:>w$}", u8::from(row.outputs.get(n)), w = n.len()))
                .collect();
            writeln!(f, "{} | {}", ins.join(" "), outs.join(" "))?;
        }
        Ok(())
    }
}
