//! The built-in gates. These have fixed semantics and are never composed
//! from parts.

use crate::parser::ChipDefinition;
use crate::signalmap::SignalMap;
use serde::Serialize;
use std::fmt;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Nand,
    Not,
    And,
    Or,
}

pub const PRIMITIVES: [Primitive; 4] = [
    Primitive::Nand,
    Primitive::Not,
    Primitive::And,
    Primitive::Or,
];

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        PRIMITIVES.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Nand => "Nand",
            Primitive::Not => "Not",
            Primitive::And => "And",
            Primitive::Or => "Or",
        }
    }

    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            Primitive::Not => &["in"],
            Primitive::Nand | Primitive::And | Primitive::Or => &["a", "b"],
        }
    }

    pub fn output(&self) -> &'static str {
        "out"
    }

    pub fn has_pin(&self, pin: &str) -> bool {
        pin == self.output() || self.inputs().contains(&pin)
    }

    /// Missing inputs read as 0.
    pub fn eval(&self, inputs: &SignalMap) -> bool {
        match self {
            Primitive::Nand => !(inputs.get("a") && inputs.get("b")),
            Primitive::Not => !inputs.get("in"),
            Primitive::And => inputs.get("a") && inputs.get("b"),
            Primitive::Or => inputs.get("a") || inputs.get("b"),
        }
    }

    pub fn definition(&self) -> ChipDefinition {
        ChipDefinition::new(self.name(), self.inputs(), &[self.output()])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn eval2(p: Primitive, a: bool, b: bool) -> bool {
        let inputs = SignalMap::from([("a", a), ("b", b)]);
        p.eval(&inputs)
    }

    #[test]
    fn test_truth_tables() {
        let combos = [(false, false), (false, true), (true, false), (true, true)];
        let nand: Vec<bool> = combos.iter().map(|(a, b)| eval2(Primitive::Nand, *a, *b)).collect();
        let and: Vec<bool> = combos.iter().map(|(a, b)| eval2(Primitive::And, *a, *b)).collect();
        let or: Vec<bool> = combos.iter().map(|(a, b)| eval2(Primitive::Or, *a, *b)).collect();

        assert_eq!(nand, vec![true, true, true, false]);
        assert_eq!(and, vec![false, false, false, true]);
        assert_eq!(or, vec![false, true, true, true]);

        for (input, expected) in [(false, true), (true, false)] {
            let inputs = SignalMap::from([("in", input)]);
            assert_eq!(Primitive::Not.eval(&inputs), expected);
        }
    }

    #[test]
    fn test_missing_inputs_default_to_zero() {
        let empty = SignalMap::new();
        assert!(Primitive::Nand.eval(&empty));
        assert!(Primitive::Not.eval(&empty));
        assert!(!Primitive::And.eval(&empty));
        assert!(!Primitive::Or.eval(&empty));
    }

    #[test]
    fn test_definitions() {
        let nand = Primitive::Nand.definition();
        assert_eq!(nand.inputs, vec!["a", "b"]);
        assert_eq!(nand.outputs, vec!["out"]);
        assert!(nand.is_primitive());

        let not = Primitive::from_name("Not").unwrap().definition();
        assert_eq!(not.inputs, vec!["in"]);
        assert!(Primitive::from_name("Xor").is_none());
        assert!(Primitive::from_name("nand").is_none());
    }

    #[test]
    fn test_pins() {
        assert!(Primitive::Not.has_pin("in"));
        assert!(!Primitive::Not.has_pin("a"));
        assert!(Primitive::Or.has_pin("out"));
    }
}
