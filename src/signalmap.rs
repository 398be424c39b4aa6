use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Single-bit signal values keyed by signal name.
///
/// Reading a name that was never written yields 0. Serialized as a map of
/// names to the integers 0 and 1.
#[derive(Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Default)]
#[serde(into = "BTreeMap<String, u8>", try_from = "BTreeMap<String, u8>")]
pub struct SignalMap {
    signals: BTreeMap<String, bool>,
}

impl<const N: usize> From<[(&str, bool); N]> for SignalMap {
    fn from(values: [(&str, bool); N]) -> Self {
        values
            .into_iter()
            .map(|(name, val)| (String::from(name), val))
            .collect()
    }
}

impl<const N: usize> TryFrom<[(&str, u8); N]> for SignalMap {
    type Error = String;

    fn try_from(values: [(&str, u8); N]) -> Result<Self, String> {
        values
            .into_iter()
            .map(|(name, val)| -> Result<(String, bool), String> {
                Ok((String::from(name), bit_from_int(name, val)?))
            })
            .collect()
    }
}

impl TryFrom<BTreeMap<String, u8>> for SignalMap {
    type Error = String;

    fn try_from(values: BTreeMap<String, u8>) -> Result<Self, String> {
        values
            .into_iter()
            .map(|(name, val)| -> Result<(String, bool), String> {
                let bit = bit_from_int(&name, val)?;
                Ok((name, bit))
            })
            .collect()
    }
}

impl From<SignalMap> for BTreeMap<String, u8> {
    fn from(values: SignalMap) -> Self {
        values
            .signals
            .into_iter()
            .map(|(name, val)| (name, u8::from(val)))
            .collect()
    }
}

impl From<HashMap<String, bool>> for SignalMap {
    fn from(values: HashMap<String, bool>) -> Self {
        values.into_iter().collect()
    }
}

impl FromIterator<(String, bool)> for SignalMap {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        SignalMap {
            signals: iter.into_iter().collect(),
        }
    }
}

fn bit_from_int(name: &str, val: u8) -> Result<bool, String> {
    match val {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(format!(
            "Signal {} must be 0 or 1, found {}.",
            name, val
        )),
    }
}

impl std::fmt::Debug for SignalMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formatted: Vec<(&String, u8)> = self
            .signals
            .iter()
            .map(|(key, val)| (key, u8::from(*val)))
            .collect();
        write!(f, "{:?}", formatted)
    }
}

/// `a=0, b=1`, in name order.
impl std::fmt::Display for SignalMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, val)) in self.signals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, u8::from(*val))?;
        }
        Ok(())
    }
}

impl SignalMap {
    pub fn new() -> SignalMap {
        SignalMap {
            signals: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> bool {
        self.signals.get(name).copied().unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, value: bool) {
        self.signals.insert(name.to_string(), value);
    }

    /// Writes a value and reports whether it differs from what `get`
    /// returned before the write.
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        let changed = self.get(name) != value;
        self.insert(name, value);
        changed
    }

    /// True when every signal in `expected` has the same value here.
    pub fn satisfies(&self, expected: &SignalMap) -> bool {
        expected
            .signals
            .iter()
            .all(|(name, val)| self.get(name) == *val)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.signals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn signals(&self) -> Vec<String> {
        self.signals.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
