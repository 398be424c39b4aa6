use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::error::{ErrorKind, N2VError};
use crate::parser::*;
use crate::primitive::PRIMITIVES;

/// Chip definitions by chip type name.
///
/// A new registry holds the four primitive gates. Parsing through the
/// registry adds an entry per chip, and parsing a name again replaces the
/// earlier entry. Entries are never removed.
#[derive(Clone)]
pub struct Registry {
    chips: HashMap<String, Rc<ChipDefinition>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Registry {
        let chips = PRIMITIVES
            .iter()
            .map(|p| (String::from(p.name()), Rc::new(p.definition())))
            .collect();
        Registry { chips }
    }

    /// Adds a definition, returning the one it replaced.
    pub fn insert(&mut self, chip: ChipDefinition) -> Option<Rc<ChipDefinition>> {
        self.chips.insert(chip.name.clone(), Rc::new(chip))
    }

    pub fn get(&self, name: &str) -> Option<Rc<ChipDefinition>> {
        self.chips.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chips.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chips.keys().cloned().collect();
        names.sort();
        names
    }

    /// Parses HDL text and registers the chip it defines.
    pub fn parse(
        &mut self,
        source: &str,
        path: &Path,
        expected_name: Option<&str>,
    ) -> Result<Rc<ChipDefinition>, Box<dyn Error>> {
        let chip = parse_hdl(source, path, expected_name)?;
        let name = chip.name.clone();
        self.insert(chip);
        self.get(&name).ok_or_else(|| {
            Box::new(N2VError::from(format!("Chip {} vanished from registry.", name)))
                as Box<dyn Error>
        })
    }

    /// Looks up a chip type, loading `<name>.hdl` from the provider on a miss.
    ///
    /// A missing source unit is reported as `NotFound`. Parse errors in a
    /// source unit that does exist are returned unchanged.
    pub fn resolve(
        &mut self,
        name: &str,
        provider: &dyn HdlProvider,
    ) -> Result<Rc<ChipDefinition>, Box<dyn Error>> {
        if let Some(chip) = self.get(name) {
            return Ok(chip);
        }

        let file_name = hdl_file_name(name);
        let path = provider.get_path(&file_name);
        let contents = match provider.get_hdl(&file_name) {
            Ok(x) => x,
            Err(e) => {
                return Err(Box::new(N2VError {
                    msg: format!("No source for chip {}: {}", name, e),
                    kind: ErrorKind::NotFound(path),
                }));
            }
        };

        debug!(chip = name, path = %path.display(), "loading chip definition");
        self.parse(&contents, &path, Some(name))
    }
}
