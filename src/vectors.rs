//! Reads test vector files.
//!
//! The first line that is neither blank nor a `//` comment is the header,
//! naming input pins and output pins separated by a semicolon:
//!
//! ```text
//! a,b;out
//! 0,1;1
//! ```
//!
//! Every later line gives 0/1 values for those pins in header order.
//! Malformed data lines are skipped with a warning.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::error::{ErrorKind, N2VError};
use crate::signalmap::SignalMap;

/// One line of a vector file.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TestVector {
    /// Line number in the file, starting at 1.
    pub line: usize,
    pub inputs: SignalMap,
    pub expected: SignalMap,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct VectorFile {
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub vectors: Vec<TestVector>,
}

fn is_ignored(line: &str) -> bool {
    line.is_empty() || line.starts_with("//")
}

fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn parse_values(values: &str) -> Option<Vec<bool>> {
    if values.trim().is_empty() {
        return Some(Vec::new());
    }
    values
        .split(',')
        .map(|v| match v.trim() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        })
        .collect()
}

fn vector_error(msg: String, path: Option<&Path>) -> Box<dyn Error> {
    Box::new(N2VError::new(msg, ErrorKind::VectorError(path.map(PathBuf::from))))
}

/// Parses the text of a vector file. `path` is only used in messages.
///
/// An empty file has no vectors. A file with content but no header line is
/// an error.
pub fn parse_vectors(text: &str, path: Option<&Path>) -> Result<VectorFile, Box<dyn Error>> {
    if text.trim().is_empty() {
        return Ok(VectorFile {
            input_names: Vec::new(),
            output_names: Vec::new(),
            vectors: Vec::new(),
        });
    }

    let location = match path {
        Some(p) => p.display().to_string(),
        None => String::from("<input>"),
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !is_ignored(l));

    let (header_line, header) = match lines.next() {
        Some(x) => x,
        None => {
            return Err(vector_error(
                format!("Vector file {} has no header line.", location),
                path,
            ));
        }
    };

    let (input_part, output_part) = match header.split_once(';') {
        Some(x) => x,
        None => {
            return Err(vector_error(
                format!(
                    "Header line {} of {} must separate inputs and outputs with `;`: {}",
                    header_line, location, header
                ),
                path,
            ));
        }
    };

    let input_names = split_names(input_part);
    let output_names = split_names(output_part);

    let mut vectors = Vec::new();
    for (line_number, line) in lines {
        let (ins, outs) = match line.split_once(';') {
            Some(x) => x,
            None => {
                warn!(file = location.as_str(), line = line_number, "skipping vector without `;`");
                continue;
            }
        };

        let (in_values, out_values) = match (parse_values(ins), parse_values(outs)) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                warn!(file = location.as_str(), line = line_number, "skipping vector with a value other than 0 or 1");
                continue;
            }
        };

        if in_values.len() != input_names.len() || out_values.len() != output_names.len() {
            warn!(
                file = location.as_str(),
                line = line_number,
                "skipping vector whose value count does not match the header"
            );
            continue;
        }

        vectors.push(TestVector {
            line: line_number,
            inputs: input_names.iter().cloned().zip(in_values).collect(),
            expected: output_names.iter().cloned().zip(out_values).collect(),
        });
    }

    Ok(VectorFile {
        input_names,
        output_names,
        vectors,
    })
}

pub fn read_vectors(path: &Path) -> Result<VectorFile, Box<dyn Error>> {
    let contents = match fs::read_to_string(path) {
        Ok(x) => x,
        Err(e) => {
            return Err(Box::new(N2VError::new(
                format!("Unable to read vector file {}: {}", path.display(), e),
                ErrorKind::IOError,
            )));
        }
    };
    parse_vectors(&contents, Some(path))
}
