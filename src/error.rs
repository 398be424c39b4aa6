use std::error::Error;
use std::fs;
use std::path::PathBuf;

use crate::scanner::Token;

// Error type enum
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// Source text lacks a recognizable chip block, or the block is malformed.
    FormatError(Token),
    /// A part references a chip type that is neither primitive nor resolvable.
    UnknownChip(String),
    /// The source unit for a lazily resolved chip does not exist.
    NotFound(PathBuf),
    UnknownPin { chip: String, pin: String },
    /// Chip types on the instantiation chain, outermost first.
    CyclicDefinition(Vec<String>),
    DidNotConverge { chip: String, iterations: usize },
    VectorError(Option<PathBuf>),
    IOError,
    Other,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::FormatError(_) => "FormatError",
            ErrorKind::UnknownChip(_) => "UnknownChipError",
            ErrorKind::NotFound(_) => "NotFoundError",
            ErrorKind::UnknownPin { .. } => "UnknownPinError",
            ErrorKind::CyclicDefinition(_) => "CyclicDefinitionError",
            ErrorKind::DidNotConverge { .. } => "DidNotConverge",
            ErrorKind::VectorError(_) => "VectorError",
            ErrorKind::IOError => "IOError",
            ErrorKind::Other => "Error",
        }
    }
}

/// N2VError should be used when generating an error that has no other
/// source error object. This is the start of the error propagation chain.
pub struct N2VError {
    pub msg: String,
    pub kind: ErrorKind,
}

/// Transformed errors should be used when the source of the error is
/// another error. This is propagating an error with a new message.
pub struct TransformedError {
    pub msg: String,
    pub kind: ErrorKind,
    pub source: Option<Box<dyn Error + 'static>>,
}

impl N2VError {
    pub fn new(msg: impl Into<String>, kind: ErrorKind) -> N2VError {
        N2VError {
            msg: msg.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

/// Returns the kind of an error produced by this crate, if it is one.
pub fn error_kind<'a>(e: &'a (dyn Error + 'static)) -> Option<&'a ErrorKind> {
    if let Some(n2v) = e.downcast_ref::<N2VError>() {
        return Some(n2v.kind());
    }
    e.downcast_ref::<TransformedError>().map(|t| &t.kind)
}

impl std::fmt::Debug for N2VError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Debug for TransformedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// This relies on the N2VError display implementation. It will print
/// the entire error chain.
impl std::fmt::Display for TransformedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", N2VError::from(self))?;
        if let Some(error_source) = &self.source {
            write!(f, "{}", error_source)?;
        }
        Ok(())
    }
}

/// Strips the source from a transformed error. This is used to
/// display a TransformedError.
impl From<&TransformedError> for N2VError {
    fn from(e: &TransformedError) -> Self {
        N2VError {
            msg: e.msg.clone(),
            kind: e.kind.clone(),
        }
    }
}

impl std::fmt::Display for N2VError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::FormatError(t) => {
                writeln!(f, "-- PARSE ERROR ----------- {}", t.path.display())?;

                // Show the offending line when the source can be re-read.
                let source_line = fs::read_to_string(&t.path).ok().and_then(|contents| {
                    let line_idx = (t.line as usize).checked_sub(1)?;
                    contents.lines().nth(line_idx).map(String::from)
                });

                match source_line {
                    Some(l) => {
                        let digits = t.line.to_string();
                        writeln!(f, "{}| {}", t.line, l)?;
                        let lexeme_len = t.lexeme.chars().count().max(1);
                        let pad = (t.start + digits.len() + 2).saturating_sub(lexeme_len);
                        writeln!(f, "{}{}", " ".repeat(pad), "^".repeat(lexeme_len))?;
                    }
                    None => {
                        writeln!(f, "{}:{}|", t.line, t.start)?;
                    }
                }
                writeln!(f, "\n{}", self.msg)
            }
            kind => {
                writeln!(f, "{}: {}", kind.name(), self.msg)
            }
        }
    }
}

impl From<String> for N2VError {
    fn from(e: String) -> Self {
        N2VError {
            msg: e,
            kind: ErrorKind::Other,
        }
    }
}

impl Error for N2VError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl Error for TransformedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            None => None,
            // We store the source as an Box to a trait object.
            // Dereference once to get the Box behind the self reference,
            // and dereference the second time to get the inner trait object.
            Some(e) => Some(&**e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::TokenType;

    #[test]
    fn test_error_kind_downcast() {
        let e: Box<dyn Error> = Box::new(N2VError::new(
            "Unknown chip type: Foo",
            ErrorKind::UnknownChip(String::from("Foo")),
        ));
        assert!(matches!(error_kind(e.as_ref()), Some(ErrorKind::UnknownChip(n)) if n == "Foo"));

        let io: Box<dyn Error> = Box::new(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert!(error_kind(io.as_ref()).is_none());
    }

    #[test]
    fn test_transformed_error_keeps_source() {
        let inner = N2VError::new("no file", ErrorKind::NotFound(PathBuf::from("Foo.hdl")));
        let outer = TransformedError {
            msg: String::from("Unknown chip type: Foo"),
            kind: ErrorKind::UnknownChip(String::from("Foo")),
            source: Some(Box::new(inner)),
        };

        assert!(matches!(N2VError::from(&outer).kind(), ErrorKind::UnknownChip(_)));

        let rendered = outer.to_string();
        assert!(rendered.contains("UnknownChipError: Unknown chip type: Foo"));
        assert!(rendered.contains("NotFoundError: no file"));
        assert!(outer.source().is_some());
    }

    #[test]
    fn test_format_error_without_file() {
        let e = N2VError::new(
            "Invalid HDL format - no CHIP definition found",
            ErrorKind::FormatError(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                line: 3,
                start: 7,
                path: PathBuf::from(""),
            }),
        );
        let rendered = e.to_string();
        assert!(rendered.contains("PARSE ERROR"));
        assert!(rendered.contains("3:7|"));
        assert!(rendered.contains("no CHIP definition found"));
    }
}
