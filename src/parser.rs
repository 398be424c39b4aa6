use crate::error::{ErrorKind, N2VError};
use crate::primitive::Primitive;
use crate::scanner::{Scanner, Token, TokenType};
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

//  Not(in=sel, out=notSel); has two connections { destination: "in", source: "sel" }
//  and { destination: "out", source: "notSel" }.
/// Binds a pin of an instantiated chip (`destination`) to a signal of the
/// enclosing chip (`source`).
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub destination: String,
    pub source: String,
}

impl Connection {
    pub fn new(destination: &str, source: &str) -> Connection {
        Connection {
            destination: String::from(destination),
            source: String::from(source),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.destination, self.source)
    }
}

/// One use of a chip type inside the PARTS list of another chip.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChipInstance {
    pub chip_type: String,
    /// `<type>_<ordinal>`, unique within the enclosing chip.
    pub name: String,
    pub connections: Vec<Connection>,
}

impl fmt::Display for ChipInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.chip_type)?;
        for (i, connection) in self.connections.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", connection)?;
        }
        write!(f, ");")
    }
}

/// The parsed form of an HDL chip: its interface and its body.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChipDefinition {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub parts: Vec<ChipInstance>,
    /// Signals referenced by parts that are neither inputs nor outputs.
    pub internal_signals: BTreeSet<String>,
    #[serde(skip)]
    pub path: Option<PathBuf>, // None if the chip was not read from disk.
}

impl fmt::Display for ChipDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CHIP {} {{", self.name)?;
        if !self.inputs.is_empty() {
            writeln!(f, "    IN {};", self.inputs.join(", "))?;
        }
        if !self.outputs.is_empty() {
            writeln!(f, "    OUT {};", self.outputs.join(", "))?;
        }
        if !self.parts.is_empty() {
            writeln!(f, "    PARTS:")?;
            for part in &self.parts {
                writeln!(f, "    {}", part)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl ChipDefinition {
    pub fn new(name: &str, inputs: &[&str], outputs: &[&str]) -> ChipDefinition {
        ChipDefinition {
            name: String::from(name),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            parts: Vec::new(),
            internal_signals: BTreeSet::new(),
            path: None,
        }
    }

    /// Appends a part, naming it after its position and recording any
    /// internal signals its connections introduce.
    pub fn add_part(&mut self, chip_type: &str, connections: Vec<Connection>) -> &ChipInstance {
        for c in &connections {
            if !self.is_input(&c.source) && !self.is_output(&c.source) {
                self.internal_signals.insert(c.source.clone());
            }
        }

        self.parts.push(ChipInstance {
            chip_type: String::from(chip_type),
            name: format!("{}_{}", chip_type, self.parts.len()),
            connections,
        });
        &self.parts[self.parts.len() - 1]
    }

    /// Primitives are the built-in gates; a parsed chip that shares a gate's
    /// name but has parts is a composite.
    pub fn is_primitive(&self) -> bool {
        self.parts.is_empty() && Primitive::from_name(&self.name).is_some()
    }

    pub fn is_input(&self, pin: &str) -> bool {
        self.inputs.iter().any(|p| p == pin)
    }

    pub fn is_output(&self, pin: &str) -> bool {
        self.outputs.iter().any(|p| p == pin)
    }
}

/// Supplies HDL source text for chips that are resolved lazily.
pub trait HdlProvider {
    fn get_hdl(&self, file_name: &str) -> Result<String, std::io::Error>;
    fn get_path(&self, file_name: &str) -> PathBuf;
}

/// Reads HDL files relative to a base directory.
#[derive(Clone, Debug)]
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    pub fn new(base_path: &Path) -> FileReader {
        FileReader {
            base_path: base_path.to_path_buf(),
        }
    }
}

impl HdlProvider for FileReader {
    fn get_hdl(&self, file_name: &str) -> Result<String, std::io::Error> {
        let path = self.base_path.join(file_name);
        fs::read_to_string(&path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Unable to get HDL for {:?}. {}", path, e),
            )
        })
    }

    fn get_path(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }
}

/// The file an HDL chip is expected to live in.
pub fn hdl_file_name(chip_name: &str) -> String {
    format!("{}.hdl", chip_name)
}

/// Parses HDL text into a chip definition.
///
/// - `path`: where the text came from, used for error locations.
/// - `expected_name`: the chip name the caller expects, normally derived
///   from the file name. A mismatch is only logged.
pub fn parse_hdl(
    source: &str,
    path: &Path,
    expected_name: Option<&str>,
) -> Result<ChipDefinition, Box<dyn Error>> {
    let mut scanner = Scanner::new(source, path.to_path_buf());
    let mut parser = Parser::new(&mut scanner);
    let chip = parser.parse()?;

    if let Some(expected) = expected_name {
        if expected != chip.name {
            warn!(
                expected,
                found = chip.name.as_str(),
                path = %path.display(),
                "chip name does not match its source unit"
            );
        }
    }

    Ok(chip)
}

/// Reads an HDL file, reporting a missing or unreadable file as `NotFound`.
pub fn read_hdl(hdl_path: &Path) -> Result<String, Box<dyn Error>> {
    match fs::read_to_string(hdl_path) {
        Ok(x) => Ok(x),
        Err(e) => Err(Box::new(N2VError {
            msg: format!("HDL file not found: {} ({})", hdl_path.display(), e),
            kind: ErrorKind::NotFound(hdl_path.to_path_buf()),
        })),
    }
}

/// Parses an on-disk HDL file.
///
/// - `hdl_path`: Path to the HDL file to parse.
///
/// Returns a tuple of the parsed HDL and a FileReader rooted at the
/// file's directory, for resolving the chips it references.
pub fn parse_hdl_path(hdl_path: &Path) -> Result<(ChipDefinition, FileReader), Box<dyn Error>> {
    let base_path = match hdl_path.parent() {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from("."),
    };
    let provider = FileReader::new(&base_path);
    let contents = read_hdl(hdl_path)?;
    let expected_name = hdl_path.file_stem().and_then(|s| s.to_str());
    let hdl = parse_hdl(&contents, hdl_path, expected_name)?;
    Ok((hdl, provider))
}

pub struct Parser<'a, 'b> {
    pub scanner: &'a mut Scanner<'b>,
}

impl<'a, 'b> Parser<'a, 'b> {
    pub fn new(scanner: &'a mut Scanner<'b>) -> Parser<'a, 'b> {
        Parser { scanner }
    }

    pub fn parse(&mut self) -> Result<ChipDefinition, Box<dyn Error>> {
        self.chip()
    }

    fn error(&self, msg: String, token: Token) -> Box<dyn Error> {
        Box::new(N2VError {
            msg,
            kind: ErrorKind::FormatError(token),
        })
    }

    fn eof_error(&self, expected: &str) -> Box<dyn Error> {
        self.error(
            format!("Unexpected end of file. Expected {}.", expected),
            self.scanner.eof_token(),
        )
    }

    fn consume(&mut self, tt: TokenType) -> Result<Token, Box<dyn Error>> {
        match self.scanner.next() {
            None => Err(self.eof_error(&tt.to_string())),
            Some(t) => {
                if t.token_type == tt {
                    Ok(t)
                } else {
                    let msg = format!(
                        "I did not expect to see `{}`. I expected to see {}.",
                        t.lexeme, tt
                    );
                    Err(self.error(msg, t))
                }
            }
        }
    }

    fn peek_type(&mut self) -> Option<TokenType> {
        self.scanner.peek().map(|t| t.token_type)
    }

    // Anything before the first `CHIP` keyword is ignored.
    fn chip(&mut self) -> Result<ChipDefinition, Box<dyn Error>> {
        loop {
            match self.peek_type() {
                Some(TokenType::Chip) => break,
                Some(_) => {
                    self.scanner.next();
                }
                None => {
                    return Err(self.error(
                        String::from("Invalid HDL format - no CHIP definition found."),
                        self.scanner.eof_token(),
                    ));
                }
            }
        }

        self.consume(TokenType::Chip)?;
        let chip_name = self.consume(TokenType::Identifier)?.lexeme;
        self.consume(TokenType::LeftCurly)?;

        let mut chip = ChipDefinition::new(&chip_name, &[], &[]);
        if !self.scanner.path.as_os_str().is_empty() {
            chip.path = Some(self.scanner.path.clone());
        }

        if self.peek_type() == Some(TokenType::In) {
            self.consume(TokenType::In)?;
            chip.inputs = self.pin_names()?;
        }

        if self.peek_type() == Some(TokenType::Out) {
            self.consume(TokenType::Out)?;
            chip.outputs = self.pin_names()?;
        }

        if self.peek_type() == Some(TokenType::Parts) {
            self.consume(TokenType::Parts)?;
            self.consume(TokenType::Colon)?;
            self.parts(&mut chip)?;
        } else {
            self.consume(TokenType::RightCurly)?;
        }

        Ok(chip)
    }

    // Comma separated identifiers terminated by a semicolon. The list may be
    // empty and may end with a comma.
    fn pin_names(&mut self) -> Result<Vec<String>, Box<dyn Error>> {
        let mut res = Vec::new();
        let mut expect_name = true;

        loop {
            let next = self.scanner.next();
            match next {
                Some(
                    t @ Token {
                        token_type: TokenType::Identifier,
                        ..
                    },
                ) if expect_name => {
                    res.push(t.lexeme);
                    expect_name = false;
                }
                Some(Token {
                    token_type: TokenType::Comma,
                    ..
                }) if !expect_name => {
                    expect_name = true;
                }
                Some(Token {
                    token_type: TokenType::Semicolon,
                    ..
                }) => {
                    return Ok(res);
                }
                Some(t) => {
                    let expected = if expect_name {
                        "a pin name"
                    } else {
                        "a comma or semicolon"
                    };
                    let msg = format!("Expected {}, found `{}`.", expected, t.lexeme);
                    return Err(self.error(msg, t));
                }
                None => {
                    return Err(self.eof_error("a pin name, comma, or semicolon"));
                }
            }
        }
    }

    // Parses part instantiations up to and including the closing curly.
    fn parts(&mut self, chip: &mut ChipDefinition) -> Result<(), Box<dyn Error>> {
        loop {
            match self.scanner.peek() {
                Some(Token {
                    token_type: TokenType::Identifier,
                    ..
                }) => {
                    let (chip_type, connections) = self.part()?;
                    chip.add_part(&chip_type, connections);
                }
                Some(Token {
                    token_type: TokenType::RightCurly,
                    ..
                }) => {
                    self.scanner.next();
                    return Ok(());
                }
                Some(t) => {
                    let msg = format!("Expected a part or `}}`, found `{}`.", t.lexeme);
                    return Err(self.error(msg, t));
                }
                None => {
                    return Err(self.eof_error("a part or `}`"));
                }
            }
        }
    }

    /// Extracts a part: `Type(pin=signal, ...);`
    fn part(&mut self) -> Result<(String, Vec<Connection>), Box<dyn Error>> {
        let chip_type = self.consume(TokenType::Identifier)?.lexeme;
        let connections = self.connections()?;
        self.consume(TokenType::Semicolon)?;
        Ok((chip_type, connections))
    }

    fn connections(&mut self) -> Result<Vec<Connection>, Box<dyn Error>> {
        let mut connections = Vec::new();

        self.consume(TokenType::LeftParen)?;
        if self.peek_type() == Some(TokenType::RightParen) {
            self.scanner.next();
            return Ok(connections);
        }

        loop {
            let destination = self.consume(TokenType::Identifier)?;
            self.consume(TokenType::Equal)?;
            let source = self.consume(TokenType::Identifier)?;
            connections.push(Connection {
                destination: destination.lexeme,
                source: source.lexeme,
            });

            match self.scanner.next() {
                Some(Token {
                    token_type: TokenType::Comma,
                    ..
                }) => continue,
                Some(Token {
                    token_type: TokenType::RightParen,
                    ..
                }) => break,
                Some(t) => {
                    let msg = format!("Expected comma or right paren, found `{}`.", t.lexeme);
                    return Err(self.error(msg, t));
                }
                None => return Err(self.eof_error("a comma or right paren")),
            }
        }

        Ok(connections)
    }
}
