use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::Chars;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TokenType {
    Chip,
    Identifier,
    LeftCurly,
    RightCurly,
    LeftParen,
    RightParen,
    Semicolon,
    Colon,
    In,
    Out,
    Comma,
    Parts,
    Equal,
    Invalid,
    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Chip => "CHIP",
            TokenType::Identifier => "an identifier",
            TokenType::LeftCurly => "`{`",
            TokenType::RightCurly => "`}`",
            TokenType::LeftParen => "`(`",
            TokenType::RightParen => "`)`",
            TokenType::Semicolon => "`;`",
            TokenType::Colon => "`:`",
            TokenType::In => "IN",
            TokenType::Out => "OUT",
            TokenType::Comma => "`,`",
            TokenType::Parts => "PARTS",
            TokenType::Equal => "`=`",
            TokenType::Invalid => "an invalid character",
            TokenType::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: u32,
    pub start: usize,
    pub path: PathBuf,
}

pub struct Scanner<'a> {
    source_chars: std::iter::Peekable<Chars<'a>>,
    pub line: u32,
    pub col: usize,
    keywords: HashMap<&'static str, TokenType>,
    peeked: Option<Token>,
    pub path: PathBuf,
}

impl<'a> Scanner<'a> {
    pub fn new(source_code: &'a str, source_path: PathBuf) -> Scanner<'a> {
        let source_chars = source_code.chars().peekable();

        // Keywords are case-sensitive
        let keywords = HashMap::from([
            ("CHIP", TokenType::Chip),
            ("PARTS", TokenType::Parts),
            ("IN", TokenType::In),
            ("OUT", TokenType::Out),
        ]);

        Scanner {
            source_chars,
            line: 1,
            col: 0,
            keywords,
            peeked: None,
            path: source_path,
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Option<Token> {
        if self.peeked.is_none() {
            self.peeked = self.scan_token();
        }
        self.peeked.clone()
    }

    /// A zero-width token at the current position, used to report a
    /// premature end of input.
    pub fn eof_token(&self) -> Token {
        self.token(TokenType::Eof, String::new(), self.col)
    }

    pub fn scan_token(&mut self) -> Option<Token> {
        if let Some(t) = self.peeked.take() {
            return Some(t);
        }

        let mut token: Option<Token> = None;
        while token.is_none() {
            let c = self.source_chars.next()?;
            self.col += 1;
            let start = self.col;

            token = match c {
                '{' => Some(self.token(TokenType::LeftCurly, c.to_string(), start)),
                '}' => Some(self.token(TokenType::RightCurly, c.to_string(), start)),
                '(' => Some(self.token(TokenType::LeftParen, c.to_string(), start)),
                ')' => Some(self.token(TokenType::RightParen, c.to_string(), start)),
                ';' => Some(self.token(TokenType::Semicolon, c.to_string(), start)),
                ':' => Some(self.token(TokenType::Colon, c.to_string(), start)),
                ',' => Some(self.token(TokenType::Comma, c.to_string(), start)),
                '=' => Some(self.token(TokenType::Equal, c.to_string(), start)),
                '\n' => {
                    self.line += 1;
                    self.col = 0;
                    None
                }
                '/' => match self.source_chars.peek() {
                    Some('/') => {
                        self.finish_single_comment();
                        None
                    }
                    Some('*') => {
                        self.source_chars.next();
                        self.col += 1;
                        self.finish_multi_comment();
                        None
                    }
                    _ => Some(self.token(TokenType::Invalid, c.to_string(), start)),
                },
                c if c.is_whitespace() => None,
                c if c.is_alphanumeric() || c == '_' => Some(self.finish_identifier(c, start)),
                _ => Some(self.token(TokenType::Invalid, c.to_string(), start)),
            };
        }
        token
    }

    fn token(&self, token_type: TokenType, lexeme: String, start: usize) -> Token {
        Token {
            token_type,
            lexeme,
            line: self.line,
            start,
            path: self.path.clone(),
        }
    }

    fn finish_single_comment(&mut self) {
        loop {
            match self.source_chars.next() {
                None => break,
                Some('\n') => {
                    self.line += 1;
                    self.col = 0;
                    break;
                }
                _ => {}
            }
        }
    }

    // An unterminated block comment swallows the rest of the input.
    fn finish_multi_comment(&mut self) {
        loop {
            let next = self.source_chars.next();
            self.col += 1;

            match next {
                None => break,
                Some('\n') => {
                    self.line += 1;
                    self.col = 0;
                }
                Some('*') => {
                    if let Some('/') = self.source_chars.peek() {
                        self.source_chars.next();
                        self.col += 1;
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    fn finish_identifier(&mut self, first: char, start: usize) -> Token {
        let mut lexeme = first.to_string();

        while let Some(c) = self.source_chars.peek() {
            if c.is_alphanumeric() || *c == '_' {
                lexeme.push(*c);
                self.source_chars.next();
                self.col += 1;
            } else {
                break;
            }
        }

        let token_type = match self.keywords.get(lexeme.as_str()) {
            None => TokenType::Identifier,
            Some(t) => *t,
        };
        self.token(token_type, lexeme, start)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan_token()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        Scanner::new(source, PathBuf::from("")).map(|t| t.token_type).collect()
    }

    #[test]
    fn test_and_tokens() {
        let contents = "
            CHIP And {
                IN a, b;
                OUT out;
                PARTS:
                Nand(a=a, b=b, out=nandOut);
            }";

        let expected_types = vec![
            TokenType::Chip,
            TokenType::Identifier,
            TokenType::LeftCurly,
            TokenType::In,
            TokenType::Identifier,
            TokenType::Comma,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::Out,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::Parts,
            TokenType::Colon,
            TokenType::Identifier,
            TokenType::LeftParen,
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Identifier,
            TokenType::Comma,
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Identifier,
            TokenType::Comma,
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Identifier,
            TokenType::RightParen,
            TokenType::Semicolon,
            TokenType::RightCurly,
        ];

        assert_eq!(expected_types, token_types(contents));
    }

    #[test]
    fn test_comments_are_skipped() {
        let contents = "// CHIP Fake { }\n/* a { multi\n line } comment */ CHIP Real {}";
        assert_eq!(
            token_types(contents),
            vec![
                TokenType::Chip,
                TokenType::Identifier,
                TokenType::LeftCurly,
                TokenType::RightCurly
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert_eq!(token_types("CHIP /* never closed { }"), vec![TokenType::Chip]);
    }

    #[test]
    fn test_positions() {
        let mut scanner = Scanner::new("CHIP Foo {\n  IN abc;", PathBuf::from(""));
        let chip = scanner.next().unwrap();
        assert_eq!((chip.line, chip.start), (1, 1));
        let name = scanner.next().unwrap();
        assert_eq!((name.line, name.start, name.lexeme.as_str()), (1, 6, "Foo"));
        scanner.next();
        let kw_in = scanner.next().unwrap();
        assert_eq!((kw_in.line, kw_in.start), (2, 3));
        let pin = scanner.next().unwrap();
        assert_eq!((pin.line, pin.start, pin.lexeme.as_str()), (2, 6, "abc"));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut scanner = Scanner::new("a b", PathBuf::from(""));
        assert_eq!(scanner.peek().unwrap().lexeme, "a");
        assert_eq!(scanner.peek().unwrap().lexeme, "a");
        assert_eq!(scanner.next().unwrap().lexeme, "a");
        assert_eq!(scanner.next().unwrap().lexeme, "b");
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(
            token_types("a[0] / b"),
            vec![
                TokenType::Identifier,
                TokenType::Invalid,
                TokenType::Identifier,
                TokenType::Invalid,
                TokenType::Invalid,
                TokenType::Identifier
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            token_types("CHIP chip In IN"),
            vec![
                TokenType::Chip,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::In
            ]
        );
    }
}
