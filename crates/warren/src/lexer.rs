//! Tokeniser for warren source.
//!
//! The lexer matches the next input byte against a fixed table of
//! `{predicate, reader}` rules. Whitespace is a rule with no reader, so it is
//! consumed silently; every other rule hands the byte to a reader that
//! finishes the token. One token of lookahead is materialised lazily through
//! [`Lexer::peek`] and held until consumed by [`Lexer::advance`].

use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::{
    error::{Error, RunResult},
    source::CharSource,
};

/// Source position of a token or byte, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Token kinds of the surface language.
#[derive(Debug, Clone, PartialEq, Display, IntoStaticStr)]
pub enum TokenKind {
    #[strum(serialize = "identifier")]
    Identifier(String),
    #[strum(serialize = "number")]
    Number(i64),
    #[strum(serialize = "string")]
    Str(String),
    /// `:`
    #[strum(serialize = "`:`")]
    Assign,
    /// `(`
    #[strum(serialize = "`(`")]
    ListStart,
    /// `)`
    #[strum(serialize = "`)`")]
    ListEnd,
    /// `{`
    #[strum(serialize = "`{{`")]
    HashStart,
    /// `}`
    #[strum(serialize = "`}}`")]
    HashEnd,
    /// `,`
    #[strum(serialize = "`,`")]
    Comma,
    /// `` ` ``
    #[strum(serialize = "backquote")]
    Quote,
    /// `.`
    #[strum(serialize = "`.`")]
    Deref,
    /// `->`
    #[strum(serialize = "`->`")]
    Arrow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

/// One entry in the lexer's dispatch table.
///
/// A rule with no reader consumes its byte silently (whitespace).
struct Rule {
    matches: fn(u8) -> bool,
    read: Option<fn(&mut Lexer, u8) -> RunResult<Token>>,
}

const RULES: &[Rule] = &[
    Rule {
        matches: is_whitespace,
        read: None,
    },
    Rule {
        matches: |b| b.is_ascii_digit(),
        read: Some(Lexer::read_number),
    },
    Rule {
        matches: |b| b == b'"' || b == b'\'',
        read: Some(Lexer::read_string),
    },
    Rule {
        matches: |b| b == b'-',
        read: Some(Lexer::read_arrow_or_minus),
    },
    Rule {
        matches: is_sigil,
        read: Some(Lexer::read_sigil),
    },
    Rule {
        matches: is_identifier_byte,
        read: Some(Lexer::read_identifier),
    },
];

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_sigil(b: u8) -> bool {
    matches!(
        b,
        b':' | b'(' | b')' | b'{' | b'}' | b',' | b'`' | b'.'
    )
}

/// Identifier bytes: anything printable that is not whitespace, a sigil, a
/// quote, or the arrow's leading `-`. This is what lets `+`, `=`, `<`, and
/// `to_string` all lex as plain identifiers.
fn is_identifier_byte(b: u8) -> bool {
    if is_whitespace(b) || is_sigil(b) {
        return false;
    }
    !matches!(b, b'-' | b'"' | b'\'') && (b.is_ascii_graphic() || b >= 0x80)
}

/// Token stream over a character source.
pub struct Lexer {
    src: Box<dyn CharSource>,
    /// Position of the next byte to be read.
    pos: Pos,
    /// Position before the most recent read, restored on pushback.
    prev_pos: Pos,
    current: Option<Token>,
    peeked: Option<Option<Token>>,
}

impl Lexer {
    pub fn new(src: Box<dyn CharSource>) -> Self {
        Self {
            src,
            pos: Pos { line: 1, col: 1 },
            prev_pos: Pos { line: 1, col: 1 },
            current: None,
            peeked: None,
        }
    }

    /// The token most recently consumed by [`Lexer::advance`].
    #[must_use]
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Consumes the next token, making it current. Returns `false` at end of
    /// input.
    pub fn advance(&mut self) -> RunResult<bool> {
        let next = match self.peeked.take() {
            Some(tok) => tok,
            None => self.read_token()?,
        };
        self.current = next;
        Ok(self.current.is_some())
    }

    /// Looks at the next token without consuming it.
    pub fn peek(&mut self) -> RunResult<Option<&Token>> {
        if self.peeked.is_none() {
            let tok = self.read_token()?;
            self.peeked = Some(tok);
        }
        Ok(self.peeked.as_ref().and_then(Option::as_ref))
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.src.next_byte()?;
        self.prev_pos = self.pos;
        if byte == b'\n' {
            self.pos.line += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        Some(byte)
    }

    fn push_back(&mut self, byte: u8) {
        self.src.push_back(byte);
        self.pos = self.prev_pos;
    }

    fn read_token(&mut self) -> RunResult<Option<Token>> {
        loop {
            let Some(byte) = self.next_byte() else {
                return Ok(None);
            };
            let Some(rule) = RULES.iter().find(|rule| (rule.matches)(byte)) else {
                return Err(Error::lex(format!(
                    "unexpected byte 0x{byte:02x} at {}",
                    self.prev_pos
                )));
            };
            match rule.read {
                None => {}
                Some(read) => return read(self, byte).map(Some),
            }
        }
    }

    fn read_number(&mut self, first: u8) -> RunResult<Token> {
        let pos = self.prev_pos;
        let mut digits = String::new();
        digits.push(char::from(first));
        while let Some(byte) = self.next_byte() {
            if byte.is_ascii_digit() {
                digits.push(char::from(byte));
            } else {
                self.push_back(byte);
                break;
            }
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| Error::lex(format!("number out of range at {pos}")))?;
        Ok(Token {
            kind: TokenKind::Number(value),
            pos,
        })
    }

    fn read_string(&mut self, quote: u8) -> RunResult<Token> {
        let pos = self.prev_pos;
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.next_byte() else {
                return Err(Error::lex(format!("unterminated string starting at {pos}")));
            };
            if byte == quote {
                break;
            }
            if byte == b'\\' {
                let Some(escaped) = self.next_byte() else {
                    return Err(Error::lex(format!("unterminated string starting at {pos}")));
                };
                bytes.push(escaped);
            } else {
                bytes.push(byte);
            }
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::lex(format!("invalid utf-8 in string at {pos}")))?;
        Ok(Token {
            kind: TokenKind::Str(text),
            pos,
        })
    }

    fn read_arrow_or_minus(&mut self, _first: u8) -> RunResult<Token> {
        let pos = self.prev_pos;
        match self.next_byte() {
            Some(b'>') => Ok(Token {
                kind: TokenKind::Arrow,
                pos,
            }),
            Some(other) => {
                self.push_back(other);
                Ok(Token {
                    kind: TokenKind::Identifier("-".to_owned()),
                    pos,
                })
            }
            None => Ok(Token {
                kind: TokenKind::Identifier("-".to_owned()),
                pos,
            }),
        }
    }

    fn read_sigil(&mut self, byte: u8) -> RunResult<Token> {
        let kind = match byte {
            b':' => TokenKind::Assign,
            b'(' => TokenKind::ListStart,
            b')' => TokenKind::ListEnd,
            b'{' => TokenKind::HashStart,
            b'}' => TokenKind::HashEnd,
            b',' => TokenKind::Comma,
            b'`' => TokenKind::Quote,
            b'.' => TokenKind::Deref,
            _ => unreachable!("byte {byte} is not a sigil"),
        };
        Ok(Token {
            kind,
            pos: self.prev_pos,
        })
    }

    fn read_identifier(&mut self, first: u8) -> RunResult<Token> {
        let pos = self.prev_pos;
        let mut bytes = vec![first];
        while let Some(byte) = self.next_byte() {
            if is_identifier_byte(byte) || byte.is_ascii_digit() {
                bytes.push(byte);
            } else {
                self.push_back(byte);
                break;
            }
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::lex(format!("invalid utf-8 in identifier at {pos}")))?;
        Ok(Token {
            kind: TokenKind::Identifier(text),
            pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::source::StrSource;

    fn lex_all(text: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(Box::new(StrSource::new(text)));
        let mut kinds = Vec::new();
        while lexer.advance().unwrap() {
            kinds.push(lexer.current().unwrap().kind.clone());
        }
        kinds
    }

    #[test]
    fn lexes_assignment_and_invocation() {
        assert_eq!(
            lex_all("x: add(2, 40)"),
            vec![
                TokenKind::Identifier("x".to_owned()),
                TokenKind::Assign,
                TokenKind::Identifier("add".to_owned()),
                TokenKind::ListStart,
                TokenKind::Number(2),
                TokenKind::Comma,
                TokenKind::Number(40),
                TokenKind::ListEnd,
            ]
        );
    }

    #[test]
    fn lexes_arrow_and_bare_minus() {
        assert_eq!(
            lex_all("(x) -> (-(x))"),
            vec![
                TokenKind::ListStart,
                TokenKind::Identifier("x".to_owned()),
                TokenKind::ListEnd,
                TokenKind::Arrow,
                TokenKind::ListStart,
                TokenKind::Identifier("-".to_owned()),
                TokenKind::ListStart,
                TokenKind::Identifier("x".to_owned()),
                TokenKind::ListEnd,
                TokenKind::ListEnd,
            ]
        );
    }

    #[test]
    fn punctuation_identifiers_lex_whole() {
        assert_eq!(
            lex_all("+ = < > to_string __parent__"),
            vec![
                TokenKind::Identifier("+".to_owned()),
                TokenKind::Identifier("=".to_owned()),
                TokenKind::Identifier("<".to_owned()),
                TokenKind::Identifier(">".to_owned()),
                TokenKind::Identifier("to_string".to_owned()),
                TokenKind::Identifier("__parent__".to_owned()),
            ]
        );
    }

    #[test]
    fn strings_support_both_quotes_and_escapes() {
        assert_eq!(
            lex_all(r#""hi" 'there' "a\"b""#),
            vec![
                TokenKind::Str("hi".to_owned()),
                TokenKind::Str("there".to_owned()),
                TokenKind::Str("a\"b".to_owned()),
            ]
        );
    }

    #[test]
    fn mismatched_quote_is_an_error() {
        let mut lexer = Lexer::new(Box::new(StrSource::new("\"oops'")));
        assert!(lexer.advance().is_err());
    }

    #[test]
    fn quote_and_deref_tokens() {
        assert_eq!(
            lex_all("`(io.print)"),
            vec![
                TokenKind::Quote,
                TokenKind::ListStart,
                TokenKind::Identifier("io".to_owned()),
                TokenKind::Deref,
                TokenKind::Identifier("print".to_owned()),
                TokenKind::ListEnd,
            ]
        );
    }

    #[test]
    fn peek_is_held_until_consumed() {
        let mut lexer = Lexer::new(Box::new(StrSource::new("a b")));
        assert!(lexer.advance().unwrap());
        let peeked = lexer.peek().unwrap().cloned().unwrap();
        assert_eq!(peeked.kind, TokenKind::Identifier("b".to_owned()));
        assert!(lexer.advance().unwrap());
        assert_eq!(lexer.current().unwrap().kind, TokenKind::Identifier("b".to_owned()));
        assert!(!lexer.advance().unwrap());
    }

    #[test]
    fn control_bytes_are_rejected() {
        let mut lexer = Lexer::new(Box::new(StrSource::new("\x01")));
        let err = lexer.advance().unwrap_err();
        assert!(err.to_string().contains("unexpected byte"));
    }
}
