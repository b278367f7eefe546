//! TDL type string parser.
//!
//! Grammar, whitespace-insensitive:
//!
//! ```text
//! type := map | list | base
//! map  := "Map" "<" type "," type ">"
//! list := "List" "<" type ">"
//! base := IDENT            // dotted identifier; primitive keywords win
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use super::TdlType;
use crate::error::TypeError;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("identifier pattern is valid")
});

/// Whether `s` is a dotted identifier (`seg` or `seg.seg...`).
pub(crate) fn is_dotted_identifier(s: &str) -> bool {
    IDENT_RE.is_match(s)
}

/// Parses a TDL type string; any malformation reports the whole input.
pub(crate) fn parse_tdl(input: &str) -> Result<TdlType, TypeError> {
    let fail = || TypeError::Parse(input.to_string());
    let mut parser = Parser { input, pos: 0 };
    let parsed = parser.parse_type().ok_or_else(fail)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(fail());
    }
    Ok(parsed)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_type(&mut self) -> Option<TdlType> {
        self.skip_whitespace();
        let ident = self.read_ident()?;
        match ident {
            "Map" if self.peek_is('<') => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                TdlType::map(key, value).ok()
            }
            "List" if self.peek_is('<') => {
                self.expect('<')?;
                let element = self.parse_type()?;
                self.expect('>')?;
                Some(TdlType::list(element))
            }
            _ => base_type(ident),
        }
    }

    /// Reads a run of identifier characters (letters, digits, `_`, `.`).
    fn read_ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if self.pos == start {
            None
        } else {
            Some(&self.input[start..self.pos])
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            Some(())
        } else {
            None
        }
    }

    fn peek_is(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        self.peek() == Some(expected)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.input.len()
    }
}

fn base_type(ident: &str) -> Option<TdlType> {
    let parsed = match ident {
        "bool" => TdlType::Bool,
        "int8" => TdlType::Int8,
        "int16" => TdlType::Int16,
        "int32" => TdlType::Int32,
        "int64" => TdlType::Int64,
        "float" => TdlType::Float,
        "double" => TdlType::Double,
        "bytes" => TdlType::Bytes,
        name if is_dotted_identifier(name) => TdlType::Class(name.to_string()),
        _ => return None,
    };
    Some(parsed)
}
