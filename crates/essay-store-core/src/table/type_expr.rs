use log::warn;

use crate::{component::{ComponentId, Components}, error::ParseError};

const NAME: &str = "type";

///
/// Parses a comma-separated list of component names into component ids.
///
/// Names may contain `::`, `.` and generic or macro argument lists such as
/// `Vec<u32>`; commas nested inside `<...>` or `(...)` don't separate
/// components. An empty expression is the empty type.
///
pub(crate) fn parse(components: &Components, expr: &str) -> Result<Vec<ComponentId>, ParseError> {
    let mut cursor = Cursor::new(expr);
    let mut ids = Vec::new();

    cursor.skip_ws();

    if cursor.is_eof() {
        return Ok(ids);
    }

    loop {
        let start = cursor.pos;
        let name = cursor.identifier()?;

        match components.lookup(name) {
            Some(id) => ids.push(id),
            None => {
                return Err(cursor.error_at(start, format!("unresolved identifier '{}'", name)));
            }
        }

        cursor.skip_ws();

        match cursor.peek() {
            None => break,
            Some(b',') => {
                cursor.pos += 1;
                cursor.skip_ws();
            }
            Some(_) => {
                return Err(cursor.error("expected ',' between component identifiers"));
            }
        }
    }

    Ok(ids)
}

struct Cursor<'a> {
    expr: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(expr: &'a str) -> Self {
        Self {
            expr,
            bytes: expr.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;

        match self.peek() {
            None | Some(b',') => {
                return Err(self.error("expected component identifier"));
            }
            Some(b) if ! (b.is_ascii_alphabetic() || b == b'_') => {
                return Err(self.error(format!("invalid identifier (starts with '{}')", b as char)));
            }
            Some(_) => {}
        }

        while let Some(b) = self.peek() {
            match b {
                b'<' | b'(' => self.skip_scope()?,
                b'>' | b')' => {
                    return Err(self.error(format!("mismatching {} in identifier", b as char)));
                }
                b if b.is_ascii_alphanumeric() || b == b'_' || b == b':' || b == b'.' => {
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let expr = self.expr;

        Ok(&expr[start..self.pos])
    }

    fn skip_scope(&mut self) -> Result<(), ParseError> {
        let mut stack = Vec::new();

        while let Some(b) = self.peek() {
            match b {
                b'<' | b'(' => stack.push(b),
                b'>' | b')' => {
                    let open = if b == b'>' { b'<' } else { b'(' };

                    if stack.pop() != Some(open) {
                        return Err(self.error(format!("mismatching {} in identifier", b as char)));
                    }
                }
                _ => {}
            }

            self.pos += 1;

            if stack.is_empty() {
                return Ok(());
            }
        }

        Err(self.error("unexpected end of token"))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let error = ParseError::new(NAME, self.expr, offset, message);

        warn!("{}", error);

        error
    }
}
