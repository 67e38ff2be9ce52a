use log::warn;

use crate::error::ParseError;

///
/// A member type as written in a description: `const char*`,
/// `ecs_array(float, 3)`, `Position`.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeDesc {
    pub name: String,
    /// Argument list including its delimiters, such as `(float, 3)`.
    pub params: String,
    pub is_const: bool,
    pub is_ptr: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDesc {
    pub name: String,
    pub ty: TypeDesc,
    pub count: usize,
    /// Byte offset of the member's type in the description.
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantDesc {
    pub name: String,
    pub value: i64,
}

///
/// Parses a struct body such as `"{ int32_t x; int32_t y; }"`.
///
/// Members after an `ECS_PRIVATE` marker are not described.
///
pub fn parse_struct(name: &str, desc: &str) -> Result<Vec<MemberDesc>, ParseError> {
    let mut parser = Parser::new(name, desc);
    let mut members = Vec::new();

    while let Some(member) = parser.member()? {
        members.push(member);
    }

    Ok(members)
}

///
/// Parses an enum body such as `"{ Red, Green = 4, Blue }"`. Constants
/// without a value follow the previous one.
///
pub fn parse_enum(name: &str, desc: &str) -> Result<Vec<ConstantDesc>, ParseError> {
    Parser::new(name, desc).constants(false)
}

///
/// Parses a bitmask body such as `"{ Read = 1, Write = 2 }"`. Every
/// constant needs an explicit value.
///
pub fn parse_bitmask(name: &str, desc: &str) -> Result<Vec<ConstantDesc>, ParseError> {
    Parser::new(name, desc).constants(true)
}

///
/// Parses the `(T, N)` argument list of `ecs_array`.
///
pub(crate) fn parse_array_params(name: &str, params: &str) -> Result<(TypeDesc, usize), ParseError> {
    let mut parser = Parser::new(name, params);

    parser.skip_ws();

    if ! matches!(parser.peek(), Some(b'(') | Some(b'<')) {
        return Err(parser.error("expected '(' at start of collection definition"));
    }
    parser.pos += 1;

    let ty = match parser.ty()? {
        Some(ty) => ty,
        None => return Err(parser.error("unexpected ECS_PRIVATE in collection definition")),
    };

    parser.skip_ws();

    if parser.peek() != Some(b',') {
        return Err(parser.error("missing size for array"));
    }
    parser.pos += 1;
    parser.skip_ws();

    let start = parser.pos;
    let count = parser.number()?;

    if count <= 0 || count > i32::MAX as i64 {
        return Err(parser.error_at(start, "invalid array size"));
    }

    if ! matches!(parser.peek(), Some(b')') | Some(b'>')) {
        return Err(parser.error("expected ')' at end of collection definition"));
    }

    Ok((ty, count as usize))
}

///
/// Parses the single `(T)` or `<T>` argument of `flecs::bitmask` and
/// `ecs_vector`; `kind` names the collection in the size error.
///
pub(crate) fn parse_type_param(name: &str, params: &str, kind: &str) -> Result<TypeDesc, ParseError> {
    let mut parser = Parser::new(name, params);

    parser.skip_ws();

    if ! matches!(parser.peek(), Some(b'(') | Some(b'<')) {
        return Err(parser.error("expected '(' at start of collection definition"));
    }
    parser.pos += 1;

    let ty = match parser.ty()? {
        Some(ty) => ty,
        None => return Err(parser.error("unexpected ECS_PRIVATE in collection definition")),
    };

    parser.skip_ws();

    if parser.peek() == Some(b',') {
        return Err(parser.error(format!("unexpected size for {}", kind)));
    }

    if ! matches!(parser.peek(), Some(b')') | Some(b'>')) {
        return Err(parser.error("expected ')' at end of collection definition"));
    }

    Ok(ty)
}

struct Parser<'a> {
    name: &'a str,
    desc: &'a str,
    bytes: &'a [u8],
    pos: usize,
    opened: bool,
}

impl<'a> Parser<'a> {
    fn new(name: &'a str, desc: &'a str) -> Self {
        Self {
            name,
            desc,
            bytes: desc.as_bytes(),
            pos: 0,
            opened: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        let desc = self.desc;

        &desc[self.pos..]
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

    ///
    /// Enters the body on the first call and detects its end. Returns false
    /// once the closing brace has been consumed.
    ///
    fn open_scope(&mut self) -> Result<bool, ParseError> {
        self.skip_ws();

        if ! self.opened {
            if self.peek() != Some(b'{') {
                return Err(self.error("missing '{' in struct definition"));
            }

            self.pos += 1;
            self.opened = true;
            self.skip_ws();
        }

        match self.peek() {
            None => Err(self.error("missing '}' at end of struct definition")),
            Some(b'}') => {
                self.pos += 1;
                self.skip_ws();

                if self.peek().is_some() {
                    Err(self.error("stray characters after struct definition"))
                } else {
                    Ok(false)
                }
            }
            Some(_) => Ok(true),
        }
    }

    ///
    /// Reads an identifier. With `params`, a `(...)` or `<...>` argument
    /// list is split off and returned separately.
    ///
    fn identifier(&mut self, params: bool) -> Result<(String, String), ParseError> {
        self.skip_ws();

        match self.peek() {
            None => return Err(self.error("unexpected end of token")),
            Some(b) if ! (b.is_ascii_alphabetic() || b == b'_') => {
                return Err(self.error(format!("invalid identifier (starts with '{}')", b as char)));
            }
            Some(_) => {}
        }

        let mut name = String::new();
        let mut args = String::new();

        while let Some(b) = self.peek() {
            match b {
                b';' | b',' | b')' | b'>' | b'}' | b'*' | b'=' => break,
                b if b.is_ascii_whitespace() => break,
                b'(' | b'<' => {
                    if ! params {
                        return Err(self.error(format!("unexpected {}", b as char)));
                    }

                    let start = self.pos;
                    self.skip_scope()?;
                    args.push_str(&self.desc[start..self.pos]);
                }
                _ => {
                    name.push(b as char);
                    self.pos += 1;
                }
            }
        }

        if self.peek().is_none() {
            return Err(self.error("unexpected end of token"));
        }

        Ok((name, args))
    }

    fn skip_scope(&mut self) -> Result<(), ParseError> {
        let mut stack = Vec::new();

        while let Some(b) = self.peek() {
            match b {
                b'(' | b'<' => stack.push(b),
                b')' | b'>' => {
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

    /// Returns `None` at an `ECS_PRIVATE` marker.
    fn ty(&mut self) -> Result<Option<TypeDesc>, ParseError> {
        let (mut name, mut params) = self.identifier(true)?;
        let mut is_const = false;

        if name == "ECS_PRIVATE" {
            return Ok(None);
        }

        if name == "const" {
            is_const = true;
            (name, params) = self.identifier(true)?;
        }

        self.skip_ws();

        let is_ptr = if self.peek() == Some(b'*') {
            self.pos += 1;
            true
        } else {
            false
        };

        Ok(Some(TypeDesc { name, params, is_const, is_ptr }))
    }

    fn member(&mut self) -> Result<Option<MemberDesc>, ParseError> {
        if ! self.open_scope()? {
            return Ok(None);
        }

        let offset = self.pos;

        let ty = match self.ty()? {
            Some(ty) => ty,
            None => {
                self.pos = self.bytes.len();
                return Ok(None);
            }
        };

        let (mut name, _) = self.identifier(false)?;

        self.skip_ws();

        let mut count = 1;

        if let Some(start) = name.find('[') {
            count = self.array_count(&name[start..])?;
            name.truncate(start);
        } else if self.peek() == Some(b'[') {
            let rest = self.rest();
            let end = rest.find(']').map(|end| end + 1).unwrap_or(rest.len());

            count = self.array_count(&rest[..end])?;
            self.pos += end;
            self.skip_ws();
        }

        if self.peek() != Some(b';') {
            return Err(self.error("missing ';' after member declaration"));
        }

        self.pos += 1;

        Ok(Some(MemberDesc { name, ty, count, offset }))
    }

    /// Element count of a `[N]` suffix.
    fn array_count(&self, suffix: &str) -> Result<usize, ParseError> {
        let end = match suffix.find(']') {
            Some(end) => end,
            None => return Err(self.error("missing ']'")),
        };

        let digits = suffix[1..end].trim();

        if digits.is_empty() {
            return Err(self.error("dynamic size arrays are not supported"));
        }

        match parse_int(digits) {
            Some(count) if count > 0 && count <= i32::MAX as i64 => Ok(count as usize),
            _ => Err(self.error("invalid array size")),
        }
    }

    fn number(&mut self) -> Result<i64, ParseError> {
        self.skip_ws();

        let start = self.pos;

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let token = &self.desc[start..self.pos];

        let value = match parse_int(token) {
            Some(value) => value,
            None => return Err(self.error_at(start, format!("invalid constant value '{}'", token))),
        };

        self.skip_ws();

        Ok(value)
    }

    fn constants(&mut self, is_bitmask: bool) -> Result<Vec<ConstantDesc>, ParseError> {
        let mut constants = Vec::new();
        let mut next_value = 0i64;

        while self.open_scope()? {
            let start = self.pos;
            let (name, _) = self.identifier(false)?;

            self.skip_ws();

            let value = if self.peek() == Some(b'=') {
                self.pos += 1;
                self.number()?
            } else if is_bitmask {
                return Err(self.error("bitmask requires explicit value assignment"));
            } else {
                next_value
            };

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {},
                _ => return Err(self.error("missing ',' after enum constant")),
            }

            let in_range = if is_bitmask {
                u32::try_from(value).is_ok()
            } else {
                i32::try_from(value).is_ok()
            };

            if ! in_range {
                return Err(self.error_at(start, format!("value {} of constant '{}' is out of range", value, name)));
            }

            constants.push(ConstantDesc {
                name: self.strip_prefix(name),
                value,
            });

            next_value = value + 1;
        }

        Ok(constants)
    }

    /// `ColorRed` in type `Color` is stored as `Red`.
    fn strip_prefix(&self, name: String) -> String {
        let prefix = self.name;

        if ! prefix.is_empty() && name.len() > prefix.len() && name.starts_with(prefix) {
            name[prefix.len()..].to_string()
        } else {
            name
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let error = ParseError::new(self.name, self.desc, offset, message);

        warn!("{}", error);

        error
    }
}

/// Integer literal with C prefixes: `0x1f`, `017`, `-3`.
fn parse_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -value } else { value })
}
