//! Byte cursor over Lua table-constructor text.
//!
//! The reader never evaluates anything. It records where keys, values and whole
//! entries start and end so callers can keep the original bytes of everything
//! they do not rewrite.

use crate::layout::ByteRange;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLiteral {
    Str(String),
    Other,
}

impl KeyLiteral {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Other => None,
        }
    }
}

/// One `key = value,` (or positional `value,`) inside a table body.
///
/// `range` starts right after the previous entry, so it includes the leading
/// whitespace and comments, and ends after the separator when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpan {
    pub range: ByteRange,
    pub key: Option<KeyLiteral>,
    pub value: ByteRange,
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpan {
    pub open: usize,
    pub body_start: usize,
    pub entries: Vec<EntrySpan>,
    pub body_end: usize,
    pub end: usize,
}

impl TableSpan {
    /// Offset where trailing trivia before the closing brace begins.
    pub fn last_entry_end(&self) -> usize {
        self.entries
            .last()
            .map(|entry| entry.range.end)
            .unwrap_or(self.body_start)
    }

    pub fn find(&self, key: &str) -> Option<&EntrySpan> {
        self.entries
            .iter()
            .find(|entry| entry.key.as_ref().and_then(KeyLiteral::as_str) == Some(key))
    }
}

/// Top-level `Name = value` statement of a SavedVariables file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSpan {
    pub name: String,
    pub value: ByteRange,
}

pub struct LuaReader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LuaReader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek_to(&mut self, pos: usize) {
        self.pos = pos.min(self.bytes.len());
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn slice(&self, range: ByteRange) -> &'a str {
        &self.src[range.start..range.end]
    }

    pub fn read_global(&mut self) -> Result<Option<GlobalSpan>, SyntaxError> {
        self.skip_trivia()?;
        while self.peek() == Some(b';') {
            self.pos += 1;
            self.skip_trivia()?;
        }
        if self.is_eof() {
            return Ok(None);
        }

        let Some(name) = self.read_name() else {
            return Err(self.error("expected a global name"));
        };
        let name = name.to_string();
        self.skip_trivia()?;
        self.expect(b'=')?;
        let value = self.skip_value()?;
        Ok(Some(GlobalSpan { name, value }))
    }

    pub fn read_table(&mut self) -> Result<TableSpan, SyntaxError> {
        self.skip_trivia()?;
        let open = self.pos;
        self.expect(b'{')?;
        let body_start = self.pos;
        let mut entries = Vec::new();

        loop {
            let entry_start = self.pos;
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error_at(open, "unterminated table")),
                Some(b'}') => {
                    let body_end = self.pos;
                    self.pos += 1;
                    return Ok(TableSpan {
                        open,
                        body_start,
                        entries,
                        body_end,
                        end: self.pos,
                    });
                }
                _ => {}
            }

            let key = self.read_entry_key()?;
            let value = self.skip_value()?;
            let value_end = self.pos;

            self.skip_trivia()?;
            let terminated = matches!(self.peek(), Some(b',' | b';'));
            if terminated {
                self.pos += 1;
            } else if self.peek() == Some(b'}') {
                self.pos = value_end;
            } else {
                return Err(self.error("expected ',' or '}' after table value"));
            }

            entries.push(EntrySpan {
                range: ByteRange {
                    start: entry_start,
                    end: self.pos,
                },
                key,
                value,
                terminated,
            });
        }
    }

    pub fn skip_value(&mut self) -> Result<ByteRange, SyntaxError> {
        self.skip_trivia()?;
        let start = self.pos;
        match self.peek() {
            None => return Err(self.error("expected a value")),
            Some(b'"' | b'\'') => {
                self.read_quoted()?;
            }
            Some(b'[') if self.long_bracket_level(self.pos).is_some() => {
                self.read_long_bracket()?;
            }
            Some(b'{') => {
                self.read_table()?;
            }
            Some(b'-') => {
                self.pos += 1;
                if !self.at_number_start() {
                    return Err(self.error("expected a number after '-'"));
                }
                self.skip_number();
            }
            Some(_) if self.at_number_start() => self.skip_number(),
            Some(b) if is_name_start(b) => {
                self.read_name();
            }
            Some(b) => {
                return Err(self.error(format!("unexpected character {:?}", b as char)));
            }
        }
        Ok(ByteRange {
            start,
            end: self.pos,
        })
    }

    pub fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | b'\x0b' | b'\x0c') => self.pos += 1,
                Some(b'-') if self.bytes.get(self.pos + 1) == Some(&b'-') => {
                    self.pos += 2;
                    if self.long_bracket_level(self.pos).is_some() {
                        self.read_long_bracket()?;
                    } else {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read a quoted or long-bracket string literal and return its decoded text.
    pub fn read_string(&mut self) -> Result<String, SyntaxError> {
        self.skip_trivia()?;
        let start = self.pos;
        let bytes = self.read_string_bytes()?;
        String::from_utf8(bytes).map_err(|_| self.error_at(start, "string is not valid UTF-8"))
    }

    fn read_string_bytes(&mut self) -> Result<Vec<u8>, SyntaxError> {
        match self.peek() {
            Some(b'"' | b'\'') => self.read_quoted(),
            Some(b'[') if self.long_bracket_level(self.pos).is_some() => self.read_long_bracket(),
            _ => Err(self.error("expected a string")),
        }
    }

    fn read_entry_key(&mut self) -> Result<Option<KeyLiteral>, SyntaxError> {
        match self.peek() {
            Some(b'[') if self.long_bracket_level(self.pos).is_none() => {
                self.pos += 1;
                self.skip_trivia()?;
                let string_key = match self.peek() {
                    Some(b'"' | b'\'') => true,
                    Some(b'[') => self.long_bracket_level(self.pos).is_some(),
                    _ => false,
                };
                let key = if string_key {
                    // keys that are not UTF-8 text can only be kept verbatim
                    String::from_utf8(self.read_string_bytes()?)
                        .map_or(KeyLiteral::Other, KeyLiteral::Str)
                } else {
                    self.skip_value()?;
                    KeyLiteral::Other
                };
                self.skip_trivia()?;
                self.expect(b']')?;
                self.skip_trivia()?;
                self.expect(b'=')?;
                Ok(Some(key))
            }
            Some(b) if is_name_start(b) => {
                let rewind = self.pos;
                let name = self.read_name().unwrap_or_default().to_string();
                self.skip_trivia()?;
                if self.peek() == Some(b'=') && self.bytes.get(self.pos + 1) != Some(&b'=') {
                    self.pos += 1;
                    Ok(Some(KeyLiteral::Str(name)))
                } else {
                    self.pos = rewind;
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_name_start(b) => self.pos += 1,
            _ => return None,
        }
        while let Some(b) = self.peek() {
            if !is_name_char(b) {
                break;
            }
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    fn read_quoted(&mut self) -> Result<Vec<u8>, SyntaxError> {
        let start = self.pos;
        let quote = self.bytes[self.pos];
        self.pos += 1;
        let mut out = Vec::new();

        loop {
            let Some(b) = self.peek() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            self.pos += 1;
            match b {
                b if b == quote => return Ok(out),
                b'\n' | b'\r' => return Err(self.error_at(start, "unterminated string")),
                b'\\' => self.read_escape(&mut out)?,
                other => out.push(other),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<(), SyntaxError> {
        let Some(b) = self.peek() else {
            return Err(self.error("unterminated escape sequence"));
        };
        self.pos += 1;
        match b {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'\\' | b'"' | b'\'' => out.push(b),
            b'\n' | b'\r' => {
                let pair = if b == b'\n' { b'\r' } else { b'\n' };
                if self.peek() == Some(pair) {
                    self.pos += 1;
                }
                out.push(b'\n');
            }
            b'z' => {
                while matches!(
                    self.peek(),
                    Some(b' ' | b'\t' | b'\r' | b'\n' | b'\x0b' | b'\x0c')
                ) {
                    self.pos += 1;
                }
            }
            b'x' => {
                let hex = self
                    .bytes
                    .get(self.pos..self.pos + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| self.error("invalid \\x escape"))?;
                self.pos += 2;
                out.push(hex);
            }
            b'u' => {
                if self.peek() != Some(b'{') {
                    return Err(self.error("invalid \\u escape"));
                }
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek(), Some(h) if h.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid \\u escape"))?;
                self.expect(b'}')?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(code.encode_utf8(&mut buf).as_bytes());
            }
            d if d.is_ascii_digit() => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(n) if n.is_ascii_digit() => {
                            value = value * 10 + u32::from(n - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value).map_err(|_| self.error("decimal escape too large"))?;
                out.push(byte);
            }
            other => {
                return Err(self.error(format!("invalid escape '\\{}'", other as char)));
            }
        }
        Ok(())
    }

    /// Level of a long bracket opening at `pos` (`[[` is 0, `[==[` is 2).
    fn long_bracket_level(&self, pos: usize) -> Option<usize> {
        if self.bytes.get(pos) != Some(&b'[') {
            return None;
        }
        let mut level = 0;
        let mut cursor = pos + 1;
        while self.bytes.get(cursor) == Some(&b'=') {
            level += 1;
            cursor += 1;
        }
        (self.bytes.get(cursor) == Some(&b'[')).then_some(level)
    }

    fn read_long_bracket(&mut self) -> Result<Vec<u8>, SyntaxError> {
        let start = self.pos;
        let level = self
            .long_bracket_level(self.pos)
            .ok_or_else(|| self.error("expected a long bracket"))?;
        self.pos += level + 2;

        // a newline right after the opening bracket is not part of the content
        if self.peek() == Some(b'\r') {
            self.pos += 1;
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
        } else if self.peek() == Some(b'\n') {
            self.pos += 1;
        }

        let content_start = self.pos;
        let mut close = String::from("]");
        close.push_str(&"=".repeat(level));
        close.push(']');

        match self.src[self.pos..].find(&close) {
            Some(offset) => {
                let content = self.bytes[content_start..content_start + offset].to_vec();
                self.pos = content_start + offset + close.len();
                Ok(content)
            }
            None => Err(self.error_at(start, "unterminated long bracket")),
        }
    }

    fn at_number_start(&self) -> bool {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'.') => matches!(self.bytes.get(self.pos + 1), Some(d) if d.is_ascii_digit()),
            _ => false,
        }
    }

    fn skip_number(&mut self) {
        while let Some(b) = self.peek() {
            let exponent_sign = (b == b'+' || b == b'-')
                && matches!(
                    self.pos.checked_sub(1).and_then(|p| self.bytes.get(p)),
                    Some(b'e' | b'E' | b'p' | b'P')
                );
            if b.is_ascii_alphanumeric() || b == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), SyntaxError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        let offset = offset.min(self.bytes.len());
        let before = &self.bytes[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let column = offset - before.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1) + 1;
        SyntaxError {
            offset,
            line,
            column,
            message: message.into(),
        }
    }
}

/// Decode a value span that holds a single string literal.
pub fn string_literal(text: &str) -> Option<String> {
    let mut reader = LuaReader::new(text);
    let value = reader.read_string().ok()?;
    reader.skip_trivia().ok()?;
    reader.is_eof().then_some(value)
}

pub fn bool_literal(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries_cover_trivia_and_separators() {
        let src = "{\n\t[\"a\"] = 1, -- note\n\tb = \"x\",\n\ttrue,\n}";
        let mut reader = LuaReader::new(src);
        let table = reader.read_table().expect("table parses");

        assert_eq!(table.entries.len(), 3);
        assert_eq!(
            table.entries[0].key,
            Some(KeyLiteral::Str("a".to_string()))
        );
        assert_eq!(table.entries[1].key, Some(KeyLiteral::Str("b".to_string())));
        assert_eq!(table.entries[2].key, None);
        assert!(table.entries.iter().all(|e| e.terminated));

        let mut covered = String::from("{");
        for entry in &table.entries {
            covered.push_str(reader.slice(entry.range));
        }
        covered.push_str(&src[table.last_entry_end()..table.end]);
        assert_eq!(covered, src);
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(
            string_literal(r#""1\001A\1B\x01C""#).as_deref(),
            Some("1\u{1}A\u{1}B\u{1}C")
        );
        assert_eq!(string_literal(r#""a\\`b\"""#).as_deref(), Some("a\\`b\""));
        assert_eq!(string_literal("[[line]]").as_deref(), Some("line"));
        assert_eq!(string_literal("\"a\" , "), None);
    }

    #[test]
    fn non_utf8_string_keys_are_other() {
        let mut reader = LuaReader::new("{ [\"\\255x\"] = 1, [\"ok\"] = 2 }");
        let table = reader.read_table().expect("table parses");
        assert_eq!(table.entries[0].key, Some(KeyLiteral::Other));
        assert_eq!(table.entries[1].key, Some(KeyLiteral::Str("ok".to_string())));
    }

    #[test]
    fn reports_position_of_unterminated_table() {
        let mut reader = LuaReader::new("{\n  [\"a\"] = {\n");
        let err = reader.read_table().expect_err("must fail");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn skips_numbers_and_negative_values() {
        let mut reader = LuaReader::new("{ -1.5e+3, 0x1F, .5, [3] = -2 }");
        let table = reader.read_table().expect("table parses");
        assert_eq!(table.entries.len(), 4);
        assert_eq!(table.entries[3].key, Some(KeyLiteral::Other));
    }
}
