// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Recursive-descent text parser (spec §4.6).
//!
//! Operates on raw bytes rather than `&str`: line/column tracking must
//! advance byte-by-byte without splitting multi-byte UTF-8 sequences, and
//! re-slicing a `String` on every token would make that harder to get right,
//! not easier.

use wexpr_types::{Error, ErrorKind, Expression, ExpressionMap, ReferenceTable};

/// Flags altering how [`parse`] interprets input.
///
/// No flags are currently defined; this exists so a flag can be added later
/// without breaking the call signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseFlags;

fn is_newline(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t' || is_newline(b)
}

fn is_not_bareword_safe(b: u8) -> bool {
    matches!(
        b,
        b'*' | b'#' | b'@' | b'(' | b')' | b'[' | b']' | b'^' | b'<' | b'>' | b'"' | b';'
    ) || is_whitespace(b)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    aliases: ReferenceTable,
    external: Option<&'a ReferenceTable>,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], external: Option<&'a ReferenceTable>) -> Self {
        Self {
            data,
            pos: 0,
            line: 1,
            col: 1,
            aliases: ReferenceTable::new(),
            external,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte_at(&self, rel: usize) -> Option<u8> {
        self.data.get(self.pos + rel).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.byte_at(0)
    }

    fn peek2(&self) -> Option<u8> {
        self.byte_at(1)
    }

    fn find(&self, needle: u8) -> Option<usize> {
        self.data[self.pos..].iter().position(|&b| b == needle)
    }

    fn find_sub(&self, needle: &[u8]) -> Option<usize> {
        if self.pos + needle.len() > self.data.len() {
            return None;
        }
        self.data[self.pos..].windows(needle.len()).position(|w| w == needle)
    }

    fn starts_with(&self, needle: &[u8]) -> bool {
        self.data[self.pos..].starts_with(needle)
    }

    fn pos_now(&self) -> (u32, u32) {
        (self.line, self.col)
    }

    /// Consume `n` bytes, advancing `line`/`column`. Line advances on `\r`
    /// or `\n`; every other byte advances the column (spec §4.6 char
    /// classes).
    fn advance(&mut self, n: usize) {
        for &b in &self.data[self.pos..self.pos + n] {
            if is_newline(b) {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += n;
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                None => return,
                Some(c) if is_whitespace(c) => self.advance(1),
                Some(b';') => {
                    if self.starts_with(b";(--") {
                        match self.find_sub(b"--)") {
                            Some(idx) => self.advance(idx + 3),
                            None => self.advance(self.data.len() - self.pos),
                        }
                    } else {
                        match self.find(b'\n') {
                            Some(idx) => self.advance(idx + 1),
                            None => self.advance(self.data.len() - self.pos),
                        }
                    }
                }
                Some(_) => return,
            }
        }
    }

    fn parse_root(&mut self) -> Result<Expression, Error> {
        if self.data.is_empty() {
            return Err(Error::at(ErrorKind::EmptyString, "was told to parse an empty string", 1, 1));
        }
        self.skip_ws_and_comments();
        if self.at_end() {
            let (l, c) = self.pos_now();
            return Err(Error::at(ErrorKind::EmptyString, "input contained no expression", l, c));
        }
        let expr = self.parse_expr()?;
        self.skip_ws_and_comments();
        if !self.at_end() {
            let (l, c) = self.pos_now();
            return Err(Error::at(
                ErrorKind::ExtraDataAfterParsingRoot,
                "extra data after parsing the root expression",
                l,
                c,
            ));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expression, Error> {
        self.skip_ws_and_comments();
        if self.at_end() {
            let (l, c) = self.pos_now();
            return Err(Error::at(ErrorKind::EmptyString, "expected an expression", l, c));
        }
        match (self.peek().unwrap(), self.peek2()) {
            (b'#', Some(b'(')) => self.parse_array(),
            (b'@', Some(b'(')) => self.parse_map(),
            (b'[', _) => self.parse_alias(),
            (b'*', Some(b'[')) => self.parse_splice(),
            (b'<', _) => self.parse_binary(),
            _ => self.parse_value(),
        }
    }

    fn parse_array(&mut self) -> Result<Expression, Error> {
        self.advance(2);
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments();
            if self.at_end() {
                let (l, c) = self.pos_now();
                return Err(Error::at(ErrorKind::ArrayMissingEndParen, "an array was missing its ending paren", l, c));
            }
            if self.peek() == Some(b')') {
                self.advance(1);
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expression::Array(items))
    }

    fn parse_map(&mut self) -> Result<Expression, Error> {
        self.advance(2);
        let mut map = ExpressionMap::new();
        loop {
            self.skip_ws_and_comments();
            if self.at_end() {
                let (l, c) = self.pos_now();
                return Err(Error::at(ErrorKind::MapMissingEndParen, "a map was missing its ending paren", l, c));
            }
            if self.peek() == Some(b')') {
                self.advance(1);
                break;
            }

            let key_pos = self.pos_now();
            let key_expr = self.parse_expr()?;
            let key = match key_expr {
                Expression::Value(v) => v,
                _ => {
                    return Err(Error::at(
                        ErrorKind::MapKeyMustBeAValue,
                        "map keys must be a value",
                        key_pos.0,
                        key_pos.1,
                    ))
                }
            };

            self.skip_ws_and_comments();
            if self.at_end() || self.peek() == Some(b')') {
                return Err(Error::at(ErrorKind::MapNoValue, "map key must have a value", key_pos.0, key_pos.1));
            }
            let value_expr = self.parse_expr()?;
            map.set(key, value_expr);
        }
        Ok(Expression::Map(map))
    }

    fn parse_alias(&mut self) -> Result<Expression, Error> {
        let (err_line, err_col) = self.pos_now();
        let end_rel = match self.find(b']') {
            Some(i) => i,
            None => {
                return Err(Error::at(
                    ErrorKind::ReferenceMissingEndBracket,
                    "a reference [] is missing its ending bracket",
                    err_line,
                    err_col,
                ))
            }
        };

        let name_bytes = &self.data[self.pos + 1..self.pos + end_rel];
        if !is_valid_reference_name(name_bytes) {
            return Err(Error::at(
                ErrorKind::ReferenceInvalidName,
                "a reference doesn't have a valid name",
                err_line,
                err_col,
            ));
        }
        let name = std::str::from_utf8(name_bytes).unwrap().to_owned();

        self.advance(end_rel + 1);
        let expr = self.parse_expr()?;
        self.aliases.set(name, expr.clone());
        Ok(expr)
    }

    fn parse_splice(&mut self) -> Result<Expression, Error> {
        let (err_line, err_col) = self.pos_now();
        let end_rel = match self.find(b']') {
            Some(i) => i,
            None => {
                return Err(Error::at(
                    ErrorKind::ReferenceInsertMissingEndBracket,
                    "a reference insert *[] is missing its ending bracket",
                    err_line,
                    err_col,
                ))
            }
        };

        let name_bytes = &self.data[self.pos + 2..self.pos + end_rel];
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        self.advance(end_rel + 1);

        if let Some(found) = self.aliases.get(&name) {
            return Ok(found.clone());
        }
        if let Some(ext) = self.external {
            if let Some(found) = ext.get_or_synthesize(&name) {
                return Ok(found);
            }
        }

        let (l, c) = self.pos_now();
        Err(Error::at(
            ErrorKind::ReferenceUnknownReference,
            format!("tried to insert a reference '{name}', but couldn't find it"),
            l,
            c,
        ))
    }

    fn parse_binary(&mut self) -> Result<Expression, Error> {
        let (err_line, err_col) = self.pos_now();
        let end_rel = match self.find(b'>') {
            Some(i) => i,
            None => {
                return Err(Error::at(
                    ErrorKind::BinaryDataNoEnding,
                    "tried to find the ending > for binary data, but not found",
                    err_line,
                    err_col,
                ))
            }
        };

        let b64 = &self.data[self.pos + 1..self.pos + end_rel];
        let decoded = crate::base64::decode(b64).map_err(|_| {
            Error::at(
                ErrorKind::BinaryDataInvalidBase64,
                "unable to decode the base64 data",
                err_line,
                err_col,
            )
        })?;

        self.advance(end_rel + 1);
        Ok(Expression::binary_data(decoded))
    }

    fn parse_value(&mut self) -> Result<Expression, Error> {
        let (start_line, start_col) = self.pos_now();
        let is_quoted = self.peek() == Some(b'"');

        let mut buf: Vec<u8> = Vec::new();
        let mut i = if is_quoted { 1 } else { 0 };
        let mut closed = !is_quoted;
        let mut escaped = false;

        while let Some(c) = self.byte_at(i) {
            if is_quoted {
                if escaped {
                    let value = match c {
                        b'"' => b'"',
                        b'r' => b'\r',
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'\\' => b'\\',
                        _ => {
                            return Err(Error::at(
                                ErrorKind::InvalidStringEscape,
                                "invalid escape found in the string",
                                start_line,
                                start_col,
                            ))
                        }
                    };
                    buf.push(value);
                    escaped = false;
                    i += 1;
                } else if c == b'"' {
                    i += 1;
                    closed = true;
                    break;
                } else if c == b'\\' {
                    escaped = true;
                    i += 1;
                } else {
                    buf.push(c);
                    i += 1;
                }
            } else {
                if is_not_bareword_safe(c) {
                    break;
                }
                buf.push(c);
                i += 1;
            }
        }

        if !is_quoted && buf.is_empty() {
            return Err(Error::at(ErrorKind::EmptyString, "was told to parse an empty string", start_line, start_col));
        }

        if is_quoted && !closed {
            // The original library has no explicit check for this and simply
            // treats the rest of the input as the string's content; we
            // report it instead once we've consumed everything there was.
            self.advance(i);
            let (l, c) = self.pos_now();
            return Err(Error::at(ErrorKind::StringMissingEndingQuote, "string is missing its ending quote", l, c));
        }

        self.advance(i);

        let text = String::from_utf8(buf)
            .map_err(|_| Error::at(ErrorKind::InvalidUTF8, "value is not valid UTF-8", start_line, start_col))?;

        // Only an unquoted bareword of exactly "null"/"nil" becomes Null.
        if !is_quoted && (text == "null" || text == "nil") {
            Ok(Expression::Null)
        } else {
            Ok(Expression::Value(text))
        }
    }
}

fn is_valid_reference_name(name: &[u8]) -> bool {
    if name.is_empty() {
        return false;
    }
    for (i, &b) in name.iter().enumerate() {
        let alpha = b.is_ascii_alphabetic();
        let digit = b.is_ascii_digit();
        let under = b == b'_';
        let ok = if i == 0 { alpha || under } else { alpha || digit || under };
        if !ok {
            return false;
        }
    }
    true
}

/// Parse a whole document from `input`.
///
/// `external` is consulted as a fallback for `*[name]` splices not found in
/// the document's own alias table (spec §4.5/§9).
pub fn parse(input: &[u8], _flags: ParseFlags, external: Option<&ReferenceTable>) -> Result<Expression, Error> {
    Parser::new(input, external).parse_root()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_ok(s: &str) -> Expression {
        parse(s.as_bytes(), ParseFlags::default(), None).unwrap()
    }

    fn parse_err(s: &str) -> Error {
        parse(s.as_bytes(), ParseFlags::default(), None).unwrap_err()
    }

    #[test]
    fn array_of_barewords() {
        let e = parse_ok("#(1 2 3)");
        assert_eq!(e.array_count(), 3);
        assert_eq!(e.array_at(0).unwrap().as_value(), Some("1"));
        assert_eq!(e.array_at(2).unwrap().as_value(), Some("3"));
    }

    #[test]
    fn map_alternates_key_value() {
        let e = parse_ok("@(a b c d)");
        assert_eq!(e.map_count(), 2);
        assert_eq!(e.map_get("a").unwrap().as_value(), Some("b"));
        assert_eq!(e.map_get("c").unwrap().as_value(), Some("d"));
    }

    #[test]
    fn alias_and_splice_are_independent() {
        let e = parse_ok(r#"@(first [val]"name" second *[val])"#);
        assert_eq!(e.map_get("first").unwrap().as_value(), Some("name"));
        assert_eq!(e.map_get("second").unwrap().as_value(), Some("name"));
        // mutating a clone of "first" must not disturb "second"'s independent copy
        let mut first = e.map_get("first").unwrap().clone();
        first.set_value("other");
        assert_eq!(e.map_get("second").unwrap().as_value(), Some("name"));
    }

    #[test]
    fn null_and_nil_barewords_parse_as_null() {
        assert!(parse_ok("null").is_null());
        assert!(parse_ok("nil").is_null());
        assert_eq!(parse_ok(r#""null""#).as_value(), Some("null"));
    }

    #[test]
    fn quoted_string_escapes() {
        let e = parse_ok(r#""a\"b\\c\nd""#);
        assert_eq!(e.as_value(), Some("a\"b\\c\nd"));
    }

    #[test]
    fn empty_bareword_is_empty_string_error() {
        assert_eq!(parse_err(")").kind, ErrorKind::EmptyString);
    }

    #[test]
    fn unterminated_quote_is_reported() {
        assert_eq!(parse_err(r#""abc"#).kind, ErrorKind::StringMissingEndingQuote);
    }

    #[test]
    fn invalid_escape_is_reported() {
        assert_eq!(parse_err(r#""a\qb""#).kind, ErrorKind::InvalidStringEscape);
    }

    #[test]
    fn unterminated_array_is_reported() {
        assert_eq!(parse_err("#(1 2").kind, ErrorKind::ArrayMissingEndParen);
    }

    #[test]
    fn unterminated_map_is_reported() {
        assert_eq!(parse_err("@(a").kind, ErrorKind::MapMissingEndParen);
    }

    #[test]
    fn map_key_must_be_a_value() {
        assert_eq!(parse_err("@(#(1 2) b)").kind, ErrorKind::MapKeyMustBeAValue);
    }

    #[test]
    fn map_key_without_value_is_reported() {
        assert_eq!(parse_err("@(a)").kind, ErrorKind::MapNoValue);
    }

    #[test]
    fn unknown_splice_is_reported() {
        assert_eq!(parse_err("*[missing]").kind, ErrorKind::ReferenceUnknownReference);
    }

    #[test]
    fn invalid_reference_name_is_reported() {
        assert_eq!(parse_err("[1abc]x").kind, ErrorKind::ReferenceInvalidName);
    }

    #[test]
    fn binary_literal_round_trips_through_base64() {
        let e = parse_ok("<aGVsbG8=>");
        assert_eq!(e.as_binary_data().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn binary_literal_missing_end_is_reported() {
        assert_eq!(parse_err("<aGVsbG8=").kind, ErrorKind::BinaryDataNoEnding);
    }

    #[test]
    fn extra_trailing_data_is_reported() {
        assert_eq!(parse_err("1 2").kind, ErrorKind::ExtraDataAfterParsingRoot);
    }

    #[test]
    fn only_whitespace_is_empty_string() {
        assert_eq!(parse_err("   ;; not a comment opener, just whitespace then comment\n").kind, ErrorKind::EmptyString);
    }

    #[test]
    fn comments_are_skipped() {
        let e = parse_ok("; a line comment\n;(--\n  block\n--)\n42");
        assert_eq!(e.as_value(), Some("42"));
    }

    #[test]
    fn line_and_column_tracking() {
        let err = parse_err("#(\n  )x");
        // after two lines, column 3 is where the stray 'x' was first seen
        assert_eq!(err.kind, ErrorKind::ExtraDataAfterParsingRoot);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn minified_round_trip_is_structurally_idempotent() {
        use super::super::writer::{write, WriteFlags};

        let original = parse_ok(r#"@(name "20% cooler" tags #(a b c) blob <aGVsbG8=> nothing null)"#);
        let minified = write(&original, WriteFlags::NONE);
        let reparsed = parse_ok(&minified);
        assert_eq!(original, reparsed);
    }
}
