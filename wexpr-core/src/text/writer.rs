// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Text serialization (spec §4.7): minified and human-readable modes.

use wexpr_types::Expression;

/// Flags altering how [`write`] renders an expression.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteFlags {
    pub human_readable: bool,
}

impl WriteFlags {
    pub const NONE: WriteFlags = WriteFlags { human_readable: false };

    pub fn human_readable() -> Self {
        Self { human_readable: true }
    }
}

fn is_not_bareword_safe(b: u8) -> bool {
    matches!(
        b,
        b'*' | b'#' | b'@' | b'(' | b')' | b'[' | b']' | b'^' | b'<' | b'>' | b'"' | b';' | b' ' | b'\t' | b'\r' | b'\n'
    )
}

fn is_bareword_safe(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| !is_not_bareword_safe(b))
}

fn write_string_value(s: &str, out: &mut String) {
    if is_bareword_safe(s) {
        out.push_str(s);
        return;
    }

    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
}

fn indent_of(n: usize) -> String {
    "\t".repeat(n)
}

fn write_expr(expr: &Expression, flags: WriteFlags, indent: usize, out: &mut String) {
    match expr {
        Expression::Null => out.push_str("null"),
        Expression::Value(v) => write_string_value(v, out),
        Expression::BinaryData(b) => {
            out.push('<');
            out.push_str(&crate::base64::encode(b));
            out.push('>');
        }
        Expression::Array(items) => {
            if items.is_empty() {
                out.push_str("#()");
                return;
            }
            out.push_str("#(");
            if flags.human_readable {
                out.push('\n');
                for item in items {
                    out.push_str(&indent_of(indent + 1));
                    write_expr(item, flags, indent + 1, out);
                    out.push('\n');
                }
                out.push_str(&indent_of(indent));
            } else {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    write_expr(item, flags, indent, out);
                }
            }
            out.push(')');
        }
        Expression::Map(map) => {
            if map.is_empty() {
                out.push_str("@()");
                return;
            }
            out.push_str("@(");
            if flags.human_readable {
                out.push('\n');
                for (key, value) in map.iter() {
                    out.push_str(&indent_of(indent + 1));
                    write_string_value(key, out);
                    out.push(' ');
                    write_expr(value, flags, indent + 1, out);
                    out.push('\n');
                }
                out.push_str(&indent_of(indent));
            } else {
                let mut first = true;
                for (key, value) in map.iter() {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    write_string_value(key, out);
                    out.push(' ');
                    write_expr(value, flags, indent, out);
                }
            }
            out.push(')');
        }
    }
}

/// Render `expr` as Wexpr text. The writer does not emit comments or
/// reconstruct alias bindings; every splice site is written out in full
/// (spec §4.7).
pub fn write(expr: &Expression, flags: WriteFlags) -> String {
    let mut out = String::new();
    write_expr(expr, flags, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wexpr_types::ExpressionMap;

    #[test]
    fn empty_containers_collapse() {
        assert_eq!(write(&Expression::array(), WriteFlags::NONE), "#()");
        assert_eq!(write(&Expression::map(), WriteFlags::NONE), "@()");
    }

    #[test]
    fn bareword_values_are_unquoted() {
        assert_eq!(write(&Expression::value("hello"), WriteFlags::NONE), "hello");
    }

    #[test]
    fn values_needing_escape_are_quoted() {
        assert_eq!(write(&Expression::value("20% cooler"), WriteFlags::NONE), "\"20% cooler\"");
        assert_eq!(write(&Expression::value(""), WriteFlags::NONE), "\"\"");
    }

    #[test]
    fn null_is_literal() {
        assert_eq!(write(&Expression::null(), WriteFlags::NONE), "null");
    }

    #[test]
    fn minified_array_uses_single_space_separators() {
        let mut a = Expression::array();
        a.array_append(Expression::value("1"));
        a.array_append(Expression::value("2"));
        assert_eq!(write(&a, WriteFlags::NONE), "#(1 2)");
    }

    #[test]
    fn human_readable_array_indents_children() {
        let mut a = Expression::array();
        a.array_append(Expression::value("a"));
        a.array_append(Expression::value("b"));
        assert_eq!(write(&a, WriteFlags::human_readable()), "#(\n\ta\n\tb\n)");
    }

    #[test]
    fn human_readable_map_nests_correctly() {
        let mut inner = ExpressionMap::new();
        inner.set("a", Expression::value("b"));
        let mut outer = ExpressionMap::new();
        outer.set("first", Expression::Map(inner));
        let expr = Expression::Map(outer);
        assert_eq!(write(&expr, WriteFlags::human_readable()), "@(\n\tfirst @(\n\t\ta b\n\t)\n)");
    }

    #[test]
    fn binary_data_is_base64() {
        assert_eq!(write(&Expression::binary_data(b"hello".to_vec()), WriteFlags::NONE), "<aGVsbG8=>");
    }
}
