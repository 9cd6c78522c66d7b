// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! The Wexpr expression tree.
//!
//! `Expression` is a tagged sum of the five shapes defined in the format:
//! null, value, binary-data, array, and map. Parents own their children;
//! there is no way to construct a cycle through the public API.

use bytes::Bytes;
use std::collections::HashMap;

/// The shape of an [`Expression`], without its payload.
///
/// Used by shape-checked accessors and by the schema validator's primitive
/// type mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Null,
    Value,
    BinaryData,
    Array,
    Map,
}

/// A single map entry. Kept in insertion order; see [`Expression::Map`].
#[derive(Debug, Clone, PartialEq)]
struct MapEntry {
    key: String,
    value: Expression,
}

/// An ordered map from string keys to owned expressions.
///
/// Keys are unique (last `set` wins) but iteration order is only guaranteed
/// to be stable *per instance*, not to match the order keys were written in
/// source text — callers who need reproducible output must sort (spec §9).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionMap {
    entries: Vec<MapEntry>,
    index: HashMap<String, usize>,
}

impl ExpressionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.key.as_str())
    }

    pub fn value_at(&self, index: usize) -> Option<&Expression> {
        self.entries.get(index).map(|e| &e.value)
    }

    pub fn value_at_mut(&mut self, index: usize) -> Option<&mut Expression> {
        self.entries.get_mut(index).map(|e| &mut e.value)
    }

    pub fn get(&self, key: &str) -> Option<&Expression> {
        self.index.get(key).map(|&i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Expression> {
        if let Some(&i) = self.index.get(key) {
            Some(&mut self.entries[i].value)
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or overwrite `key`. Last write wins; overwriting keeps the
    /// entry's original position rather than moving it to the end.
    pub fn set(&mut self, key: impl Into<String>, value: Expression) {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].value = value;
        } else {
            let i = self.entries.len();
            self.index.insert(key.clone(), i);
            self.entries.push(MapEntry { key, value });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }
}

/// A parsed or programmatically constructed Wexpr expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Null,
    /// A bareword, quoted, or otherwise lexical value. Must not contain an
    /// interior NUL; may only be empty when constructed programmatically
    /// (the parser never produces an empty value — see `EmptyString`).
    Value(String),
    BinaryData(Bytes),
    Array(Vec<Expression>),
    Map(ExpressionMap),
}

impl Expression {
    pub fn null() -> Self {
        Expression::Null
    }

    pub fn value(v: impl Into<String>) -> Self {
        Expression::Value(v.into())
    }

    pub fn binary_data(data: impl Into<Bytes>) -> Self {
        Expression::BinaryData(data.into())
    }

    pub fn array() -> Self {
        Expression::Array(Vec::new())
    }

    pub fn map() -> Self {
        Expression::Map(ExpressionMap::new())
    }

    /// The shape of this expression.
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            Expression::Null => ExpressionType::Null,
            Expression::Value(_) => ExpressionType::Value,
            Expression::BinaryData(_) => ExpressionType::BinaryData,
            Expression::Array(_) => ExpressionType::Array,
            Expression::Map(_) => ExpressionType::Map,
        }
    }

    /// Discard the current payload and become `Null`. Used by the retype
    /// operation in spec §4.4 before re-initializing to a different shape.
    pub fn retype(&mut self, to: ExpressionType) {
        *self = match to {
            ExpressionType::Null => Expression::Null,
            ExpressionType::Value => Expression::Value(String::new()),
            ExpressionType::BinaryData => Expression::BinaryData(Bytes::new()),
            ExpressionType::Array => Expression::Array(Vec::new()),
            ExpressionType::Map => Expression::Map(ExpressionMap::new()),
        };
    }

    /// An owned, independent copy of the whole subtree.
    ///
    /// Used by the text parser when resolving `*[name]` splices: the alias
    /// table's copy and each splice site's copy must not share structure, so
    /// mutating one never affects the other (spec §4.6).
    pub fn deep_copy(&self) -> Expression {
        self.clone()
    }

    // --- Value accessors ---

    pub fn as_value(&self) -> Option<&str> {
        match self {
            Expression::Value(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn set_value(&mut self, v: impl Into<String>) {
        *self = Expression::Value(v.into());
    }

    // --- BinaryData accessors ---

    pub fn as_binary_data(&self) -> Option<&Bytes> {
        match self {
            Expression::BinaryData(b) => Some(b),
            _ => None,
        }
    }

    pub fn set_binary_data(&mut self, data: impl Into<Bytes>) {
        *self = Expression::BinaryData(data.into());
    }

    // --- Array accessors ---

    pub fn array_count(&self) -> usize {
        match self {
            Expression::Array(v) => v.len(),
            _ => 0,
        }
    }

    pub fn array_at(&self, index: usize) -> Option<&Expression> {
        match self {
            Expression::Array(v) => v.get(index),
            _ => None,
        }
    }

    pub fn array_iter(&self) -> impl Iterator<Item = &Expression> {
        static EMPTY: &[Expression] = &[];
        match self {
            Expression::Array(v) => v.iter(),
            _ => EMPTY.iter(),
        }
    }

    /// Append an owned child to an array. No-op (returns `false`) if `self`
    /// is not an array — accessors never fail hard (spec §4.4).
    pub fn array_append(&mut self, child: Expression) -> bool {
        match self {
            Expression::Array(v) => {
                v.push(child);
                true
            }
            _ => false,
        }
    }

    // --- Map accessors ---

    pub fn map_count(&self) -> usize {
        match self {
            Expression::Map(m) => m.count(),
            _ => 0,
        }
    }

    pub fn map_key_at(&self, index: usize) -> Option<&str> {
        match self {
            Expression::Map(m) => m.key_at(index),
            _ => None,
        }
    }

    pub fn map_value_at(&self, index: usize) -> Option<&Expression> {
        match self {
            Expression::Map(m) => m.value_at(index),
            _ => None,
        }
    }

    pub fn map_get(&self, key: &str) -> Option<&Expression> {
        match self {
            Expression::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn map_get_mut(&mut self, key: &str) -> Option<&mut Expression> {
        match self {
            Expression::Map(m) => m.get_mut(key),
            _ => None,
        }
    }

    /// Insert or overwrite `key` in a map. No-op (returns `false`) if `self`
    /// is not a map.
    pub fn map_set(&mut self, key: impl Into<String>, value: Expression) -> bool {
        match self {
            Expression::Map(m) => {
                m.set(key, value);
                true
            }
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expression::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retype_discards_payload() {
        let mut e = Expression::value("hello");
        e.retype(ExpressionType::Array);
        assert_eq!(e.expression_type(), ExpressionType::Array);
        assert_eq!(e.array_count(), 0);
    }

    #[test]
    fn map_last_write_wins_keeps_position() {
        let mut m = ExpressionMap::new();
        m.set("a", Expression::value("1"));
        m.set("b", Expression::value("2"));
        m.set("a", Expression::value("3"));
        assert_eq!(m.count(), 2);
        assert_eq!(m.key_at(0), Some("a"));
        assert_eq!(m.get("a").and_then(Expression::as_value), Some("3"));
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut original = Expression::value("name");
        let copy = original.deep_copy();
        original.set_value("other");
        assert_eq!(copy.as_value(), Some("name"));
    }

    #[test]
    fn accessors_never_fail_hard_on_wrong_shape() {
        let v = Expression::value("x");
        assert_eq!(v.array_count(), 0);
        assert_eq!(v.map_count(), 0);
        assert_eq!(v.as_binary_data(), None);
    }
}
