// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Ordered name -> expression store.
//!
//! Used two ways (spec §4.5): internally, by a single parse, to record
//! `[name]` alias bindings; and optionally, supplied by the caller as a
//! read-only fallback consulted after the internal table when a `*[name]`
//! splice isn't found there.

use crate::expression::Expression;
use std::collections::HashMap;

/// Lazily produces an [`Expression`] for a name not already in the table.
///
/// Consulted as the final resort before a splice gives up with
/// `ReferenceUnknownReference` (spec §9).
pub type UnknownKeyCallback = Box<dyn Fn(&str) -> Option<Expression>>;

#[derive(Default)]
pub struct ReferenceTable {
    names: Vec<String>,
    values: Vec<Expression>,
    index: HashMap<String, usize>,
    unknown_key_callback: Option<UnknownKeyCallback>,
}

impl std::fmt::Debug for ReferenceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTable")
            .field("names", &self.names)
            .field("values", &self.values)
            .field("has_unknown_key_callback", &self.unknown_key_callback.is_some())
            .finish()
    }
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_key_callback(callback: UnknownKeyCallback) -> Self {
        Self {
            unknown_key_callback: Some(callback),
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Insert or overwrite `name`. Last write wins, keeping its original
    /// position (mirrors `ExpressionMap::set`).
    pub fn set(&mut self, name: impl Into<String>, value: Expression) {
        let name = name.into();
        if let Some(&i) = self.index.get(&name) {
            self.values[i] = value;
        } else {
            let i = self.names.len();
            self.index.insert(name.clone(), i);
            self.names.push(name);
            self.values.push(value);
        }
    }

    /// Look up `name` in the table itself, without consulting the unknown-key
    /// callback. Use [`ReferenceTable::get_or_synthesize`] when the callback
    /// should be given a chance.
    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.index.get(name).map(|&i| &self.values[i])
    }

    /// Look up `name`, falling back to the unknown-key callback (if any) to
    /// synthesize a value on demand.
    pub fn get_or_synthesize(&self, name: &str) -> Option<Expression> {
        if let Some(v) = self.get(name) {
            return Some(v.clone());
        }
        self.unknown_key_callback.as_ref().and_then(|cb| cb(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Expression> {
        let i = self.index.remove(name)?;
        self.names.remove(i);
        let removed = self.values.remove(i);
        // re-index everything after the removed slot
        for (n, idx) in self.index.iter_mut() {
            if *idx > i {
                *idx -= 1;
            }
            let _ = n;
        }
        Some(removed)
    }

    /// Returns `count()` when `name` is absent, matching spec §4.5.
    pub fn index_of(&self, name: &str) -> usize {
        self.index.get(name).copied().unwrap_or_else(|| self.count())
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    pub fn value_at(&self, index: usize) -> Option<&Expression> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.names.iter().map(|s| s.as_str()).zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_of_absent_returns_count() {
        let t = ReferenceTable::new();
        assert_eq!(t.index_of("missing"), t.count());
    }

    #[test]
    fn remove_reindexes() {
        let mut t = ReferenceTable::new();
        t.set("a", Expression::value("1"));
        t.set("b", Expression::value("2"));
        t.set("c", Expression::value("3"));
        t.remove("a");
        assert_eq!(t.index_of("b"), 0);
        assert_eq!(t.index_of("c"), 1);
        assert_eq!(t.count(), 2);
    }

    #[test]
    fn unknown_key_callback_is_last_resort() {
        let t = ReferenceTable::with_unknown_key_callback(Box::new(|name| {
            Some(Expression::value(format!("synth:{name}")))
        }));
        assert_eq!(
            t.get_or_synthesize("anything").and_then(|e| e.as_value().map(str::to_owned)),
            Some("synth:anything".to_string())
        );
    }
}
