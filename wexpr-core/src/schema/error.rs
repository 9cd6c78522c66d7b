// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Schema validation errors (spec §4.10/§7).
//!
//! Grounded on `libWexprSchema/Error.{h,c}`. Kept separate from
//! `wexpr_types::Error`: the original C library never reuses `WexprError`
//! for schema failures, and a chain of candidate-type failures doesn't fit
//! the codec's single-error shape.

use std::fmt;

use super::twine::Twine;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// An internal/unspecified validation or loading failure. The original
    /// library never distinguishes further than this; all detail lives in
    /// `message`.
    #[error("schema error")]
    Internal,
}

/// A schema validation or loading error, optionally chained to sibling
/// failures (e.g. "didn't match any of N possible types" chains the reason
/// each candidate type failed).
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub object_path: String,
    pub message: String,
    pub next: Option<Box<SchemaError>>,
}

impl SchemaError {
    pub fn new(object_path: &Twine, message: impl Into<String>) -> Self {
        Self {
            kind: SchemaErrorKind::Internal,
            object_path: object_path.resolve(),
            message: message.into(),
            next: None,
        }
    }

    pub fn at_path(object_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: SchemaErrorKind::Internal,
            object_path: object_path.into(),
            message: message.into(),
            next: None,
        }
    }

    /// Append `err` to the end of this error's chain, matching
    /// `wexprSchema_Error_appendError`'s recursive walk to the tail.
    pub fn append(&mut self, err: SchemaError) {
        match &mut self.next {
            Some(tail) => tail.append(err),
            None => self.next = Some(Box::new(err)),
        }
    }

    /// Iterate this error and every error chained after it.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaError> {
        std::iter::successors(Some(self), |e| e.next.as_deref())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.object_path, self.message)?;
        for next in self.next.iter() {
            write!(f, "  caused by: {next}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_walks_to_tail() {
        let mut e = SchemaError::at_path("/a", "first");
        e.append(SchemaError::at_path("/b", "second"));
        e.append(SchemaError::at_path("/c", "third"));
        let messages: Vec<&str> = e.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }
}
