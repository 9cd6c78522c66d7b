// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Lazy-concatenation rope used for schema validation object paths and
//! diagnostics (spec §4.9).
//!
//! Grounded on `libWexprSchema/Twine.{h,c}`: a twine is the concatenation of
//! two children, each either empty, a string, or another twine, resolved to
//! an owned string only when something actually needs the text (an error
//! message, or [`Twine::ends_with`]). `Append` wraps its children in `Rc`
//! rather than copying them, so building up a path one segment at a time
//! through a validation recursion allocates no more than the leaves
//! themselves do.

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Twine {
    Empty,
    Leaf(Rc<str>),
    Append(Rc<Twine>, Rc<Twine>),
}

impl Twine {
    pub fn empty() -> Self {
        Twine::Empty
    }

    pub fn from_str(s: &str) -> Self {
        Twine::Leaf(Rc::from(s))
    }

    /// Concatenate `self` and `rhs` without resolving either side.
    pub fn append(&self, rhs: &Twine) -> Twine {
        Twine::Append(Rc::new(self.clone()), Rc::new(rhs.clone()))
    }

    pub fn append_str(&self, rhs: &str) -> Twine {
        self.append(&Twine::from_str(rhs))
    }

    /// Append `segment` as a `/`-separated path component, matching
    /// `OBJECTPATH_APPEND` in the original `Type.c`: no extra slash is
    /// inserted if `self` already ends with one (true at the root `/`).
    pub fn append_path_segment(&self, segment: &str) -> Twine {
        if self.ends_with("/") {
            self.append_str(segment)
        } else {
            self.append_str("/").append_str(segment)
        }
    }

    /// Append an array index suffix like `[3]`, with no separator — array
    /// elements are addressed as `parent[index]`, not `parent/[index]`
    /// (spec §4.10 "object path").
    pub fn append_index(&self, index: usize) -> Twine {
        self.append_str(&format!("[{index}]"))
    }

    /// Materialize the full path as an owned string.
    pub fn resolve(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        match self {
            Twine::Empty => {}
            Twine::Leaf(s) => out.push_str(s),
            Twine::Append(lhs, rhs) => {
                lhs.write_into(out);
                rhs.write_into(out);
            }
        }
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.resolve().ends_with(suffix)
    }
}

impl fmt::Display for Twine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolve())
    }
}

impl From<&str> for Twine {
    fn from(s: &str) -> Self {
        Twine::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_append_has_no_double_slash() {
        let root = Twine::from_str("/");
        let child = root.append_path_segment("first");
        assert_eq!(child.resolve(), "/first");
    }

    #[test]
    fn nested_append_inserts_slash() {
        let root = Twine::from_str("/").append_path_segment("first");
        let child = root.append_path_segment("second");
        assert_eq!(child.resolve(), "/first/second");
    }

    #[test]
    fn array_index_has_no_separator() {
        let root = Twine::from_str("/").append_path_segment("items");
        assert_eq!(root.append_index(2).resolve(), "/items[2]");
    }

    #[test]
    fn ends_with_checks_resolved_text() {
        let t = Twine::from_str("/").append_str("a");
        assert!(t.ends_with("a"));
        assert!(!t.ends_with("/"));
    }
}
