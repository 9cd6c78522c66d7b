// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Wexpr text and binary codecs, plus schema validation.
//!
//! This crate turns bytes into a [`wexpr_types::Expression`] and back, in
//! two independent codecs (text and binary), and optionally checks a tree
//! against a schema document written in Wexpr itself.
//!
//! # Layout
//!
//! - [`base64`] / [`uvlq64`]: the two small encodings the codecs build on.
//! - [`text`]: the grammar in spec §4.6/§4.7.
//! - [`binary`]: the TLV chunk format and file envelope in spec §4.8.
//! - [`schema`]: the optional validator in spec §4.10.

pub mod base64;
pub mod binary;
pub mod schema;
pub mod text;
pub mod uvlq64;

pub use text::{parse, write, ParseFlags, WriteFlags};

use wexpr_types::Expression;

/// `createStringRepresentation` from the public surface (spec §6): render
/// `expr` as Wexpr text. Lives here rather than on `Expression` itself
/// because `wexpr-types` must not depend on the codecs.
pub fn to_string(expr: &Expression, flags: WriteFlags) -> String {
    write(expr, flags)
}

/// `createBinaryRepresentation` from the public surface (spec §6): render
/// `expr` as a full binary file (envelope + one expression chunk).
pub fn to_binary(expr: &Expression) -> Vec<u8> {
    binary::write_file(expr)
}
