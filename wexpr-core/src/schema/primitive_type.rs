// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Primitive type bitmask for schema types (spec §4.10).
//!
//! Grounded on `libWexprSchema/PrimitiveType.{h,c}`: a flag set over the
//! five expression shapes. A hand-rolled `u8` newtype is used in place of
//! the `bitflags` crate — five fixed, never-extended bits don't carry their
//! weight (see DESIGN.md's dependency-delta note).

use std::fmt;

use wexpr_types::ExpressionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveTypeMask(u8);

impl PrimitiveTypeMask {
    pub const UNKNOWN: PrimitiveTypeMask = PrimitiveTypeMask(0x00);
    pub const NULL: PrimitiveTypeMask = PrimitiveTypeMask(0x01);
    pub const VALUE: PrimitiveTypeMask = PrimitiveTypeMask(0x02);
    pub const ARRAY: PrimitiveTypeMask = PrimitiveTypeMask(0x04);
    pub const MAP: PrimitiveTypeMask = PrimitiveTypeMask(0x08);
    pub const BINARY_DATA: PrimitiveTypeMask = PrimitiveTypeMask(0x10);

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// Parse the `primitiveType` string of a schema type definition.
    /// Unrecognized strings (and `None`) map to [`PrimitiveTypeMask::UNKNOWN`],
    /// signaling the mask must be derived from the type's parent types.
    pub fn from_str_or_unknown(s: &str) -> PrimitiveTypeMask {
        match s {
            "nullType" => PrimitiveTypeMask::NULL,
            "value" => PrimitiveTypeMask::VALUE,
            "array" => PrimitiveTypeMask::ARRAY,
            "map" => PrimitiveTypeMask::MAP,
            "binaryData" => PrimitiveTypeMask::BINARY_DATA,
            _ => PrimitiveTypeMask::UNKNOWN,
        }
    }

    pub fn matches(self, shape: ExpressionType) -> bool {
        let bit = match shape {
            ExpressionType::Null => PrimitiveTypeMask::NULL,
            ExpressionType::Value => PrimitiveTypeMask::VALUE,
            ExpressionType::Array => PrimitiveTypeMask::ARRAY,
            ExpressionType::Map => PrimitiveTypeMask::MAP,
            ExpressionType::BinaryData => PrimitiveTypeMask::BINARY_DATA,
        };
        self.0 & bit.0 != 0
    }
}

impl std::ops::BitOr for PrimitiveTypeMask {
    type Output = PrimitiveTypeMask;
    fn bitor(self, rhs: PrimitiveTypeMask) -> PrimitiveTypeMask {
        PrimitiveTypeMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PrimitiveTypeMask {
    fn bitor_assign(&mut self, rhs: PrimitiveTypeMask) {
        self.0 |= rhs.0;
    }
}

/// Renders as `value|array`-style pipe-joined names, matching
/// `wexprSchema_PrimitiveType_toTwine` (used in validation failure
/// messages).
impl fmt::Display for PrimitiveTypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("Unknown");
        }
        let names: [(PrimitiveTypeMask, &str); 5] = [
            (PrimitiveTypeMask::NULL, "null"),
            (PrimitiveTypeMask::VALUE, "value"),
            (PrimitiveTypeMask::ARRAY, "array"),
            (PrimitiveTypeMask::MAP, "map"),
            (PrimitiveTypeMask::BINARY_DATA, "binaryData"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.0 & bit.0 != 0 {
                if !first {
                    f.write_str("|")?;
                }
                first = false;
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_string_is_unknown_mask() {
        assert!(PrimitiveTypeMask::from_str_or_unknown("bogus").is_unknown());
    }

    #[test]
    fn matches_the_right_shape_only() {
        assert!(PrimitiveTypeMask::VALUE.matches(ExpressionType::Value));
        assert!(!PrimitiveTypeMask::VALUE.matches(ExpressionType::Array));
    }

    #[test]
    fn display_joins_with_pipe() {
        let mask = PrimitiveTypeMask::VALUE | PrimitiveTypeMask::ARRAY;
        assert_eq!(mask.to_string(), "value|array");
    }
}
