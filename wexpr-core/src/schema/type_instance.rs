// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! A use-site of a [`Type`] — usually a map property or array element rule
//! (spec §3 "TypeInstance").
//!
//! Grounded on `libWexprSchema/TypeInstance.{h,c}`. The original snippet
//! retained in this pack predates `optional`, but spec.md's data model
//! requires it (a missing/null value short-circuits validation), so it's
//! added here in the same shape as `description`/`type`.

use wexpr_types::Expression;

use super::Schema;
use super::error::SchemaError;
use super::twine::Twine;
use super::type_ref::TypeRef;

#[derive(Debug, Clone)]
pub struct TypeInstance {
    pub description: Option<String>,
    pub type_ref: TypeRef,
    pub optional: bool,
}

impl TypeInstance {
    /// Build a type instance from its defining map expression: `{description,
    /// type, optional}`.
    pub fn create_from_expression(expr: &Expression, object_path: &Twine) -> Result<TypeInstance, SchemaError> {
        let description = expr.map_get("description").and_then(Expression::as_value).map(str::to_owned);

        let type_name = expr
            .map_get("type")
            .and_then(Expression::as_value)
            .ok_or_else(|| SchemaError::new(object_path, "type instance is missing its 'type' property"))?;

        let optional = expr.map_get("optional").and_then(Expression::as_value) == Some("true");

        Ok(TypeInstance { description, type_ref: TypeRef::new(type_name), optional })
    }

    /// Validate `expr` (absent for a missing map property) against this
    /// instance's referenced type. `optional` short-circuits when the slot
    /// is missing entirely or explicitly `Null` (spec §4.10 step 2 of
    /// `mapProperties` handling, and the `TypeInstance` data model in §3).
    pub fn validate(&self, schema: &Schema, object_path: &Twine, expr: Option<&Expression>) -> Result<(), SchemaError> {
        match expr {
            None if self.optional => Ok(()),
            None => Err(SchemaError::new(object_path, "required property is missing")),
            Some(Expression::Null) if self.optional => Ok(()),
            Some(e) => {
                let ty = self
                    .type_ref
                    .resolve(schema)
                    .ok_or_else(|| SchemaError::new(object_path, format!("failed to resolve type: {}", self.type_ref.name())))?;
                ty.validate(schema, object_path, e)
            }
        }
    }
}
