// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! Schema loading and validation (spec §3/§4.10, "Schema validator" C10).
//!
//! Grounded on `libWexprSchema/Public/libWexprSchema/Schema.h` for the data
//! model (`id`, `title`, `description`, `$types`, `rootType`,
//! `referencedSchemas`) and on `libWexprSchema/Schema.c` for the
//! `pathForSchemaID` callback shape — that file's own
//! `wexprSchema_Schema_createFromSchemaID`/`validateExpression` bodies are an
//! unfinished draft in the retained snapshot (`s_loadFromSchemaID` always
//! fails, `validateExpression` always returns false), so the load/resolve/
//! validate sequence below follows spec.md §4.10's description instead.

mod error;
mod primitive_type;
mod twine;
mod type_;
mod type_instance;
mod type_ref;

pub use error::{SchemaError, SchemaErrorKind};
pub use primitive_type::PrimitiveTypeMask;
pub use twine::Twine;
pub use type_::Type;
pub use type_instance::TypeInstance;
pub use type_ref::TypeRef;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use wexpr_types::Expression;

const RECOGNIZED_SCHEMA_VERSION: &str = "https://wexpr.hackerguild.com/versions/1.schema.wexpr";

/// Caller-supplied hooks for resolving a `$id`/`module::` name to schema
/// text. Mirrors `WexprSchemaSchema_Callbacks` minus its `alloc`/`dealloc`
/// pair, which exists in the original only because C has no global
/// allocator to fall back on.
pub struct SchemaLoadCallbacks {
    path_for_schema_id: Box<dyn Fn(&str) -> Option<PathBuf>>,
}

impl SchemaLoadCallbacks {
    pub fn new(path_for_schema_id: impl Fn(&str) -> Option<PathBuf> + 'static) -> Self {
        Self { path_for_schema_id: Box::new(path_for_schema_id) }
    }
}

/// Matches `s_defaultPathForSchemaID`: no schema id resolves to a path
/// unless the caller wires one up. HTTP fetch of remote schemas is out of
/// scope (spec.md §5 "Suspension points").
impl Default for SchemaLoadCallbacks {
    fn default() -> Self {
        Self::new(|_id: &str| None)
    }
}

/// A loaded schema document: a set of named types plus the root type used to
/// validate a whole document (spec §3 "Schema").
#[derive(Debug, Default)]
pub struct Schema {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    named_types: HashMap<String, Type>,
    root_type: Option<TypeRef>,
    referenced_schemas: HashMap<String, Schema>,
}

impl Schema {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Resolve `name` against this schema's own `$types`, or, for a
    /// `module::name` reference, against an already-loaded referenced
    /// schema keyed by `module`.
    pub fn type_with_name(&self, name: &str) -> Option<&Type> {
        match name.split_once("::") {
            Some((module, rest)) => self.referenced_schemas.get(module).and_then(|s| s.type_with_name(rest)),
            None => self.named_types.get(name),
        }
    }

    /// Load a schema document identified by `schema_id`, resolving it to
    /// schema text via `callbacks.path_for_schema_id`.
    pub fn create_from_schema_id(schema_id: &str, callbacks: &SchemaLoadCallbacks) -> Result<Schema, SchemaError> {
        let path = (callbacks.path_for_schema_id)(schema_id)
            .ok_or_else(|| SchemaError::at_path("/", format!("no path registered for schema id: {schema_id}")))?;
        let text = fs::read_to_string(&path)
            .map_err(|e| SchemaError::at_path("/", format!("failed to read schema '{schema_id}' at {}: {e}", path.display())))?;
        Self::from_text(&text, callbacks)
    }

    /// Parse and load a schema document directly from its Wexpr text.
    pub fn from_text(text: &str, callbacks: &SchemaLoadCallbacks) -> Result<Schema, SchemaError> {
        let root = crate::text::parse(text.as_bytes(), Default::default(), None)
            .map_err(|e| SchemaError::at_path("/", format!("failed to parse schema document: {e}")))?;
        Self::create_from_expression(&root, callbacks)
    }

    /// Build a schema from an already-parsed document expression. First
    /// pass instantiates every `$types` entry; a second pass
    /// ([`resolve_all`](Self::resolve_all)) resolves every name they
    /// reference, loading any `module::`-qualified referenced schema along
    /// the way, and fails fast on an unresolvable name.
    pub fn create_from_expression(expr: &Expression, callbacks: &SchemaLoadCallbacks) -> Result<Schema, SchemaError> {
        let root_path = Twine::from_str("/");

        if let Some(version) = expr.map_get("$schema").and_then(Expression::as_value) {
            if version != RECOGNIZED_SCHEMA_VERSION {
                return Err(SchemaError::new(&root_path, format!("unrecognized $schema version: {version}")));
            }
        }

        let id = expr.map_get("$id").and_then(Expression::as_value).map(str::to_owned);
        let title = expr.map_get("title").and_then(Expression::as_value).map(str::to_owned);
        let description = expr.map_get("description").and_then(Expression::as_value).map(str::to_owned);

        let mut named_types = HashMap::new();
        if let Some(types_expr) = expr.map_get("$types") {
            let types_path = root_path.append_path_segment("$types");
            for i in 0..types_expr.map_count() {
                let name = types_expr.map_key_at(i).unwrap();
                let def = types_expr.map_value_at(i).unwrap();
                let ty = Type::create_from_expression(name, def, &types_path.append_path_segment(name))?;
                named_types.insert(name.to_owned(), ty);
            }
        }

        let root_type = expr.map_get("rootType").and_then(Expression::as_value).map(TypeRef::new);

        let mut schema = Schema { id, title, description, named_types, root_type, referenced_schemas: HashMap::new() };

        schema.load_referenced_schemas(callbacks)?;
        schema.resolve_all()?;

        Ok(schema)
    }

    /// Every `module::name` reference used anywhere in this schema's types
    /// names a referenced schema by its `module` prefix; load each distinct
    /// one once via `callbacks`, recursively.
    fn load_referenced_schemas(&mut self, callbacks: &SchemaLoadCallbacks) -> Result<(), SchemaError> {
        let mut modules = Vec::new();
        for ty in self.named_types.values() {
            for type_ref in ty.parent_refs().iter().chain(ty.nested_type_refs()) {
                if let Some((module, _)) = type_ref.name().split_once("::") {
                    if !modules.contains(&module.to_owned()) {
                        modules.push(module.to_owned());
                    }
                }
            }
        }

        for module in modules {
            if self.referenced_schemas.contains_key(&module) {
                continue;
            }
            let referenced = Schema::create_from_schema_id(&module, callbacks)?;
            self.referenced_schemas.insert(module, referenced);
        }

        Ok(())
    }

    /// Confirm every name this schema's types reference actually resolves,
    /// so a malformed schema fails at load time rather than on the first
    /// document that happens to exercise the broken type.
    fn resolve_all(&self) -> Result<(), SchemaError> {
        if let Some(root_ref) = &self.root_type {
            if root_ref.resolve(self).is_none() {
                return Err(SchemaError::at_path("/", format!("rootType does not resolve: {}", root_ref.name())));
            }
        }

        for ty in self.named_types.values() {
            for type_ref in ty.parent_refs().iter().chain(ty.nested_type_refs()) {
                if type_ref.resolve(self).is_none() {
                    return Err(SchemaError::at_path(
                        "/",
                        format!("type '{}' references unresolvable type: {}", ty.name(), type_ref.name()),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validate `expr` against this schema's `rootType`.
    pub fn validate_expression(&self, expr: &Expression) -> Result<(), SchemaError> {
        let root_ref = self.root_type.as_ref().ok_or_else(|| SchemaError::at_path("/", "schema has no rootType to validate against"))?;
        let root_ty = root_ref
            .resolve(self)
            .ok_or_else(|| SchemaError::at_path("/", format!("rootType does not resolve: {}", root_ref.name())))?;
        root_ty.validate(self, &Twine::from_str("/"), expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognized_schema_version() {
        let err = Schema::from_text(r#"@($schema "not-the-right-one" rootType foo $types @(foo @(primitiveType value)))"#, &Default::default())
            .unwrap_err();
        assert!(err.message.contains("$schema"));
    }

    #[test]
    fn unresolvable_parent_type_fails_at_load_time() {
        let err = Schema::from_text(r#"@($types @(a @(type "doesNotExist")) rootType a)"#, &Default::default()).unwrap_err();
        assert!(err.message.contains("doesNotExist"));
    }

    #[test]
    fn validates_root_type_end_to_end() {
        let schema = Schema::from_text(
            r#"@(
                $types @(number @(primitiveType value valueRegex "[0-9]+"))
                rootType number
            )"#,
            &Default::default(),
        )
        .unwrap();
        let good = crate::text::parse(b"42", Default::default(), None).unwrap();
        let bad = crate::text::parse(b"abc", Default::default(), None).unwrap();
        assert!(schema.validate_expression(&good).is_ok());
        assert!(schema.validate_expression(&bad).is_err());
    }

    #[test]
    fn missing_root_type_is_a_validation_error() {
        let schema = Schema::from_text(r#"@($types @(number @(primitiveType value)))"#, &Default::default()).unwrap();
        let expr = crate::text::parse(b"1", Default::default(), None).unwrap();
        assert!(schema.validate_expression(&expr).is_err());
    }
}
