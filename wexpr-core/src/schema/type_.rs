// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! A single named validation rule set within a schema (spec §3/§4.10 "Type").
//!
//! Grounded on `libWexprSchema/Type.c`: primitive-mask derivation, the
//! disjunctive parent-type check, and the per-shape validation branches
//! (`s_wexprSchema_Type_validate{Value,Array,Map}`) all follow that file's
//! structure, adapted from its hashmap/linked-list plumbing to plain `Vec`/
//! `HashMap`.

use std::collections::HashMap;

use regex::Regex;
use wexpr_types::Expression;

use super::Schema;
use super::error::SchemaError;
use super::primitive_type::PrimitiveTypeMask;
use super::twine::Twine;
use super::type_instance::TypeInstance;
use super::type_ref::TypeRef;

#[derive(Debug)]
pub struct Type {
    name: String,
    description: Option<String>,
    declared_primitive_type: PrimitiveTypeMask,
    parent_refs: Vec<TypeRef>,

    value_regex: Option<Regex>,
    value_regex_source: Option<String>,

    array_all_elements: Option<TypeInstance>,

    map_properties: HashMap<String, TypeInstance>,
    map_all_properties: Option<TypeInstance>,
    map_key_type: Option<TypeInstance>,
    map_allow_additional_properties: bool,
}

impl Type {
    pub fn create_from_expression(name: &str, expr: &Expression, object_path: &Twine) -> Result<Type, SchemaError> {
        let description = expr.map_get("description").and_then(Expression::as_value).map(str::to_owned);

        let declared_primitive_type = expr
            .map_get("primitiveType")
            .and_then(Expression::as_value)
            .map(PrimitiveTypeMask::from_str_or_unknown)
            .unwrap_or(PrimitiveTypeMask::UNKNOWN);

        let mut parent_refs = Vec::new();
        if let Some(types_expr) = expr.map_get("type") {
            match types_expr {
                Expression::Value(name) => parent_refs.push(TypeRef::new(name.clone())),
                Expression::Array(items) => {
                    for item in items {
                        if let Some(name) = item.as_value() {
                            parent_refs.push(TypeRef::new(name));
                        }
                    }
                }
                _ => {}
            }
        }

        let (value_regex, value_regex_source) = match expr.map_get("valueRegex").and_then(Expression::as_value) {
            Some(source) => {
                let anchored = format!("^(?:{source})$");
                let compiled = Regex::new(&anchored)
                    .map_err(|e| SchemaError::new(object_path, format!("type '{name}' has an invalid valueRegex '{source}': {e}")))?;
                (Some(compiled), Some(source.to_owned()))
            }
            None => (None, None),
        };

        let array_all_elements = expr
            .map_get("arrayAllElements")
            .map(|e| TypeInstance::create_from_expression(e, &object_path.append_path_segment("arrayAllElements")))
            .transpose()?;

        let mut map_properties = HashMap::new();
        if let Some(props) = expr.map_get("mapProperties") {
            for i in 0..props.map_count() {
                let key = props.map_key_at(i).unwrap();
                let value = props.map_value_at(i).unwrap();
                let instance = TypeInstance::create_from_expression(value, &object_path.append_path_segment(key))?;
                map_properties.insert(key.to_owned(), instance);
            }
        }

        let map_all_properties = expr
            .map_get("mapAllProperties")
            .map(|e| TypeInstance::create_from_expression(e, &object_path.append_path_segment("mapAllProperties")))
            .transpose()?;

        let map_key_type = expr
            .map_get("mapKeyType")
            .map(|e| TypeInstance::create_from_expression(e, &object_path.append_path_segment("mapKeyType")))
            .transpose()?;

        let map_allow_additional_properties =
            expr.map_get("mapAllowAdditionalProperties").and_then(Expression::as_value) == Some("true");

        Ok(Type {
            name: name.to_owned(),
            description,
            declared_primitive_type,
            parent_refs,
            value_regex,
            value_regex_source,
            array_all_elements,
            map_properties,
            map_all_properties,
            map_key_type,
            map_allow_additional_properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(super) fn parent_refs(&self) -> &[TypeRef] {
        &self.parent_refs
    }

    pub(super) fn nested_type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        self.array_all_elements
            .iter()
            .chain(self.map_all_properties.iter())
            .chain(self.map_key_type.iter())
            .chain(self.map_properties.values())
            .map(|ti| &ti.type_ref)
    }

    /// This type's effective primitive mask: its own `declared_primitive_type`
    /// if set, else the bitwise OR of every parent type's effective mask
    /// (`wexprSchema_Type_primitiveTypes`). Schemas with a cyclic `type`
    /// chain recurse forever here, same as the original C — schema authoring
    /// is expected not to do that.
    pub fn effective_primitive_mask(&self, schema: &Schema) -> PrimitiveTypeMask {
        if !self.declared_primitive_type.is_unknown() {
            return self.declared_primitive_type;
        }
        let mut mask = PrimitiveTypeMask::UNKNOWN;
        for parent in &self.parent_refs {
            if let Some(parent_ty) = parent.resolve(schema) {
                mask |= parent_ty.effective_primitive_mask(schema);
            }
        }
        mask
    }

    pub fn validate(&self, schema: &Schema, object_path: &Twine, expr: &Expression) -> Result<(), SchemaError> {
        let mask = self.effective_primitive_mask(schema);
        if !mask.matches(expr.expression_type()) {
            return Err(SchemaError::new(
                object_path,
                format!("expression didn't match primitive type: was {:?} but expected {mask}", expr.expression_type()),
            ));
        }

        if !self.parent_refs.is_empty() {
            let mut matched = false;
            let mut accumulated: Option<SchemaError> = None;

            for parent_ref in &self.parent_refs {
                let parent_ty = match parent_ref.resolve(schema) {
                    Some(t) => t,
                    None => {
                        return Err(SchemaError::new(object_path, format!("failed to resolve type: {}", parent_ref.name())));
                    }
                };

                match parent_ty.validate(schema, object_path, expr) {
                    Ok(()) => {
                        matched = true;
                        break;
                    }
                    Err(e) => match &mut accumulated {
                        None => accumulated = Some(e),
                        Some(acc) => acc.append(e),
                    },
                }
            }

            if !matched {
                let mut err = SchemaError::new(object_path, "does not match any possible types; reasons for each follow");
                if let Some(chain) = accumulated {
                    err.next = Some(Box::new(chain));
                }
                return Err(err);
            }
        }

        if mask.matches(wexpr_types::ExpressionType::Array) {
            self.validate_array(schema, object_path, expr)?;
        }
        if mask.matches(wexpr_types::ExpressionType::Map) {
            self.validate_map(schema, object_path, expr)?;
        }
        if mask.matches(wexpr_types::ExpressionType::Value) {
            self.validate_value(object_path, expr)?;
        }

        Ok(())
    }

    fn validate_value(&self, object_path: &Twine, expr: &Expression) -> Result<(), SchemaError> {
        if let (Some(regex), Some(source)) = (&self.value_regex, &self.value_regex_source) {
            let value = expr.as_value().unwrap_or("");
            if !regex.is_match(value) {
                return Err(SchemaError::new(
                    object_path,
                    format!("value '{value}' does not meet required regex '{source}'"),
                ));
            }
        }
        Ok(())
    }

    fn validate_array(&self, schema: &Schema, object_path: &Twine, expr: &Expression) -> Result<(), SchemaError> {
        let Some(all_elements) = &self.array_all_elements else { return Ok(()) };

        let mut first_error: Option<SchemaError> = None;
        for (i, child) in expr.array_iter().enumerate() {
            let child_path = object_path.append_index(i);
            if let Err(e) = all_elements.validate(schema, &child_path, Some(child)) {
                match &mut first_error {
                    None => first_error = Some(e),
                    Some(acc) => acc.append(e),
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn validate_map(&self, schema: &Schema, object_path: &Twine, expr: &Expression) -> Result<(), SchemaError> {
        let mut first_error: Option<SchemaError> = None;
        let mut note = |e: SchemaError, first_error: &mut Option<SchemaError>| match first_error {
            None => *first_error = Some(e),
            Some(acc) => acc.append(e),
        };

        for (key, instance) in &self.map_properties {
            let prop_path = object_path.append_path_segment(key);
            let value = expr.map_get(key);
            if let Err(e) = instance.validate(schema, &prop_path, value) {
                note(SchemaError::new(&prop_path, format!("error validating map property: {key}")).chained_with(e), &mut first_error);
            }
        }

        if self.map_all_properties.is_some() || self.map_key_type.is_some() {
            for i in 0..expr.map_count() {
                let key = expr.map_key_at(i).unwrap();
                let value = expr.map_value_at(i).unwrap();
                let key_path = object_path.append_path_segment(key);

                if let Some(key_type) = &self.map_key_type {
                    let key_expr = Expression::value(key);
                    if let Err(e) = key_type.validate(schema, &key_path, Some(&key_expr)) {
                        note(e, &mut first_error);
                    }
                }

                if let Some(all_props) = &self.map_all_properties {
                    if let Err(e) = all_props.validate(schema, &key_path, Some(value)) {
                        note(e, &mut first_error);
                    }
                }
            }
        }

        if self.map_all_properties.is_none() && !self.map_allow_additional_properties {
            for i in 0..expr.map_count() {
                let key = expr.map_key_at(i).unwrap();
                if !self.map_properties.contains_key(key) {
                    note(
                        SchemaError::new(object_path, format!("map has additional property which wasn't allowed: {key}")),
                        &mut first_error,
                    );
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl SchemaError {
    fn chained_with(mut self, cause: SchemaError) -> SchemaError {
        self.next = Some(Box::new(cause));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema_from(text: &str) -> Schema {
        Schema::from_text(text, &Default::default()).unwrap()
    }

    #[test]
    fn value_regex_full_match_required() {
        let schema = schema_from(
            r#"@(
                $types @(
                    identifier @(primitiveType value valueRegex "[A-Za-z_][A-Za-z0-9_]*")
                )
                rootType identifier
            )"#,
        );
        let ty = schema.type_with_name("identifier").unwrap();
        assert!(ty.validate(&schema, &Twine::from_str("/"), &Expression::value("hello_1")).is_ok());
        assert!(ty.validate(&schema, &Twine::from_str("/"), &Expression::value("1hello")).is_err());
    }

    #[test]
    fn primitive_mask_mismatch_is_reported() {
        let schema = schema_from(
            r#"@(
                $types @(onlyArrays @(primitiveType array))
                rootType onlyArrays
            )"#,
        );
        let ty = schema.type_with_name("onlyArrays").unwrap();
        let err = ty.validate(&schema, &Twine::from_str("/"), &Expression::value("x")).unwrap_err();
        assert!(err.message.contains("primitive type"));
    }

    #[test]
    fn map_rejects_additional_properties_by_default() {
        let schema = schema_from(
            r#"@(
                $types @(
                    point @(
                        primitiveType map
                        mapProperties @(x @(type identifier) y @(type identifier))
                    )
                    identifier @(primitiveType value valueRegex "[0-9]+")
                )
                rootType point
            )"#,
        );
        let ty = schema.type_with_name("point").unwrap();
        let good = crate::text::parse(b"@(x 1 y 2)", Default::default(), None).unwrap();
        assert!(ty.validate(&schema, &Twine::from_str("/"), &good).is_ok());
        let bad = crate::text::parse(b"@(x 1 y 2 z 3)", Default::default(), None).unwrap();
        assert!(ty.validate(&schema, &Twine::from_str("/"), &bad).is_err());
    }
}
