//! Structural validation of JSON values against [`Schema`]s.
//!
//! Errors carry the path to the offending value so diagnostics read like
//! `items[2].name: expected string, got number`.

use super::schema::{AdditionalProperties, ArraySchema, Bound, NumberSchema, ObjectSchema, Schema, StringSchema};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// Named schemas, i.e. `components.schemas` of the interface document.
pub type SchemaMap = IndexMap<String, Schema>;

/// Maximum number of `$ref` hops taken without descending into the value.
const MAX_REF_CHAIN: usize = 64;

/// One step of the path to a failing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Property(String),
    Index(usize),
}

/// A value that does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    path: Vec<PathSegment>,
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// Prefix the error path with `segment`.
    #[must_use]
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Dotted rendering of the path (`a.b[0]`); empty for the root value.
    #[must_use]
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Property(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(idx) => {
                    out.push('[');
                    out.push_str(&idx.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path(), self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate `value` against `schema`, resolving references through `schemas`.
pub fn validate(value: &Value, schema: &Schema, schemas: &SchemaMap) -> Result<(), ValidationError> {
    Validator { schemas }.check(value, schema, 0)
}

/// Look up a `#/components/schemas/<name>` reference.
///
/// Any other pointer shape is treated as unresolvable.
#[must_use]
pub fn resolve_ref<'a>(reference: &str, schemas: &'a SchemaMap) -> Option<&'a Schema> {
    let mut segments = reference.split('/');
    if segments.next() != Some("#") || segments.next() != Some("components") {
        return None;
    }
    if segments.next() != Some("schemas") {
        return None;
    }
    let name = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    schemas.get(&name.replace("~1", "/").replace("~0", "~"))
}

/// JSON type name used in diagnostics.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Validator<'a> {
    schemas: &'a SchemaMap,
}

impl Validator<'_> {
    // `hops` counts consecutive reference/combinator steps on the same value.
    fn check(&self, value: &Value, schema: &Schema, hops: usize) -> Result<(), ValidationError> {
        match schema {
            Schema::Any => Ok(()),
            Schema::Reference(reference) => {
                if hops >= MAX_REF_CHAIN {
                    return Err(ValidationError::new(format!(
                        "reference chain through {reference} is too deep"
                    )));
                }
                let target = resolve_ref(reference, self.schemas).ok_or_else(|| {
                    ValidationError::new(format!("component not specified: {reference}"))
                })?;
                self.check(value, target, hops + 1)
            }
            Schema::String(s) => check_string(value, s),
            Schema::Number(n) => check_number(value, n),
            Schema::Boolean => expect_type(value, "boolean", Value::is_boolean),
            Schema::Null => expect_type(value, "null", Value::is_null),
            Schema::Object(obj) => self.check_object(value, obj),
            Schema::Array(arr) => self.check_array(value, arr),
            Schema::Union(alternatives) => {
                let mut failures = Vec::with_capacity(alternatives.len());
                for alt in alternatives {
                    match self.check(value, alt, hops + 1) {
                        Ok(()) => return Ok(()),
                        Err(e) => failures.push(e.to_string()),
                    }
                }
                Err(ValidationError::new(format!(
                    "value matched none of the allowed types ({})",
                    failures.join("; ")
                )))
            }
            Schema::AnyOf(branches) => {
                let mut failures = Vec::with_capacity(branches.len());
                for branch in branches {
                    match self.check(value, branch, hops + 1) {
                        Ok(()) => return Ok(()),
                        Err(e) => failures.push(e.to_string()),
                    }
                }
                Err(ValidationError::new(format!(
                    "value matched none of the anyOf branches ({})",
                    failures.join("; ")
                )))
            }
            Schema::AllOf(branches) => {
                for branch in branches {
                    self.check(value, branch, hops + 1)?;
                }
                Ok(())
            }
            Schema::OneOf(branches) => {
                let matched: Vec<usize> = branches
                    .iter()
                    .enumerate()
                    .filter(|(_, branch)| self.check(value, branch, hops + 1).is_ok())
                    .map(|(idx, _)| idx)
                    .collect();
                match matched.len() {
                    1 => Ok(()),
                    0 => Err(ValidationError::new("value matched none of the oneOf branches")),
                    n => Err(ValidationError::new(format!(
                        "value matched {n} oneOf branches {matched:?}, expected exactly one"
                    ))),
                }
            }
            Schema::Not(inner) => match self.check(value, inner, hops + 1) {
                Ok(()) => Err(ValidationError::new("value must not match the negated schema")),
                Err(_) => Ok(()),
            },
        }
    }

    fn check_object(&self, value: &Value, schema: &ObjectSchema) -> Result<(), ValidationError> {
        let Value::Object(map) = value else {
            return Err(mismatch("object", value));
        };

        for name in &schema.required {
            if !map.contains_key(name) {
                return Err(ValidationError::new(format!(
                    "missing required property '{name}'"
                )));
            }
        }

        for (name, prop_schema) in &schema.properties {
            if let Some(prop) = map.get(name) {
                self.check(prop, prop_schema, 0)
                    .map_err(|e| e.within(PathSegment::Property(name.clone())))?;
            }
        }

        self.check_additional(map, schema)
    }

    fn check_additional(
        &self,
        map: &Map<String, Value>,
        schema: &ObjectSchema,
    ) -> Result<(), ValidationError> {
        let extras = map
            .iter()
            .filter(|(name, _)| !schema.properties.contains_key(name.as_str()));
        match &schema.additional {
            AdditionalProperties::Allowed => Ok(()),
            AdditionalProperties::Forbidden => match extras.map(|(name, _)| name).next() {
                Some(name) => Err(ValidationError::new(format!("unexpected property '{name}'"))),
                None => Ok(()),
            },
            AdditionalProperties::Schema(extra_schema) => {
                for (name, prop) in extras {
                    self.check(prop, extra_schema, 0)
                        .map_err(|e| e.within(PathSegment::Property(name.clone())))?;
                }
                Ok(())
            }
        }
    }

    fn check_array(&self, value: &Value, schema: &ArraySchema) -> Result<(), ValidationError> {
        let Value::Array(items) = value else {
            return Err(mismatch("array", value));
        };
        let len = items.len() as u64;
        if let Some(min) = schema.min_items {
            if len < min {
                return Err(ValidationError::new(format!(
                    "expected at least {min} items, got {len}"
                )));
            }
        }
        if let Some(max) = schema.max_items {
            if len > max {
                return Err(ValidationError::new(format!(
                    "expected at most {max} items, got {len}"
                )));
            }
        }

        if items.is_empty() {
            return Ok(());
        }
        let item_schema = schema
            .items
            .as_deref()
            .ok_or_else(|| ValidationError::new("array items are not specified"))?;

        for (idx, item) in items.iter().enumerate() {
            self.check(item, item_schema, 0)
                .map_err(|e| e.within(PathSegment::Index(idx)))?;
        }

        if schema.unique_items {
            for (i, a) in items.iter().enumerate() {
                if items[i + 1..].contains(a) {
                    return Err(ValidationError::new(format!(
                        "array items must be unique, {a} appears more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn mismatch(expected: &str, value: &Value) -> ValidationError {
    ValidationError::new(format!("expected {expected}, got {}", type_name(value)))
}

fn expect_type(
    value: &Value,
    expected: &str,
    check: impl Fn(&Value) -> bool,
) -> Result<(), ValidationError> {
    if check(value) {
        Ok(())
    } else {
        Err(mismatch(expected, value))
    }
}

fn check_enum(value: &Value, allowed: Option<&Vec<Value>>) -> Result<(), ValidationError> {
    match allowed {
        Some(allowed) if !allowed.contains(value) => {
            let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
            Err(ValidationError::new(format!(
                "value {value} is not one of [{}]",
                rendered.join(", ")
            )))
        }
        _ => Ok(()),
    }
}

fn check_string(value: &Value, schema: &StringSchema) -> Result<(), ValidationError> {
    let Value::String(s) = value else {
        return Err(mismatch("string", value));
    };
    if let Some(format) = &schema.format {
        if !format.matches(s) {
            return Err(ValidationError::new(format!(
                "expected {format} string, got \"{s}\""
            )));
        }
    }
    let len = s.chars().count() as u64;
    if let Some(min) = schema.min_length {
        if len < min {
            return Err(ValidationError::new(format!(
                "string shorter than {min} characters"
            )));
        }
    }
    if let Some(max) = schema.max_length {
        if len > max {
            return Err(ValidationError::new(format!(
                "string longer than {max} characters"
            )));
        }
    }
    if let Some(pattern) = &schema.pattern {
        if !pattern.is_match(s) {
            return Err(ValidationError::new(format!(
                "string does not match pattern {}",
                pattern.as_str()
            )));
        }
    }
    check_enum(value, schema.enumeration.as_ref())
}

fn check_number(value: &Value, schema: &NumberSchema) -> Result<(), ValidationError> {
    let Value::Number(n) = value else {
        return Err(mismatch(if schema.integer { "integer" } else { "number" }, value));
    };
    let Some(x) = n.as_f64() else {
        return Err(ValidationError::new(format!("number {n} is out of range")));
    };
    if schema.integer && !(n.is_i64() || n.is_u64() || x.fract() == 0.0) {
        return Err(ValidationError::new(format!("expected integer, got {n}")));
    }
    if let Some(Bound { value: min, exclusive }) = schema.minimum {
        if x < min || (exclusive && x == min) {
            let op = if exclusive { ">" } else { ">=" };
            return Err(ValidationError::new(format!("{n} must be {op} {min}")));
        }
    }
    if let Some(Bound { value: max, exclusive }) = schema.maximum {
        if x > max || (exclusive && x == max) {
            let op = if exclusive { "<" } else { "<=" };
            return Err(ValidationError::new(format!("{n} must be {op} {max}")));
        }
    }
    check_enum(value, schema.enumeration.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(v: Value) -> Schema {
        Schema::from_value(&v).unwrap()
    }

    #[test]
    fn test_nested_path_in_error() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "name": { "type": "string" } }
                    }
                }
            }
        }));
        let value = json!({ "items": [{ "name": "a" }, { "name": "b" }, { "name": 3 }] });
        let err = validate(&value, &s, &SchemaMap::new()).unwrap_err();
        assert_eq!(err.path(), "items[2].name");
        assert_eq!(err.to_string(), "items[2].name: expected string, got number");
    }

    #[test]
    fn test_missing_required_property() {
        let s = schema(json!({ "type": "object", "required": ["id"] }));
        let err = validate(&json!({}), &s, &SchemaMap::new()).unwrap_err();
        assert!(err.message().contains("'id'"));
    }

    #[test]
    fn test_closed_object() {
        let s = schema(json!({
            "type": "object",
            "properties": { "a": { "type": "string" } },
            "additionalProperties": false
        }));
        assert!(validate(&json!({ "a": "x" }), &s, &SchemaMap::new()).is_ok());
        let err = validate(&json!({ "a": "x", "b": 1 }), &s, &SchemaMap::new()).unwrap_err();
        assert!(err.message().contains("'b'"));
    }

    #[test]
    fn test_array_without_items_fails_when_non_empty() {
        let s = schema(json!({ "type": "array" }));
        assert!(validate(&json!([]), &s, &SchemaMap::new()).is_ok());
        let err = validate(&json!([1]), &s, &SchemaMap::new()).unwrap_err();
        assert_eq!(err.message(), "array items are not specified");
    }

    #[test]
    fn test_integer_and_bounds() {
        let s = schema(json!({ "type": "integer", "minimum": 1, "exclusiveMaximum": 10 }));
        let map = SchemaMap::new();
        assert!(validate(&json!(1), &s, &map).is_ok());
        assert!(validate(&json!(9), &s, &map).is_ok());
        assert!(validate(&json!(10), &s, &map).is_err());
        assert!(validate(&json!(0), &s, &map).is_err());
        assert!(validate(&json!(2.5), &s, &map).is_err());
        assert!(validate(&json!("2"), &s, &map).is_err());
    }

    #[test]
    fn test_string_constraints() {
        let s = schema(json!({
            "type": "string", "minLength": 2, "maxLength": 4, "pattern": "^[a-z]+$"
        }));
        let map = SchemaMap::new();
        assert!(validate(&json!("abc"), &s, &map).is_ok());
        assert!(validate(&json!("a"), &s, &map).is_err());
        assert!(validate(&json!("abcde"), &s, &map).is_err());
        assert!(validate(&json!("ab1"), &s, &map).is_err());
    }

    #[test]
    fn test_enum() {
        let s = schema(json!({ "type": "string", "enum": ["red", "green"] }));
        let map = SchemaMap::new();
        assert!(validate(&json!("red"), &s, &map).is_ok());
        let err = validate(&json!("blue"), &s, &map).unwrap_err();
        assert!(err.message().contains("\"blue\""));
    }

    #[test]
    fn test_unique_items() {
        let s = schema(json!({ "type": "array", "items": {}, "uniqueItems": true }));
        let map = SchemaMap::new();
        assert!(validate(&json!([1, 2, 3]), &s, &map).is_ok());
        assert!(validate(&json!([1, 2, 1]), &s, &map).is_err());
    }

    #[test]
    fn test_unresolved_reference() {
        let s = schema(json!({ "$ref": "#/components/schemas/Missing" }));
        let err = validate(&json!({}), &s, &SchemaMap::new()).unwrap_err();
        assert!(err.message().starts_with("component not specified"));
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut map = SchemaMap::new();
        map.insert("Loop".to_string(), schema(json!({ "$ref": "#/components/schemas/Loop" })));
        let s = schema(json!({ "$ref": "#/components/schemas/Loop" }));
        let err = validate(&json!(1), &s, &map).unwrap_err();
        assert!(err.message().contains("too deep"));
    }

    #[test]
    fn test_recursive_schema_through_properties() {
        let mut map = SchemaMap::new();
        map.insert(
            "Node".to_string(),
            schema(json!({
                "type": "object",
                "properties": { "next": { "$ref": "#/components/schemas/Node" } }
            })),
        );
        let s = schema(json!({ "$ref": "#/components/schemas/Node" }));
        let value = json!({ "next": { "next": { "next": {} } } });
        assert!(validate(&value, &s, &map).is_ok());
        let err = validate(&json!({ "next": { "next": 1 } }), &s, &map).unwrap_err();
        assert_eq!(err.path(), "next.next");
    }

    #[test]
    fn test_not() {
        let s = schema(json!({ "not": { "type": "null" } }));
        let map = SchemaMap::new();
        assert!(validate(&json!(0), &s, &map).is_ok());
        assert!(validate(&Value::Null, &s, &map).is_err());
    }

    #[test]
    fn test_resolve_ref_shapes() {
        let mut map = SchemaMap::new();
        map.insert("a/b".to_string(), Schema::Null);
        assert_eq!(resolve_ref("#/components/schemas/a~1b", &map), Some(&Schema::Null));
        assert_eq!(resolve_ref("#/definitions/a~1b", &map), None);
        assert_eq!(resolve_ref("other.yaml#/components/schemas/x", &map), None);
    }
}
