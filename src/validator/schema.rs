//! Closed representation of the JSON-Schema subset understood by the router.
//!
//! Schemas are parsed once, when the interface document is loaded, so that a
//! malformed schema (unknown `type`, bad `pattern`) is a load error rather than
//! a per-request surprise.

use super::format::StringFormat;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;

/// A schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// No constraint (`{}` or `true`)
    Any,
    /// `$ref` pointer into the component registry
    Reference(String),
    String(StringSchema),
    /// `number` or `integer`
    Number(NumberSchema),
    Boolean,
    Null,
    Object(ObjectSchema),
    Array(ArraySchema),
    /// `type: [..]`: valid when any single-type alternative is valid
    Union(Vec<Schema>),
    AnyOf(Vec<Schema>),
    AllOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    Not(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringSchema {
    pub format: Option<StringFormat>,
    pub enumeration: Option<Vec<Value>>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberSchema {
    pub integer: bool,
    pub enumeration: Option<Vec<Value>>,
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
}

/// Numeric bound, inclusive unless `exclusive` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    pub additional: AdditionalProperties,
}

/// Treatment of properties not listed under `properties`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<Schema>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

/// Compiled `pattern` keyword. Compared by source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A schema that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// JSON pointer of the offending node, relative to the schema root
    pub pointer: String,
    pub message: String,
}

impl SchemaError {
    fn new(pointer: &str, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer.is_empty() {
            write!(f, "invalid schema: {}", self.message)
        } else {
            write!(f, "invalid schema at {}: {}", self.pointer, self.message)
        }
    }
}

impl std::error::Error for SchemaError {}

impl Schema {
    /// Parse a schema from its JSON representation.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        parse_node(value, "")
    }

    /// Collect every `$ref` target reachable without resolving references.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Schema::Reference(r) => out.push(r),
            Schema::Object(obj) => {
                for prop in obj.properties.values() {
                    prop.collect_refs(out);
                }
                if let AdditionalProperties::Schema(s) = &obj.additional {
                    s.collect_refs(out);
                }
            }
            Schema::Array(arr) => {
                if let Some(items) = &arr.items {
                    items.collect_refs(out);
                }
            }
            Schema::Union(v) | Schema::AnyOf(v) | Schema::AllOf(v) | Schema::OneOf(v) => {
                for s in v {
                    s.collect_refs(out);
                }
            }
            Schema::Not(s) => s.collect_refs(out),
            Schema::Any
            | Schema::String(_)
            | Schema::Number(_)
            | Schema::Boolean
            | Schema::Null => {}
        }
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Schema::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn parse_node(value: &Value, pointer: &str) -> Result<Schema, SchemaError> {
    let obj = match value {
        Value::Bool(true) => return Ok(Schema::Any),
        Value::Bool(false) => return Ok(Schema::Not(Box::new(Schema::Any))),
        Value::Object(obj) => obj,
        _ => return Err(SchemaError::new(pointer, "schema must be an object")),
    };

    let schema = match obj.get("type") {
        Some(Value::String(ty)) => parse_typed(obj, ty, pointer)?,
        Some(Value::Array(types)) => {
            let mut alternatives = Vec::with_capacity(types.len());
            for (idx, ty) in types.iter().enumerate() {
                let ty = ty.as_str().ok_or_else(|| {
                    SchemaError::new(&format!("{pointer}/type/{idx}"), "type names must be strings")
                })?;
                alternatives.push(parse_typed(obj, ty, pointer)?);
            }
            Schema::Union(alternatives)
        }
        Some(_) => {
            return Err(SchemaError::new(
                &format!("{pointer}/type"),
                "type must be a string or an array of strings",
            ))
        }
        None => parse_untyped(obj, pointer)?,
    };

    let nullable = obj.get("nullable").and_then(Value::as_bool).unwrap_or(false);
    Ok(if nullable { admit_null(schema) } else { schema })
}

fn admit_null(schema: Schema) -> Schema {
    match schema {
        Schema::Any | Schema::Null => schema,
        Schema::Union(mut alternatives) => {
            if !alternatives.contains(&Schema::Null) {
                alternatives.push(Schema::Null);
            }
            Schema::Union(alternatives)
        }
        other => Schema::Union(vec![other, Schema::Null]),
    }
}

fn parse_untyped(obj: &Map<String, Value>, pointer: &str) -> Result<Schema, SchemaError> {
    if let Some(r) = obj.get("$ref") {
        let r = r
            .as_str()
            .ok_or_else(|| SchemaError::new(&format!("{pointer}/$ref"), "$ref must be a string"))?;
        return Ok(Schema::Reference(r.to_string()));
    }

    let mut combinators = Vec::new();
    if let Some(v) = obj.get("anyOf") {
        combinators.push(Schema::AnyOf(parse_list(v, &format!("{pointer}/anyOf"))?));
    }
    if let Some(v) = obj.get("allOf") {
        combinators.push(Schema::AllOf(parse_list(v, &format!("{pointer}/allOf"))?));
    }
    if let Some(v) = obj.get("oneOf") {
        combinators.push(Schema::OneOf(parse_list(v, &format!("{pointer}/oneOf"))?));
    }
    if let Some(v) = obj.get("not") {
        combinators.push(Schema::Not(Box::new(parse_node(v, &format!("{pointer}/not"))?)));
    }

    Ok(match combinators.len() {
        0 => Schema::Any,
        1 => combinators.remove(0),
        _ => Schema::AllOf(combinators),
    })
}

fn parse_list(value: &Value, pointer: &str) -> Result<Vec<Schema>, SchemaError> {
    let items = value
        .as_array()
        .ok_or_else(|| SchemaError::new(pointer, "expected an array of schemas"))?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_node(item, &format!("{pointer}/{idx}")))
        .collect()
}

fn parse_typed(obj: &Map<String, Value>, ty: &str, pointer: &str) -> Result<Schema, SchemaError> {
    match ty {
        "string" => {
            let pattern = match obj.get("pattern").and_then(Value::as_str) {
                Some(src) => Some(Pattern::new(src).map_err(|e| {
                    SchemaError::new(&format!("{pointer}/pattern"), e.to_string())
                })?),
                None => None,
            };
            Ok(Schema::String(StringSchema {
                format: obj.get("format").and_then(Value::as_str).map(StringFormat::parse),
                enumeration: enumeration(obj),
                min_length: obj.get("minLength").and_then(Value::as_u64),
                max_length: obj.get("maxLength").and_then(Value::as_u64),
                pattern,
            }))
        }
        "number" | "integer" => Ok(Schema::Number(NumberSchema {
            integer: ty == "integer",
            enumeration: enumeration(obj),
            minimum: bound(obj, "minimum", "exclusiveMinimum"),
            maximum: bound(obj, "maximum", "exclusiveMaximum"),
        })),
        "boolean" => Ok(Schema::Boolean),
        "null" => Ok(Schema::Null),
        "object" => {
            let mut properties = IndexMap::new();
            if let Some(props) = obj.get("properties") {
                let props = props.as_object().ok_or_else(|| {
                    SchemaError::new(&format!("{pointer}/properties"), "properties must be an object")
                })?;
                for (name, prop) in props {
                    let child = format!("{pointer}/properties/{}", escape_pointer(name));
                    properties.insert(name.clone(), parse_node(prop, &child)?);
                }
            }
            let required = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let additional = match obj.get("additionalProperties") {
                None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
                Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
                Some(other) => AdditionalProperties::Schema(Box::new(parse_node(
                    other,
                    &format!("{pointer}/additionalProperties"),
                )?)),
            };
            Ok(Schema::Object(ObjectSchema {
                properties,
                required,
                additional,
            }))
        }
        "array" => {
            let items = match obj.get("items") {
                Some(Value::Array(_)) => {
                    return Err(SchemaError::new(
                        &format!("{pointer}/items"),
                        "tuple-style items are not supported",
                    ))
                }
                Some(items) => Some(Box::new(parse_node(items, &format!("{pointer}/items"))?)),
                None => None,
            };
            Ok(Schema::Array(ArraySchema {
                items,
                min_items: obj.get("minItems").and_then(Value::as_u64),
                max_items: obj.get("maxItems").and_then(Value::as_u64),
                unique_items: obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
            }))
        }
        other => Err(SchemaError::new(
            &format!("{pointer}/type"),
            format!("unknown type '{other}'"),
        )),
    }
}

fn enumeration(obj: &Map<String, Value>) -> Option<Vec<Value>> {
    obj.get("enum").and_then(Value::as_array).cloned()
}

// Handles both the 3.0 boolean form and the 3.1 numeric form of exclusive bounds.
fn bound(obj: &Map<String, Value>, inclusive_key: &str, exclusive_key: &str) -> Option<Bound> {
    match obj.get(exclusive_key) {
        Some(Value::Number(n)) => n.as_f64().map(|value| Bound {
            value,
            exclusive: true,
        }),
        Some(Value::Bool(exclusive)) => obj
            .get(inclusive_key)
            .and_then(Value::as_f64)
            .map(|value| Bound {
                value,
                exclusive: *exclusive,
            }),
        _ => obj
            .get(inclusive_key)
            .and_then(Value::as_f64)
            .map(|value| Bound {
                value,
                exclusive: false,
            }),
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
