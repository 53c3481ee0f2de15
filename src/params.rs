//! # Parameter Binding
//!
//! Pulls the declared parameters of an operation out of the request, coerces
//! them to the primitive type their schema names, and validates the result
//! against that schema.
//!
//! | Location | Source                                         |
//! |----------|------------------------------------------------|
//! | `query`  | query string, by name (last value wins)        |
//! | `path`   | resolved path values, by position, decoded     |
//! | `header` | request headers, case-insensitive name         |
//! | `cookie` | `Cookie` header, by name                       |
//!
//! Only primitive coercion is performed: `number`/`integer` and `boolean`.
//! Everything else is passed through as a string.

use crate::server::IncomingRequest;
use crate::spec::{ParameterLocation, ParameterSpec};
use crate::validator::{validate, SchemaMap};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.-]+$").expect("numeric pattern is valid"));

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}/]+)\}").expect("placeholder pattern is valid"));

/// A parameter that is missing, cannot be coerced, or fails its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    pub parameter: String,
    pub location: ParameterLocation,
    pub message: String,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} parameter '{}': {}",
            self.location, self.parameter, self.message
        )
    }
}

impl std::error::Error for BindError {}

/// Request-side inputs to [`bind_parameters`].
#[derive(Debug, Clone, Copy)]
pub struct ParameterSources<'a> {
    pub request: &'a IncomingRequest,
    pub query: &'a HashMap<String, String>,
    /// The matched path template
    pub template: &'a str,
    /// Values of the template's placeholders, left to right
    pub path_values: &'a [String],
}

/// Bind `params` from `sources`, returning name → coerced value.
///
/// Optional parameters that are absent are omitted from the result.
pub fn bind_parameters(
    params: &[ParameterSpec],
    sources: &ParameterSources<'_>,
    schemas: &SchemaMap,
) -> Result<Map<String, Value>, BindError> {
    let placeholders: Vec<&str> = PLACEHOLDER
        .captures_iter(sources.template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let cookies = sources.request.cookies();
    let mut path_index = 0usize;
    let mut bound = Map::new();

    for param in params {
        let raw: Option<Cow<'_, str>> = match param.location {
            ParameterLocation::Query => sources
                .query
                .get(&param.name)
                .map(|v| Cow::Borrowed(v.as_str())),
            ParameterLocation::Path => {
                let position = placeholders
                    .iter()
                    .position(|p| *p == param.name)
                    .unwrap_or(path_index);
                path_index += 1;
                // path segments arrive still percent-encoded
                sources
                    .path_values
                    .get(position)
                    .map(|v| percent_decode_str(v).decode_utf8_lossy())
            }
            ParameterLocation::Header => sources.request.header(&param.name).map(Cow::Borrowed),
            ParameterLocation::Cookie => cookies
                .get(&param.name)
                .map(|v| Cow::Borrowed(v.as_str())),
        };

        let Some(raw) = raw else {
            if param.required {
                return Err(error(param, "required parameter is missing"));
            }
            continue;
        };

        let value = coerce(&raw, param).map_err(|msg| error(param, msg))?;
        if let Some(schema) = &param.schema {
            validate(&value, schema, schemas).map_err(|e| error(param, e.to_string()))?;
        }
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

fn error(param: &ParameterSpec, message: impl Into<String>) -> BindError {
    BindError {
        parameter: param.name.clone(),
        location: param.location.clone(),
        message: message.into(),
    }
}

/// Coerce a raw string to the parameter's primitive type.
pub fn coerce(raw: &str, param: &ParameterSpec) -> Result<Value, String> {
    match param.primitive_type() {
        Some(ty @ ("number" | "integer")) => {
            if !NUMERIC.is_match(raw) {
                return Err(format!("expected {ty}, got \"{raw}\""));
            }
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::from(i));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected {ty}, got \"{raw}\""))
        }
        Some("boolean") => match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{raw}\"")),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}
