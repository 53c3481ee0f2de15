use super::types::ApiSpec;
use crate::validator::{fail_if_issues, ValidationIssue};
use anyhow::Context;
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;

const METHODS: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

/// Keep `parameters` and HTTP methods on each path item, lowercasing methods.
///
/// Everything else (`summary`, `servers`, `x-*`, unknown verbs) is dropped so
/// the remaining keys deserialize as operations.
fn normalize_path_items(val: &mut Value) {
    let Some(Value::Object(paths)) = val.get_mut("paths") else {
        return;
    };
    for item in paths.values_mut() {
        let Value::Object(obj) = item else {
            continue;
        };
        let mut kept = Map::new();
        for (key, op) in std::mem::take(obj) {
            let lower = key.to_ascii_lowercase();
            if lower == "parameters" || METHODS.contains(&lower.as_str()) {
                // first spelling of a method wins
                kept.entry(lower).or_insert(op);
            }
        }
        *obj = kept;
    }
}

/// Replace `$ref`s into `components.parameters`, `components.requestBodies`
/// and `components.responses` with the referenced objects.
fn inline_component_refs(val: &mut Value, issues: &mut Vec<ValidationIssue>) {
    let components = val.get("components").cloned().unwrap_or(Value::Null);
    let Some(Value::Object(paths)) = val.get_mut("paths") else {
        return;
    };
    for (path, item) in paths.iter_mut() {
        let Value::Object(item) = item else {
            continue;
        };
        for (key, entry) in item.iter_mut() {
            let location = format!("{path}.{key}");
            if key == "parameters" {
                inline_list(entry, &components, "parameters", &location, issues);
                continue;
            }
            let Value::Object(op) = entry else {
                continue;
            };
            if let Some(params) = op.get_mut("parameters") {
                inline_list(params, &components, "parameters", &location, issues);
            }
            if let Some(body) = op.get_mut("requestBody") {
                inline_one(body, &components, "requestBodies", &location, issues);
            }
            if let Some(Value::Object(responses)) = op.get_mut("responses") {
                for resp in responses.values_mut() {
                    inline_one(resp, &components, "responses", &location, issues);
                }
            }
        }
    }
}

fn inline_list(
    list: &mut Value,
    components: &Value,
    section: &str,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if let Value::Array(items) = list {
        for item in items {
            inline_one(item, components, section, location, issues);
        }
    }
}

fn inline_one(
    slot: &mut Value,
    components: &Value,
    section: &str,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(reference) = slot.get("$ref").and_then(Value::as_str) else {
        return;
    };
    let prefix = format!("#/components/{section}/");
    let target = reference
        .strip_prefix(&prefix)
        .and_then(|name| components.get(section)?.get(name));
    match target {
        Some(resolved) => *slot = resolved.clone(),
        None => issues.push(ValidationIssue::new(
            location,
            "UnresolvedReference",
            format!("{reference} does not point into components.{section}"),
        )),
    }
}

impl ApiSpec {
    /// Build a document from an already parsed JSON/YAML value.
    pub fn from_value(mut value: Value) -> anyhow::Result<Self> {
        let mut issues = Vec::new();
        normalize_path_items(&mut value);
        inline_component_refs(&mut value, &mut issues);
        fail_if_issues(&issues)?;
        serde_json::from_value(value).context("interface document does not match the expected shape")
    }
}

impl FromStr for ApiSpec {
    type Err = anyhow::Error;

    /// Parse JSON when the text starts with `{`, YAML otherwise.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let value: Value = if content.trim_start().starts_with('{') {
            serde_json::from_str(content).context("invalid JSON interface document")?
        } else {
            serde_yaml::from_str(content).context("invalid YAML interface document")?
        };
        ApiSpec::from_value(value)
    }
}

/// Load the interface document from a `.yaml`/`.yml`/`.json` file.
pub fn load_spec(file_path: impl AsRef<Path>) -> anyhow::Result<ApiSpec> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read interface document {}", file_path.display()))?;
    let value: Value = match file_path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", file_path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", file_path.display()))?,
    };
    ApiSpec::from_value(value).with_context(|| format!("failed to load {}", file_path.display()))
}
