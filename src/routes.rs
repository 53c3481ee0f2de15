//! # Route Table
//!
//! The route document maps each declared path template and HTTP method to the
//! handler that serves it:
//!
//! ```yaml
//! /pets:
//!   GET: { module: pets, function: list }
//!   post: { module: pets, function: add, validTypes: [image/png] }
//! /pets/{id}:
//!   get: { module: pets, function: show }
//! ```
//!
//! Method keys are case-insensitive and stored lowercase. `validTypes` lists
//! the content types a multipart upload may carry.

use crate::validator::{fail_if_issues, ValidationIssue};
use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

/// Handler reference for one (path, method).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTarget {
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub valid_types: Option<Vec<String>>,
}

impl RouteTarget {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            valid_types: None,
        }
    }

    #[must_use]
    pub fn with_valid_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

/// Immutable path → lowercase method → [`RouteTarget`] table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: IndexMap<String, IndexMap<String, RouteTarget>>,
}

impl RouteTable {
    /// Build from `(path, method, target)` triples; later duplicates win.
    pub fn from_entries<I, P, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, M, RouteTarget)>,
        P: Into<String>,
        M: AsRef<str>,
    {
        let mut routes: IndexMap<String, IndexMap<String, RouteTarget>> = IndexMap::new();
        for (path, method, target) in entries {
            routes
                .entry(path.into())
                .or_default()
                .insert(method.as_ref().to_ascii_lowercase(), target);
        }
        Self { routes }
    }

    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let raw: IndexMap<String, IndexMap<String, RouteTarget>> =
            serde_json::from_value(value).context("route document does not match the expected shape")?;
        let mut issues = Vec::new();
        let mut routes = IndexMap::with_capacity(raw.len());
        for (path, methods) in raw {
            let mut normalized = IndexMap::with_capacity(methods.len());
            for (method, target) in methods {
                let lower = method.to_ascii_lowercase();
                if normalized.contains_key(&lower) {
                    issues.push(ValidationIssue::new(
                        &path,
                        "DuplicateRoute",
                        format!("method '{method}' is declared more than once"),
                    ));
                    continue;
                }
                normalized.insert(lower, target);
            }
            routes.insert(path, normalized);
        }
        fail_if_issues(&issues)?;
        Ok(Self { routes })
    }

    /// Methods declared for a template.
    ///
    /// A literal match must name the path exactly. A parametric match takes
    /// the longest declared path that prefixes the template on a segment
    /// boundary.
    #[must_use]
    pub fn methods_for(&self, template: &str, literal: bool) -> Option<&IndexMap<String, RouteTarget>> {
        if literal {
            return self.routes.get(template);
        }
        self.routes
            .iter()
            .filter(|(path, _)| is_segment_prefix(path, template))
            .max_by_key(|(path, _)| path.len())
            .map(|(_, methods)| methods)
    }

    /// Target for `method` (any case) at `template`.
    #[must_use]
    pub fn target(&self, template: &str, literal: bool, method: &str) -> Option<&RouteTarget> {
        self.methods_for(template, literal)?
            .get(&method.to_ascii_lowercase())
    }

    /// All `(path, method, target)` entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RouteTarget)> {
        self.routes.iter().flat_map(|(path, methods)| {
            methods
                .iter()
                .map(move |(method, target)| (path.as_str(), method.as_str(), target))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl FromStr for RouteTable {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let value: Value = if content.trim_start().starts_with('{') {
            serde_json::from_str(content).context("invalid JSON route document")?
        } else {
            serde_yaml::from_str(content).context("invalid YAML route document")?
        };
        RouteTable::from_value(value)
    }
}

/// Load the route document from a `.yaml`/`.yml`/`.json` file.
pub fn load_routes(file_path: impl AsRef<Path>) -> anyhow::Result<RouteTable> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read route document {}", file_path.display()))?;
    let value: Value = match file_path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", file_path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", file_path.display()))?,
    };
    RouteTable::from_value(value).with_context(|| format!("failed to load {}", file_path.display()))
}
