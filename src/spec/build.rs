use super::types::{
    ApiSpec, MediaTypeSpec, ParameterLocation, ParameterSpec, RequestBodySpec,
    SecurityRequirement,
};
use crate::validator::{resolve_ref, Schema, ValidationIssue};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static TEMPLATE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}/]+)\}").expect("template parameter pattern is valid"));

/// A single operation with inheritance already applied.
#[derive(Debug, Clone)]
pub struct Operation {
    pub path: String,
    /// Lowercase HTTP method
    pub method: String,
    pub operation_id: Option<String>,
    /// Effective security: the operation's own list, else the document's
    pub security: Vec<SecurityRequirement>,
    /// Path-item parameters merged with the operation's own
    pub parameters: Vec<ParameterSpec>,
    /// Request body with lowercase content-type keys
    pub request_body: Option<RequestBodySpec>,
    /// Content of the `"200"` response with lowercase keys; `None` when no
    /// content is declared
    pub response_content: Option<IndexMap<String, MediaTypeSpec>>,
}

impl Operation {
    /// Whether authorization must run before the handler.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !self.security.is_empty()
    }

    /// Name used in logs: the `operationId` or `METHOD path`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method.to_ascii_uppercase(), self.path),
        }
    }
}

/// Declared path → lowercase method → [`Operation`], in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Operations {
    paths: IndexMap<String, IndexMap<String, Operation>>,
}

impl Operations {
    /// Operations declared under `path`, if the path exists.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&IndexMap<String, Operation>> {
        self.paths.get(path)
    }

    #[must_use]
    pub fn get(&self, path: &str, method: &str) -> Option<&Operation> {
        self.paths.get(path)?.get(method)
    }

    /// Declared path templates in declaration order.
    pub fn templates(&self) -> impl Iterator<Item = &str> + Clone {
        self.paths.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.paths.values().flat_map(IndexMap::values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge path-item parameters with operation parameters.
///
/// An operation parameter replaces a path-item parameter with the same name
/// and location; the rest keep their declared order.
#[must_use]
pub fn merge_parameters(
    path_level: &[ParameterSpec],
    operation_level: &[ParameterSpec],
) -> Vec<ParameterSpec> {
    let mut merged: Vec<ParameterSpec> = path_level
        .iter()
        .filter(|p| {
            !operation_level
                .iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .cloned()
        .collect();
    merged.extend(operation_level.iter().cloned());
    merged
}

fn lowercase_content(content: &IndexMap<String, MediaTypeSpec>) -> IndexMap<String, MediaTypeSpec> {
    content
        .iter()
        .map(|(ct, media)| (ct.trim().to_ascii_lowercase(), media.clone()))
        .collect()
}

/// Resolve every operation of `spec` and collect load-time issues.
///
/// Unresolved schema references, path-parameter mismatches and unknown
/// security schemes are warnings: the router still loads and fails closed at
/// request time where they matter.
#[must_use]
pub fn build_operations(spec: &ApiSpec) -> (Operations, Vec<ValidationIssue>) {
    let mut paths = IndexMap::new();
    let mut issues = Vec::new();

    for (name, schema) in &spec.components.schemas {
        check_refs(schema, &format!("components.schemas.{name}"), spec, &mut issues);
    }

    for (path, item) in &spec.paths {
        let mut methods = IndexMap::new();
        for (method, op) in &item.operations {
            let location = format!("{path}.{method}");

            let parameters = merge_parameters(&item.parameters, &op.parameters);
            check_path_params(path, &parameters, &location, &mut issues);
            for param in &parameters {
                if let Some(schema) = &param.schema {
                    check_refs(schema, &format!("{location}.parameters.{}", param.name), spec, &mut issues);
                }
            }

            let security = op
                .security
                .clone()
                .or_else(|| spec.security.clone())
                .unwrap_or_default();
            for requirement in &security {
                for scheme in requirement.keys() {
                    if !spec.components.security_schemes.contains_key(scheme) {
                        issues.push(ValidationIssue::warning(
                            &location,
                            "UnknownSecurityScheme",
                            format!("security scheme '{scheme}' is not declared in components"),
                        ));
                    }
                }
            }

            let request_body = op.request_body.as_ref().map(|body| RequestBodySpec {
                content: lowercase_content(&body.content),
                required: body.required,
            });
            if let Some(body) = &request_body {
                for (ct, media) in &body.content {
                    if let Some(schema) = &media.schema {
                        check_refs(schema, &format!("{location}.requestBody.{ct}"), spec, &mut issues);
                    }
                }
            }

            let response_content = op
                .responses
                .get("200")
                .and_then(|r| r.content.as_ref())
                .filter(|c| !c.is_empty())
                .map(lowercase_content);
            if let Some(content) = &response_content {
                for (ct, media) in content {
                    if let Some(schema) = &media.schema {
                        check_refs(schema, &format!("{location}.responses.200.{ct}"), spec, &mut issues);
                    }
                }
            }

            methods.insert(
                method.clone(),
                Operation {
                    path: path.clone(),
                    method: method.clone(),
                    operation_id: op.operation_id.clone(),
                    security,
                    parameters,
                    request_body,
                    response_content,
                },
            );
        }
        paths.insert(path.clone(), methods);
    }

    let operations = Operations { paths };
    debug!(
        operations = operations.len(),
        issues = issues.len(),
        "Built operation table"
    );
    (operations, issues)
}

fn check_refs(schema: &Schema, location: &str, spec: &ApiSpec, issues: &mut Vec<ValidationIssue>) {
    let mut refs = Vec::new();
    schema.collect_refs(&mut refs);
    for reference in refs {
        if resolve_ref(reference, &spec.components.schemas).is_none() {
            issues.push(ValidationIssue::warning(
                location,
                "UnresolvedReference",
                format!("{reference} is not a declared component schema"),
            ));
        }
    }
}

fn check_path_params(
    path: &str,
    parameters: &[ParameterSpec],
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let in_template: Vec<&str> = TEMPLATE_PARAM
        .captures_iter(path)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let declared: Vec<&str> = parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Path)
        .map(|p| p.name.as_str())
        .collect();
    for name in &in_template {
        if !declared.contains(name) {
            issues.push(ValidationIssue::warning(
                location,
                "UndeclaredPathParameter",
                format!("template parameter '{name}' has no path parameter declaration"),
            ));
        }
    }
    for name in &declared {
        if !in_template.contains(name) {
            issues.push(ValidationIssue::warning(
                location,
                "UnusedPathParameter",
                format!("path parameter '{name}' does not appear in the template"),
            ));
        }
    }
}

/// Request paths of every OAuth2 client-credentials token endpoint.
///
/// Absolute token URLs contribute their path component; `context_path` is
/// stripped when it prefixes the result.
#[must_use]
pub fn token_paths(spec: &ApiSpec, context_path: &str) -> Vec<String> {
    spec.components
        .security_schemes
        .values()
        .filter(|scheme| scheme.kind.eq_ignore_ascii_case("oauth2"))
        .filter_map(|scheme| scheme.flows.as_ref()?.client_credentials.as_ref())
        .map(|flow| {
            let path = match url::Url::parse(&flow.token_url) {
                Ok(url) => url.path().to_string(),
                Err(_) => flow.token_url.clone(),
            };
            strip_context_path(&path, context_path).to_string()
        })
        .collect()
}

/// Remove `context_path` from the front of `path`, if present.
#[must_use]
pub fn strip_context_path<'a>(path: &'a str, context_path: &str) -> &'a str {
    let prefix = context_path.trim_end_matches('/');
    if prefix.is_empty() {
        return path;
    }
    match path.strip_prefix(prefix) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}
