//! # Router Configuration
//!
//! [`RouterConfig`] controls the parts of request handling that are not
//! described by the interface document: the context path the router is
//! mounted under, CORS and security headers, preflight answers, and the
//! message sent for unexpected failures.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration.
//!
//! ## File formats
//!
//! [`load_config`] picks the format from the extension: `.yaml`/`.yml`,
//! `.json` or `.toml`.
//!
//! ```yaml
//! context_path: /api/v1
//! https_only: true
//! allow_origin: https://app.example.com
//! success_headers:
//!   X-Frame-Options: DENY
//! preflight:
//!   max_age: 600
//! ```
//!
//! ## Environment Variables
//!
//! Applied on top of the file by [`RouterConfig::apply_env_overrides`]:
//!
//! | Variable               | Field          |
//! |------------------------|----------------|
//! | `SROUTER_CONTEXT_PATH` | `context_path` |
//! | `SROUTER_HTTPS_ONLY`   | `https_only` (`1`/`true`/`yes`/`on`) |
//! | `SROUTER_ALLOW_ORIGIN` | `allow_origin` |

use crate::error::GENERIC_ERROR_MESSAGE;
use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Prefix stripped from request paths before routing (e.g. `/api/v1`)
    pub context_path: String,
    /// Adds `Strict-Transport-Security` to every response
    pub https_only: bool,
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
    /// Extra headers on successful responses
    pub success_headers: IndexMap<String, String>,
    /// Extra headers on error responses
    pub error_headers: IndexMap<String, String>,
    pub preflight: PreflightConfig,
    /// Body of 500 responses whose cause is not exposed
    pub generic_error_message: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            context_path: String::new(),
            https_only: false,
            allow_origin: "*".to_string(),
            success_headers: IndexMap::new(),
            error_headers: IndexMap::new(),
            preflight: PreflightConfig::default(),
            generic_error_message: GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Answers to CORS preflight (`OPTIONS`) requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    pub allow_methods: String,
    pub allow_headers: String,
    /// Seconds
    pub max_age: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            allow_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
            max_age: 86400,
        }
    }
}

impl RouterConfig {
    /// Apply `SROUTER_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("SROUTER_CONTEXT_PATH") {
            self.context_path = path;
        }
        if let Some(flag) = lookup("SROUTER_HTTPS_ONLY") {
            self.https_only = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(origin) = lookup("SROUTER_ALLOW_ORIGIN") {
            self.allow_origin = origin;
        }
    }

    /// Context path without a trailing `/`; empty when unset.
    #[must_use]
    pub fn normalized_context_path(&self) -> &str {
        self.context_path.trim_end_matches('/')
    }
}

/// Load a configuration file and apply environment overrides.
pub fn load_config(file_path: impl AsRef<Path>) -> anyhow::Result<RouterConfig> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read config {}", file_path.display()))?;
    let mut config: RouterConfig = match file_path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            if content.trim().is_empty() {
                RouterConfig::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid YAML in {}", file_path.display()))?
            }
        }
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", file_path.display()))?,
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", file_path.display()))?,
        other => anyhow::bail!(
            "unsupported config format {:?} for {}",
            other.unwrap_or(""),
            file_path.display()
        ),
    };
    config.apply_env_overrides();
    debug!(
        path = %file_path.display(),
        context_path = %config.context_path,
        https_only = config.https_only,
        "Loaded router config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.allow_origin, "*");
        assert!(!config.https_only);
        assert_eq!(config.preflight.max_age, 86400);
        assert_eq!(config.generic_error_message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_partial_toml() {
        let config: RouterConfig = toml::from_str(
            r#"
context_path = "/api"

[preflight]
max_age = 60

[success_headers]
X-Frame-Options = "DENY"
"#,
        )
        .unwrap();
        assert_eq!(config.context_path, "/api");
        assert_eq!(config.preflight.max_age, 60);
        assert_eq!(config.preflight.allow_headers, "Content-Type, Authorization");
        assert_eq!(config.success_headers["X-Frame-Options"], "DENY");
        assert_eq!(config.allow_origin, "*");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SROUTER_CONTEXT_PATH", "/v2/"),
            ("SROUTER_HTTPS_ONLY", "Yes"),
        ]);
        let mut config = RouterConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.normalized_context_path(), "/v2");
        assert!(config.https_only);
        assert_eq!(config.allow_origin, "*");
    }
}
