//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`; this module only installs a
//! subscriber for applications that don't bring their own.
//!
//! | Variable                    | Default | Meaning                           |
//! |-----------------------------|---------|-----------------------------------|
//! | `SROUTER_LOG_LEVEL`         | `info`  | trace/debug/info/warn/error       |
//! | `SROUTER_LOG_FORMAT`        | `json`  | `json` or `pretty`                |
//! | `SROUTER_LOG_TARGET_FILTER` | unset   | extra comma-separated directives  |
//!
//! `RUST_LOG`, when set, takes precedence over `SROUTER_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const REDACTED: &str = "<REDACTED>";

/// JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    /// Extra filter directives, comma-separated (`schemarouter=debug,hyper=warn`)
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_level: lookup("SROUTER_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("SROUTER_LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.format),
            target_filter: lookup("SROUTER_LOG_TARGET_FILTER").filter(|f| !f.trim().is_empty()),
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Build the filter: `RUST_LOG` if set, else the configured level, plus
    /// any target directives. Invalid directives are skipped.
    pub fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
///
/// ```no_run
/// use schemarouter::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize logging")
}

/// Whether a header or field name carries credentials.
pub fn is_sensitive(name: &str) -> bool {
    const PATTERNS: [&str; 8] = [
        "authorization",
        "cookie",
        "token",
        "secret",
        "password",
        "api_key",
        "apikey",
        "api-key",
    ];
    let name = name.to_lowercase();
    PATTERNS.iter().any(|p| name.contains(p))
}

/// Copy of `headers` safe to log.
pub fn redact_headers<'a>(
    headers: impl IntoIterator<Item = &'a (String, String)>,
) -> Vec<(String, String)> {
    headers
        .into_iter()
        .map(|(k, v)| {
            if is_sensitive(k) {
                (k.clone(), REDACTED.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}
