//! # Error Module
//!
//! Error kinds raised by hooks and handlers, and the mapping from those kinds
//! to HTTP status codes.
//!
//! | Kind                 | Status |
//! |----------------------|--------|
//! | `JwtParse`           | 400    |
//! | `Authentication`     | 401    |
//! | `Authorization`      | 403    |
//! | `Request`            | 400    |
//! | `State`              | 403    |
//! | `NotFound`           | 404    |
//! | anything else        | 500    |
//!
//! Unrecognized kinds never leak their message to the client: the response
//! carries the configured administrator-contact message instead.

use std::fmt;

/// Body sent with every 404 produced by the router itself.
pub const NOT_FOUND_MESSAGE: &str = "Not found.";

/// Body sent for 500s whose cause must not be exposed to the client.
pub const GENERIC_ERROR_MESSAGE: &str =
    "An unexpected error occurred. Please contact the system administrator.";

/// Classification of a failure raised by a hook or handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A bearer token could not be decoded
    JwtParse,
    /// Credentials are missing or invalid
    Authentication,
    /// Credentials are valid but lack the required permission
    Authorization,
    /// The request itself is malformed
    Request,
    /// The target resource is in a state that forbids the operation
    State,
    /// The target resource does not exist
    NotFound,
    /// Any kind the router does not recognise, carrying its name for logs
    Other(String),
}

impl ErrorKind {
    /// Parse a kind from its conventional name (`"AuthorizationError"` etc.).
    ///
    /// Names that match none of the known kinds become [`ErrorKind::Other`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "JwtParseError" => ErrorKind::JwtParse,
            "AuthenticationError" => ErrorKind::Authentication,
            "AuthorizationError" => ErrorKind::Authorization,
            "RequestError" => ErrorKind::Request,
            "StateError" => ErrorKind::State,
            "NotFoundError" => ErrorKind::NotFound,
            other => ErrorKind::Other(other.to_string()),
        }
    }

    /// Conventional name of the kind, as used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::JwtParse => "JwtParseError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Authorization => "AuthorizationError",
            ErrorKind::Request => "RequestError",
            ErrorKind::State => "StateError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Other(name) => name,
        }
    }

    /// HTTP status for this kind; `None` for unrecognized kinds.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ErrorKind::JwtParse | ErrorKind::Request => Some(400),
            ErrorKind::Authentication => Some(401),
            ErrorKind::Authorization | ErrorKind::State => Some(403),
            ErrorKind::NotFound => Some(404),
            ErrorKind::Other(_) => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised by an authenticate/authorize hook or a route handler.
///
/// Carries a [`ErrorKind`] that decides the HTTP status, a client-facing
/// message, and optionally the underlying cause for diagnostics.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn jwt_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::JwtParse, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Request, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Wrap an arbitrary failure. Always maps to the generic 500.
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Self {
            kind: ErrorKind::Other("InternalError".to_string()),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Attach the underlying cause, kept for debug logging only.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Debug rendering of the cause chain (including a backtrace when
    /// `RUST_BACKTRACE` is set), or the message when there is no cause.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match &self.source {
            Some(src) => format!("{src:?}"),
            None => format!("{}: {}", self.kind, self.message),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

/// Map an error to the status code and body the client receives.
///
/// `generic_message` replaces the message of every unrecognized kind.
#[must_use]
pub fn map_error(err: &ApiError, generic_message: &str) -> (u16, String) {
    match err.kind().status() {
        Some(status) => (status, err.message().to_string()),
        None => (500, generic_message.to_string()),
    }
}
