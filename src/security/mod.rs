//! # Security Module
//!
//! Authentication and authorization are delegated to application hooks:
//!
//! - **authenticate** answers requests to the OAuth2 client-credentials token
//!   endpoint declared in `components.securitySchemes`. Its value is returned
//!   to the client as JSON.
//! - **authorize** runs before every operation that declares a non-empty
//!   `security` requirement (directly or through the document root). Its value
//!   becomes the request's session and is handed to the handler untouched.
//!
//! Hooks are plain async functions of the raw request, registered explicitly
//! through [`AuthHooks`]. A [`HookLoader`] supplies them when the dispatcher is
//! bound, so hook construction may itself be asynchronous (fetching keys,
//! connecting to a session store, ...).
//!
//! ## Example
//!
//! ```rust
//! use schemarouter::error::ApiError;
//! use schemarouter::security::{bearer_token, decode_jwt_claims, AuthHooks};
//!
//! let hooks = AuthHooks::new().with_authorize(|req| async move {
//!     let token = bearer_token(&req)
//!         .ok_or_else(|| ApiError::authentication("missing bearer token"))?;
//!     decode_jwt_claims(token)
//! });
//! assert!(hooks.authorize.is_some());
//! ```

mod bearer;

pub use bearer::{bearer_token, decode_jwt_claims};

use crate::error::ApiError;
use crate::server::IncomingRequest;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// An authenticate or authorize hook.
pub type HookFn =
    Arc<dyn Fn(Arc<IncomingRequest>) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

/// Box an async function into a [`HookFn`].
pub fn hook<F, Fut>(f: F) -> HookFn
where
    F: Fn(Arc<IncomingRequest>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    Arc::new(move |req| f(req).boxed())
}

/// The hooks a dispatcher runs around handlers. Either may be absent.
#[derive(Clone, Default)]
pub struct AuthHooks {
    pub authenticate: Option<HookFn>,
    pub authorize: Option<HookFn>,
}

impl AuthHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_authenticate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<IncomingRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        self.authenticate = Some(hook(f));
        self
    }

    #[must_use]
    pub fn with_authorize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<IncomingRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        self.authorize = Some(hook(f));
        self
    }
}

impl std::fmt::Debug for AuthHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHooks")
            .field("authenticate", &self.authenticate.is_some())
            .field("authorize", &self.authorize.is_some())
            .finish()
    }
}

/// Supplies hooks when a dispatcher is bound.
pub trait HookLoader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, anyhow::Result<AuthHooks>>;
}

/// Already-built hooks load as themselves.
impl HookLoader for AuthHooks {
    fn load(&self) -> BoxFuture<'_, anyhow::Result<AuthHooks>> {
        let hooks = self.clone();
        async move { Ok(hooks) }.boxed()
    }
}

/// Loader for routers without authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookLoader for NoHooks {
    fn load(&self) -> BoxFuture<'_, anyhow::Result<AuthHooks>> {
        async { Ok(AuthHooks::default()) }.boxed()
    }
}
