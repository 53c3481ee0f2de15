//! Explicit handler registration.
//!
//! Route entries name a `(module, function)` pair. Applications register an
//! async function under that pair before binding the dispatcher; every route
//! must resolve or binding fails.

use crate::dispatcher::{handler, HandlerFn, HandlerOutput, HandlerRequest};
use crate::error::ApiError;
use crate::routes::RouteTarget;
use std::collections::HashMap;
use std::future::Future;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), HandlerFn>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async function as `module::function`.
    pub fn register<F, Fut, O>(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
        O: Into<HandlerOutput> + 'static,
    {
        self.register_fn(module, function, handler(f))
    }

    /// Register an already boxed handler. Replaces any previous one.
    pub fn register_fn(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        f: HandlerFn,
    ) -> &mut Self {
        let key = (module.into(), function.into());
        info!(module = %key.0, function = %key.1, "Handler registered");
        if self.handlers.insert(key.clone(), f).is_some() {
            warn!(module = %key.0, function = %key.1, "Replacing existing handler");
        }
        self
    }

    #[must_use]
    pub fn resolve(&self, target: &RouteTarget) -> Option<HandlerFn> {
        self.handlers
            .get(&(target.module.clone(), target.function.clone()))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|(m, func)| format!("{m}::{func}"))
            .collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
