//! # Dispatcher Module
//!
//! The dispatcher owns the request lifecycle. For every request it:
//!
//! 1. answers `OPTIONS` preflights and rejects requests without a method or URL
//! 2. strips the context path and splits off the query
//! 3. hands token-endpoint requests to the authenticate hook
//! 4. resolves the declared path template and the operation for the method
//! 5. runs the authorize hook when the operation requires security
//! 6. finds the route target and its handler
//! 7. decodes and validates the body, or binds and validates parameters
//! 8. calls the handler
//! 9. checks the handler output against the declared `200` response
//!
//! Each step that fails ends the request with a response; nothing escapes
//! [`Dispatcher::handle`], panics included.
//!
//! ## Construction
//!
//! Construction has two phases so a dispatcher never exists without its
//! hooks:
//!
//! ```rust,no_run
//! use schemarouter::config::RouterConfig;
//! use schemarouter::dispatcher::Dispatcher;
//! use schemarouter::registry::HandlerRegistry;
//! use schemarouter::routes::load_routes;
//! use schemarouter::security::NoHooks;
//! use schemarouter::spec::load_spec;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut registry = HandlerRegistry::new();
//! registry.register("pets", "list", |_req| async { Ok(serde_json::json!([])) });
//!
//! let dispatcher = Dispatcher::prepare(
//!     load_spec("openapi.yaml")?,
//!     load_routes("routes.yaml")?,
//!     RouterConfig::default(),
//! )?
//! .bind(&registry, &NoHooks)
//! .await?;
//! # let _ = dispatcher;
//! # Ok(())
//! # }
//! ```

mod core;
mod handler;

pub use core::{Dispatcher, PreparedDispatcher};
pub use handler::{
    handler, DownloadableFile, HandlerFn, HandlerOutput, HandlerRequest, ResponseHandle,
};
