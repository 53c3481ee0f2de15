//! # schemarouter
//!
//! **schemarouter** routes HTTP requests according to an
//! [OpenAPI 3.x](https://spec.openapis.org/oas/v3.1.0) document and a small route
//! document that maps each declared path and method to a handler.
//!
//! ## Overview
//!
//! The interface document is the contract: parameters are bound and coerced
//! from it, request bodies and `200` responses are validated against its
//! schemas, and operations that declare `security` run the application's
//! authorize hook first. The route document only says *who* handles a path:
//!
//! ```yaml
//! /pets:
//!   get: { module: pets, function: list }
//!   POST: { module: pets, function: create }
//! /pets/{id}/photo:
//!   put: { module: pets, function: upload, validTypes: [image/png, image/jpeg] }
//! ```
//!
//! ## Architecture
//!
//! - **[`validator`]** - schema model and recursive validation
//! - **[`router`]** - resolving a request path to a declared template
//! - **[`params`]** - parameter binding and coercion
//! - **[`dispatcher`]** - the request lifecycle
//! - **[`server`]** - incoming request and response types, header policy
//! - **[`spec`]** - interface document loading and the operation table
//! - **[`routes`]** - route document loading and lookup
//! - **[`registry`]** - handler registration
//! - **[`security`]** - authenticate/authorize hooks and bearer helpers
//! - **[`body`]** - request body decoding
//! - **[`config`]**, **[`logging`]**, **[`ids`]** - configuration, tracing setup,
//!   request ids
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Dispatcher
//!     participant Resolver as PathResolver
//!     participant Hooks as AuthHooks
//!     participant Binder as Body/Params
//!     participant Handler
//!
//!     Client->>Dispatcher: GET /api/pets/7
//!     Dispatcher->>Dispatcher: strip context path, split query
//!     Dispatcher->>Resolver: resolve("/pets/7")
//!     Resolver-->>Dispatcher: /pets/{id} ["7"]
//!     Dispatcher->>Hooks: authorize(request)
//!     Hooks-->>Dispatcher: session
//!     Dispatcher->>Binder: bind + validate
//!     Binder-->>Dispatcher: {"id": 7}
//!     Dispatcher->>Handler: HandlerRequest
//!     Handler-->>Dispatcher: HandlerOutput
//!     Dispatcher->>Dispatcher: validate against 200 response
//!     Dispatcher-->>Client: ApiResponse
//! ```
//!
//! ## Errors
//!
//! Hooks and handlers fail with [`error::ApiError`]. Its kind decides the
//! status; kinds without a mapping become a 500 with a generic message so
//! internal details never reach the client.

pub mod body;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod params;
pub mod registry;
pub mod router;
pub mod routes;
pub mod security;
pub mod server;
pub mod spec;
pub mod validator;

pub use config::{load_config, RouterConfig};
pub use dispatcher::{Dispatcher, HandlerOutput, HandlerRequest, PreparedDispatcher};
pub use error::{ApiError, ErrorKind};
pub use registry::HandlerRegistry;
pub use routes::{load_routes, RouteTable, RouteTarget};
pub use security::{AuthHooks, HookLoader, NoHooks};
pub use server::{ApiResponse, IncomingRequest};
pub use spec::{load_spec, ApiSpec};
