//! # Router Module
//!
//! Path resolution for schemarouter. A request path is mapped to one of the
//! path templates declared in the interface document, and the values of its
//! trailing `{param}` segments are extracted positionally.
//!
//! ## Algorithm
//!
//! 1. **Literal match**: a template equal to the request path wins outright.
//! 2. **Parametric match**: the last segment is peeled off and the remaining
//!    prefix is tried as `prefix/{x}` against every template in declaration
//!    order. If nothing matches, another segment is peeled and `prefix/{x}/{y}`
//!    is tried, and so on until the prefix would be empty or `/`.
//!
//! Parameters can only occupy the tail of a template: `/users/{id}` and
//! `/users/{id}/{field}` resolve, `/users/{id}/posts` only resolves literally.
//!
//! ## Example
//!
//! ```rust
//! use schemarouter::router::PathResolver;
//!
//! let resolver = PathResolver::new(["/users", "/users/{id}"]);
//! let m = resolver.resolve("/users/42").unwrap();
//! assert_eq!(m.template, "/users/{id}");
//! assert_eq!(m.params, vec!["42"]);
//! ```

mod core;

pub use core::{resolve, PathMatch, PathResolver};
