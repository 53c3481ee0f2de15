//! # Spec Module
//!
//! The interface document: its serde model ([`ApiSpec`] and friends), loading
//! from YAML/JSON ([`load_spec`]), and the resolved per-operation table
//! ([`build_operations`]) the dispatcher reads at request time.

mod build;
mod load;
mod types;

pub use build::*;
pub use load::*;
pub use types::*;
