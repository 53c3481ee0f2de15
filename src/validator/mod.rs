//! # Validator Module
//!
//! Two concerns live here:
//!
//! - **Schema validation**: [`Schema`] is the parsed form of the JSON-Schema
//!   subset used by the interface document, and [`validate`] checks a JSON
//!   value against it. Request bodies, bound parameters and handler return
//!   values all go through the same function.
//! - **Load-time issues**: [`ValidationIssue`] collects problems found while
//!   loading the document and route table. Warnings are logged; errors abort
//!   the load via [`fail_if_issues`].
//!
//! ## Supported keywords
//!
//! `type` (single or list), `nullable`, `format` (`date-time`, `date`, `uuid`),
//! `enum`, `minLength`/`maxLength`, `pattern`, `minimum`/`maximum` and their
//! exclusive forms, `properties`, `required`, `additionalProperties`, `items`,
//! `minItems`/`maxItems`, `uniqueItems`, `$ref`, `anyOf`, `allOf`, `oneOf`,
//! `not`.
//!
//! References must point at `#/components/schemas/<name>`; anything else is
//! reported as an unspecified component.

mod format;
mod issues;
mod schema;
mod validate;

pub use format::StringFormat;
pub use issues::{fail_if_issues, report_issues, Severity, ValidationIssue};
pub use schema::{
    AdditionalProperties, ArraySchema, Bound, NumberSchema, ObjectSchema, Pattern, Schema,
    SchemaError, StringSchema,
};
pub use validate::{resolve_ref, type_name, validate, PathSegment, SchemaMap, ValidationError};
