//! # Body Parsing
//!
//! Request bodies are decoded by a [`BodyParser`] before validation. The
//! dispatcher only needs the decoded JSON value; applications with special
//! needs can supply their own parser.
//!
//! [`DefaultBodyParser`] handles:
//!
//! | Content type                         | Decoded as                          |
//! |--------------------------------------|-------------------------------------|
//! | `application/json`, `*+json`         | the JSON document                   |
//! | `application/x-www-form-urlencoded`  | object of string values             |
//! | `multipart/form-data`                | object of fields; files as objects  |
//! | `text/*`                             | string                              |
//! | anything else                        | base64 string of the raw bytes      |
//!
//! A multipart file becomes
//! `{ "filename", "contentType", "size", "data" }` with `data` base64-encoded.
//! When the route declares `validTypes`, files of any other type are rejected.

use crate::error::ApiError;
use crate::server::{normalize_content_type, IncomingRequest};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::io;
use tracing::debug;

/// Per-route parser settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodySettings<'a> {
    /// Content types accepted for multipart file parts; `None` accepts all
    pub valid_types: Option<&'a [String]>,
}

/// A decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    pub data: Value,
    pub raw: Bytes,
}

/// Decodes request bodies.
///
/// `Ok(None)` means the request carried no body.
pub trait BodyParser: Send + Sync {
    fn parse<'a>(
        &'a self,
        request: &'a IncomingRequest,
        settings: BodySettings<'a>,
    ) -> BoxFuture<'a, Result<Option<ParsedBody>, ApiError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBodyParser;

impl BodyParser for DefaultBodyParser {
    fn parse<'a>(
        &'a self,
        request: &'a IncomingRequest,
        settings: BodySettings<'a>,
    ) -> BoxFuture<'a, Result<Option<ParsedBody>, ApiError>> {
        parse_body(request, settings).boxed()
    }
}

async fn parse_body(
    request: &IncomingRequest,
    settings: BodySettings<'_>,
) -> Result<Option<ParsedBody>, ApiError> {
    if request.body.is_empty() {
        return Ok(None);
    }
    let raw = request.body.clone();
    let content_type = request.content_type().unwrap_or_default();
    let data = match content_type.as_str() {
        ct if ct == "application/json" || ct.ends_with("+json") => parse_json(&raw)?,
        "application/x-www-form-urlencoded" => parse_urlencoded(&raw),
        "multipart/form-data" => {
            let header = request.header("content-type").unwrap_or_default();
            parse_multipart(header, raw.clone(), settings.valid_types).await?
        }
        ct if ct.starts_with("text/") => Value::String(
            String::from_utf8(raw.to_vec())
                .map_err(|e| ApiError::request("text body is not valid UTF-8").with_source(e))?,
        ),
        _ => Value::String(general_purpose::STANDARD.encode(&raw)),
    };
    debug!(content_type = %content_type, bytes = raw.len(), "Parsed request body");
    Ok(Some(ParsedBody { data, raw }))
}

fn parse_json(raw: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(raw)
        .map_err(|e| ApiError::request(format!("malformed JSON body: {e}")).with_source(e))
}

fn parse_urlencoded(raw: &[u8]) -> Value {
    let map: Map<String, Value> = url::form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Value::Object(map)
}

async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    valid_types: Option<&[String]>,
) -> Result<Value, ApiError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::request("missing or invalid multipart boundary").with_source(e))?;
    let stream = futures::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::request(format!("malformed multipart body: {e}")).with_source(e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(filename) => {
                let part_type = field
                    .content_type()
                    .map(|m| normalize_content_type(m.essence_str()))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                if let Some(allowed) = valid_types {
                    if !allowed.iter().any(|t| t.eq_ignore_ascii_case(&part_type)) {
                        return Err(ApiError::request(format!(
                            "content type {part_type} is not allowed for field '{name}'"
                        )));
                    }
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::request("failed to read multipart file").with_source(e))?;
                json!({
                    "filename": filename,
                    "contentType": part_type,
                    "size": data.len(),
                    "data": general_purpose::STANDARD.encode(&data),
                })
            }
            None => Value::String(
                field
                    .text()
                    .await
                    .map_err(|e| ApiError::request("failed to read multipart field").with_source(e))?,
            ),
        };
        insert_field(&mut fields, name, value);
    }
    Ok(Value::Object(fields))
}

// Repeated names collect into an array.
fn insert_field(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}
