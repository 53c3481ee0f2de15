use crate::error::ApiError;
use crate::ids::RequestId;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Everything a handler receives for one request.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    /// Lowercase HTTP method
    pub method: String,
    /// Request path with the context path removed
    pub path: String,
    /// The declared path template that matched
    pub template: String,
    pub operation_id: Option<String>,
    /// Value returned by the authorize hook, untouched
    pub session: Option<Value>,
    /// Decoded request body when the operation declares one, otherwise the
    /// bound parameters as an object; `Null` when there is neither
    pub body: Value,
    /// Raw body bytes
    pub raw_body: Bytes,
    /// Lowercase header names
    pub headers: HashMap<String, String>,
    pub response: ResponseHandle,
}

impl HandlerRequest {
    /// Header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Session field, if the session is an object holding `key`.
    #[must_use]
    pub fn session_value(&self, key: &str) -> Option<&Value> {
        self.session.as_ref()?.get(key)
    }
}

/// Lets a handler add headers to its successful response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    headers: Arc<Mutex<Vec<(String, String)>>>,
}

impl ResponseHandle {
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut headers = self.headers.lock().unwrap_or_else(PoisonError::into_inner);
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        headers.push((name, value.into()));
    }

    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A file handed back for download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadableFile {
    pub content_type: String,
    pub file_name: String,
    pub data: Bytes,
}

impl DownloadableFile {
    pub fn new(
        content_type: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// What a handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Empty,
    Json(Value),
    Text(String),
    File(DownloadableFile),
}

/// `null` is empty and a JSON string is text; other values stay JSON.
impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HandlerOutput::Empty,
            Value::String(s) => HandlerOutput::Text(s),
            other => HandlerOutput::Json(other),
        }
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Empty
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

impl From<DownloadableFile> for HandlerOutput {
    fn from(file: DownloadableFile) -> Self {
        HandlerOutput::File(file)
    }
}

/// A registered request handler.
pub type HandlerFn = Arc<
    dyn Fn(HandlerRequest) -> BoxFuture<'static, Result<HandlerOutput, ApiError>> + Send + Sync,
>;

/// Box an async function into a [`HandlerFn`].
pub fn handler<F, Fut, O>(f: F) -> HandlerFn
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
    O: Into<HandlerOutput> + 'static,
{
    Arc::new(move |req| f(req).map(|res| res.map(Into::into)).boxed())
}
