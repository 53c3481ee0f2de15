use crate::config::RouterConfig;
use crate::error::{map_error, ApiError, NOT_FOUND_MESSAGE};
use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::Value;
use tracing::warn;

const STS_VALUE: &str = "max-age=31536000; includeSubDomains";

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl ResponseBody {
    /// Serialized bytes of the body.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Json(v) => Bytes::from(v.to_string()),
            ResponseBody::Text(s) => Bytes::from(s.clone()),
            ResponseBody::Binary(b) => b.clone(),
        }
    }
}

/// A complete response produced by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every header called `name` with a single value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into an `http` response. Headers that are not valid HTTP are
    /// dropped with a warning.
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.to_bytes());
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(n), Ok(v)) => {
                    headers.append(n, v);
                }
                _ => warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

impl From<ApiResponse> for http::Response<Bytes> {
    fn from(response: ApiResponse) -> Self {
        response.into_http()
    }
}

/// Builds responses with the configured success and error header sets.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    success_headers: Vec<(String, String)>,
    error_headers: Vec<(String, String)>,
    preflight_headers: Vec<(String, String)>,
    generic_message: String,
}

impl ResponseWriter {
    #[must_use]
    pub fn new(config: &RouterConfig) -> Self {
        let mut base = vec![
            (
                "Access-Control-Allow-Origin".to_string(),
                config.allow_origin.clone(),
            ),
            ("X-Content-Type-Options".to_string(), "nosniff".to_string()),
            ("Cache-Control".to_string(), "no-store".to_string()),
        ];
        if config.https_only {
            base.push(("Strict-Transport-Security".to_string(), STS_VALUE.to_string()));
        }

        let with_extra = |extra: &indexmap::IndexMap<String, String>| {
            let mut headers: Vec<(String, String)> = base
                .iter()
                .filter(|(k, _)| !extra.keys().any(|e| e.eq_ignore_ascii_case(k)))
                .cloned()
                .collect();
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            headers
        };
        let success_headers = with_extra(&config.success_headers);
        let error_headers = with_extra(&config.error_headers);

        let mut preflight_headers = success_headers.clone();
        preflight_headers.extend([
            (
                "Access-Control-Allow-Methods".to_string(),
                config.preflight.allow_methods.clone(),
            ),
            (
                "Access-Control-Allow-Headers".to_string(),
                config.preflight.allow_headers.clone(),
            ),
            (
                "Access-Control-Max-Age".to_string(),
                config.preflight.max_age.to_string(),
            ),
        ]);

        Self {
            success_headers,
            error_headers,
            preflight_headers,
            generic_message: config.generic_error_message.clone(),
        }
    }

    /// 200 with the success header set and a content type matching `body`.
    #[must_use]
    pub fn success(&self, body: ResponseBody) -> ApiResponse {
        let mut headers = self.success_headers.clone();
        match &body {
            ResponseBody::Json(_) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            ResponseBody::Text(_) => {
                headers.push(("Content-Type".to_string(), "text/plain".to_string()));
            }
            ResponseBody::Empty | ResponseBody::Binary(_) => {}
        }
        ApiResponse {
            status: 200,
            headers,
            body,
        }
    }

    /// 200 carrying a download.
    #[must_use]
    pub fn file(&self, content_type: &str, file_name: &str, data: Bytes) -> ApiResponse {
        let mut headers = self.success_headers.clone();
        headers.push(("Content-Type".to_string(), content_type.to_string()));
        headers.push((
            "Content-Disposition".to_string(),
            format!("attachment; filename=\"{}\"", sanitize_file_name(file_name)),
        ));
        ApiResponse {
            status: 200,
            headers,
            body: ResponseBody::Binary(data),
        }
    }

    /// Plain-text error with the error header set.
    #[must_use]
    pub fn error(&self, status: u16, message: impl Into<String>) -> ApiResponse {
        let mut headers = self.error_headers.clone();
        headers.push(("Content-Type".to_string(), "text/plain".to_string()));
        ApiResponse {
            status,
            headers,
            body: ResponseBody::Text(message.into()),
        }
    }

    #[must_use]
    pub fn not_found(&self) -> ApiResponse {
        self.error(404, NOT_FOUND_MESSAGE)
    }

    /// 500 with the administrator-contact message.
    #[must_use]
    pub fn internal_error(&self) -> ApiResponse {
        self.error(500, self.generic_message.clone())
    }

    /// Response for a hook or handler failure.
    #[must_use]
    pub fn api_error(&self, err: &ApiError) -> ApiResponse {
        let (status, message) = map_error(err, &self.generic_message);
        self.error(status, message)
    }

    /// Answer to a CORS preflight request.
    #[must_use]
    pub fn preflight(&self) -> ApiResponse {
        ApiResponse {
            status: 200,
            headers: self.preflight_headers.clone(),
            body: ResponseBody::Empty,
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '\\' | '\r' | '\n'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GENERIC_ERROR_MESSAGE;
    use serde_json::json;

    #[test]
    fn test_security_headers_always_present() {
        let writer = ResponseWriter::new(&RouterConfig::default());
        for response in [
            writer.success(ResponseBody::Empty),
            writer.not_found(),
            writer.preflight(),
        ] {
            assert_eq!(response.header("access-control-allow-origin"), Some("*"));
            assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
            assert_eq!(response.header("cache-control"), Some("no-store"));
            assert_eq!(response.header("strict-transport-security"), None);
        }
    }

    #[test]
    fn test_https_only_adds_sts() {
        let config = RouterConfig {
            https_only: true,
            ..RouterConfig::default()
        };
        let writer = ResponseWriter::new(&config);
        assert_eq!(
            writer.error(400, "bad").header("Strict-Transport-Security"),
            Some(STS_VALUE)
        );
    }

    #[test]
    fn test_configured_headers_override_base() {
        let mut config = RouterConfig::default();
        config
            .error_headers
            .insert("cache-control".to_string(), "no-cache".to_string());
        config
            .success_headers
            .insert("X-Frame-Options".to_string(), "DENY".to_string());
        let writer = ResponseWriter::new(&config);

        let err = writer.not_found();
        assert_eq!(err.header("Cache-Control"), Some("no-cache"));
        assert_eq!(err.header("X-Frame-Options"), None);

        let ok = writer.success(ResponseBody::Json(json!({})));
        assert_eq!(ok.header("cache-control"), Some("no-store"));
        assert_eq!(ok.header("x-frame-options"), Some("DENY"));
        assert_eq!(ok.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_preflight() {
        let writer = ResponseWriter::new(&RouterConfig::default());
        let response = writer.preflight();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Access-Control-Max-Age"), Some("86400"));
        assert!(response
            .header("Access-Control-Allow-Methods")
            .unwrap()
            .contains("PATCH"));
    }

    #[test]
    fn test_file_download() {
        let writer = ResponseWriter::new(&RouterConfig::default());
        let response = writer.file("application/pdf", "re\"port.pdf", Bytes::from_static(b"%PDF"));
        assert_eq!(response.header("content-type"), Some("application/pdf"));
        assert_eq!(
            response.header("content-disposition"),
            Some("attachment; filename=\"report.pdf\"")
        );
    }

    #[test]
    fn test_api_error_mapping() {
        let writer = ResponseWriter::new(&RouterConfig::default());
        let forbidden = writer.api_error(&ApiError::authorization("no access"));
        assert_eq!((forbidden.status, forbidden.text()), (403, Some("no access")));
        let hidden = writer.api_error(&ApiError::internal(anyhow::anyhow!("db down")));
        assert_eq!((hidden.status, hidden.text()), (500, Some(GENERIC_ERROR_MESSAGE)));
    }

    #[test]
    fn test_into_http() {
        let writer = ResponseWriter::new(&RouterConfig::default());
        let mut response = writer.success(ResponseBody::Json(json!({ "a": 1 })));
        response.headers.push(("bad header".to_string(), "x".to_string()));
        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()["content-type"], "application/json");
        assert_eq!(http.body(), &Bytes::from_static(br#"{"a":1}"#));
        assert_eq!(http.headers().len(), 4);
    }
}
