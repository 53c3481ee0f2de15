use bytes::Bytes;
use std::collections::HashMap;

/// Transport-neutral HTTP request handed to the dispatcher.
///
/// `method` and `url` are optional because a transport may fail to supply
/// them; the dispatcher answers such requests with 404.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingRequest {
    /// HTTP method as received (any case)
    pub method: Option<String>,
    /// Path plus optional `?query`, context path included
    pub url: Option<String>,
    /// Headers with lowercase names, in arrival order
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Append a header; the name is lowercased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Normalized content type (see [`normalize_content_type`]).
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type")
            .map(normalize_content_type)
            .filter(|ct| !ct.is_empty())
    }

    /// Cookies from every `Cookie` header.
    #[must_use]
    pub fn cookies(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter(|(k, _)| k == "cookie")
            .flat_map(|(_, v)| parse_cookies(v))
            .collect()
    }

    /// Headers as a name → value map; the last of repeated headers wins.
    #[must_use]
    pub fn header_map(&self) -> HashMap<String, String> {
        self.headers.iter().cloned().collect()
    }
}

impl<B: Into<Bytes>> From<http::Request<B>> for IncomingRequest {
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self {
            method: Some(parts.method.as_str().to_string()),
            url: Some(url),
            headers,
            body: body.into(),
        }
    }
}

/// Parse one `Cookie` header value into name/value pairs.
pub fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Split `path?query` into its path and query parts.
///
/// The query is `None` without a `?`, and `Some("")` for a trailing bare `?`.
#[must_use]
pub fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.find('?') {
        Some(pos) => (&url[..pos], Some(&url[pos + 1..])),
        None => (url, None),
    }
}

/// URL-decode a query string. Repeated names keep the last value.
#[must_use]
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Lowercase and trim a content type, dropping parameters such as `charset`.
#[must_use]
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_request() {
        let req = http::Request::builder()
            .method("PATCH")
            .uri("http://example.com/api/pets/1?verbose=true")
            .header("X-Trace", "abc")
            .header("Content-Type", "Application/JSON; charset=utf-8")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let incoming = IncomingRequest::from(req);
        assert_eq!(incoming.method.as_deref(), Some("PATCH"));
        assert_eq!(incoming.url.as_deref(), Some("/api/pets/1?verbose=true"));
        assert_eq!(incoming.header("x-trace"), Some("abc"));
        assert_eq!(incoming.header("X-TRACE"), Some("abc"));
        assert_eq!(incoming.content_type().as_deref(), Some("application/json"));
        assert_eq!(&incoming.body[..], b"{}");
    }

    #[test]
    fn test_cookies() {
        let req = IncomingRequest::new("GET", "/")
            .with_header("Cookie", "session=abc; theme = dark")
            .with_header("cookie", "lang=en;;");
        let cookies = req.cookies();
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get("lang").map(String::as_str), Some("en"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/a?b=1"), ("/a", Some("b=1")));
        assert_eq!(split_query("/a?"), ("/a", Some("")));
        assert_eq!(split_query("/a"), ("/a", None));
    }

    #[test]
    fn test_query_last_value_wins_and_decodes() {
        let q = parse_query_params("limit=10&limit=20&name=a%20b&flag");
        assert_eq!(q["limit"], "20");
        assert_eq!(q["name"], "a b");
        assert_eq!(q["flag"], "");
    }

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(normalize_content_type(" Text/Plain ;charset=UTF-8"), "text/plain");
        assert_eq!(normalize_content_type(""), "");
    }
}
