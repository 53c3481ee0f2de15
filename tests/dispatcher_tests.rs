//! Tests for the request lifecycle
//!
//! # Test Coverage
//!
//! - Query binding with a session from the authorize hook
//! - Body validation, including closed objects and required bodies
//! - 404s for unknown paths, methods and malformed URLs
//! - Error kind mapping for hooks and handlers
//! - Preflight and token-endpoint shortcuts
//! - Response contract checks (JSON, text, files, mismatches)
//! - Panic recovery
//! - Concurrent requests on one shared dispatcher
//! - One completion log line per request

mod common;

use common::{dispatcher_without_hooks, logs, test_dispatcher};
use schemarouter::error::{GENERIC_ERROR_MESSAGE, NOT_FOUND_MESSAGE};
use schemarouter::IncomingRequest;
use serde_json::json;
use std::sync::Arc;

fn get(url: &str) -> IncomingRequest {
    IncomingRequest::new("GET", url).with_header("Authorization", "Bearer t0k3n")
}

fn post_json(url: &str, body: &str) -> IncomingRequest {
    IncomingRequest::new("POST", url)
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(body.to_string())
}

#[tokio::test]
async fn test_query_param_and_session_reach_handler() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher.handle(get("/api/test?param1=param1Value")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json(),
        Some(&json!({ "key1": "1", "key2": "param1Value" }))
    );
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert!(response.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_missing_required_query_param_is_400() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher.handle(get("/api/test?other=1")).await;
    assert_eq!(response.status, 400);
    assert!(response.text().unwrap().contains("param1"));
}

#[tokio::test]
async fn test_post_body_echo_and_validation() {
    let dispatcher = test_dispatcher().await;

    let response = dispatcher
        .handle(post_json("/api/test", r#"{"key1":"value1","key2":"value2"}"#))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json(),
        Some(&json!({ "key1": "value1", "key2": "value2" }))
    );

    let response = dispatcher
        .handle(post_json("/api/test", r#"{"key2":"value2"}"#))
        .await;
    assert_eq!(response.status, 400);
    assert!(response.text().unwrap().starts_with("body"));

    let response = dispatcher
        .handle(post_json("/api/test", r#"{"key1":"a","key3":"extra"}"#))
        .await;
    assert_eq!(response.status, 400);
    assert!(response.text().unwrap().contains("key3"));
}

#[tokio::test]
async fn test_post_body_edge_cases() {
    let dispatcher = test_dispatcher().await;

    // required body missing
    let response = dispatcher
        .handle(IncomingRequest::new("POST", "/api/test").with_header("content-type", "application/json"))
        .await;
    assert_eq!(response.status, 400);

    // undeclared content type
    let response = dispatcher
        .handle(
            IncomingRequest::new("POST", "/api/test")
                .with_header("content-type", "text/plain")
                .with_body("key1=value1"),
        )
        .await;
    assert_eq!(response.status, 400);
    assert!(response.text().unwrap().contains("text/plain"));

    // malformed JSON
    let response = dispatcher.handle(post_json("/api/test", "{oops")).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_not_found_cases() {
    let dispatcher = test_dispatcher().await;
    for req in [
        get("/api/nowhere"),
        IncomingRequest::new("DELETE", "/api/test"),
        get("/api/test?"),
        get("/api/users/1/extra"),
        IncomingRequest {
            method: None,
            url: Some("/api/test".to_string()),
            ..IncomingRequest::default()
        },
        IncomingRequest {
            method: Some("GET".to_string()),
            url: None,
            ..IncomingRequest::default()
        },
    ] {
        let response = dispatcher.handle(req).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.text(), Some(NOT_FOUND_MESSAGE));
        assert_eq!(response.header("cache-control"), Some("no-store"));
    }
}

#[tokio::test]
async fn test_path_parameter_is_coerced_and_validated() {
    let dispatcher = test_dispatcher().await;

    let response = dispatcher.handle(get("/api/users/42")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json(), Some(&json!({ "id": 42 })));
    assert_eq!(response.header("x-user"), Some("42"));

    let response = dispatcher.handle(get("/api/users/abc")).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_authorization_error_maps_to_403() {
    let dispatcher = test_dispatcher().await;

    // security inherited from the document root
    let response = dispatcher
        .handle(get("/api/users/42").with_header("x-deny", "1"))
        .await;
    assert_eq!((response.status, response.text()), (403, Some("denied")));

    // `security: []` opts out, the hook is never consulted
    let response = dispatcher
        .handle(get("/api/greeting").with_header("x-deny", "1"))
        .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_handler_error_kinds() {
    let dispatcher = test_dispatcher().await;

    let response = dispatcher.handle(get("/api/fail")).await;
    assert_eq!((response.status, response.text()), (403, Some("no access for you")));

    let response = dispatcher
        .handle(get("/api/fail").with_header("x-fail-kind", "NotFoundError"))
        .await;
    assert_eq!(response.status, 404);

    let response = dispatcher
        .handle(get("/api/fail").with_header("x-fail-kind", "DatabaseExploded"))
        .await;
    assert_eq!(
        (response.status, response.text()),
        (500, Some(GENERIC_ERROR_MESSAGE))
    );
}

#[tokio::test]
async fn test_handler_panic_is_generic_500() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher.handle(get("/api/panic")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.text(), Some(GENERIC_ERROR_MESSAGE));

    // the dispatcher keeps serving
    let response = dispatcher.handle(get("/api/greeting")).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_response_contracts() {
    let dispatcher = test_dispatcher().await;

    let response = dispatcher.handle(get("/api/greeting")).await;
    assert_eq!(response.text(), Some("hello"));
    assert_eq!(response.header("content-type"), Some("text/plain"));

    let response = dispatcher.handle(get("/api/report")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/pdf"));
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );

    // handler output violates the declared response schema
    let response = dispatcher.handle(get("/api/test?param1=invalid")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.text(), Some(GENERIC_ERROR_MESSAGE));
}

#[tokio::test]
async fn test_empty_array_response_without_items() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher.handle(get("/api/list")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json(), Some(&json!([])));
}

#[tokio::test]
async fn test_output_outside_declared_response_is_500() {
    let dispatcher = test_dispatcher().await;
    // /list declares only application/json
    for output in ["empty", "csv", "text", "number"] {
        let response = dispatcher
            .handle(get("/api/list").with_header("x-output", output))
            .await;
        assert_eq!(response.status, 500, "{output}");
        assert_eq!(response.text(), Some(GENERIC_ERROR_MESSAGE), "{output}");
    }
}

#[tokio::test]
async fn test_parameter_failure_logged_at_error() {
    let dispatcher = test_dispatcher().await;
    let (logs, _guard) = logs::capture();

    let response = dispatcher
        .handle(get("/api/test").with_header("x-api-secret", "hunter2"))
        .await;
    assert_eq!(response.status, 400);

    let lines = logs.lines();
    let failure = lines
        .iter()
        .find(|l| l.contains("Parameter binding failed"))
        .expect("binding failure is logged");
    assert!(failure.contains("\"level\":\"ERROR\""), "{failure}");
    assert!(failure.contains("param1"), "{failure}");
    assert!(failure.contains("<REDACTED>"), "{failure}");
    assert!(!failure.contains("hunter2"), "{failure}");
}

#[tokio::test]
async fn test_preflight() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher
        .handle(IncomingRequest::new("OPTIONS", "/api/anything"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.header("access-control-max-age"), Some("86400"));
}

#[tokio::test]
async fn test_token_endpoint() {
    let dispatcher = test_dispatcher().await;
    let response = dispatcher
        .handle(IncomingRequest::new("POST", "/api/oauth/token"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["access_token"], json!("abc"));

    // without an authenticate hook the request is routed normally
    let dispatcher = dispatcher_without_hooks().await;
    let response = dispatcher
        .handle(IncomingRequest::new("POST", "/api/oauth/token"))
        .await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_without_authorize_hook_session_is_absent() {
    let dispatcher = dispatcher_without_hooks().await;
    let response = dispatcher.handle(get("/api/test?param1=x")).await;
    assert_eq!(response.json(), Some(&json!({ "key1": "", "key2": "x" })));
}

#[tokio::test]
async fn test_concurrent_requests_share_dispatcher() {
    let dispatcher = Arc::new(test_dispatcher().await);
    let (a, b, c) = tokio::join!(
        dispatcher.handle(get("/api/users/1")),
        dispatcher.handle(get("/api/test?param1=two")),
        dispatcher.handle(post_json("/api/test", r#"{"key1":"three"}"#)),
    );
    assert_eq!(a.json(), Some(&json!({ "id": 1 })));
    assert_eq!(b.json().unwrap()["key2"], json!("two"));
    assert_eq!(c.json(), Some(&json!({ "key1": "three" })));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(get(&format!("/api/users/{i}"))).await })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let response = handle.await.unwrap();
        assert_eq!(response.json(), Some(&json!({ "id": i })));
    }
}

#[tokio::test]
async fn test_one_completion_line_per_request() {
    let dispatcher = test_dispatcher().await;
    let (logs, _guard) = logs::capture();

    dispatcher.handle(get("/api/test?param1=a")).await;
    dispatcher.handle(get("/api/nowhere")).await;
    dispatcher.handle(get("/api/users/abc")).await;
    dispatcher.handle(IncomingRequest::new("OPTIONS", "/api/test")).await;

    assert_eq!(logs.count("Request completed"), 3);
    assert_eq!(logs.count("\"level\":\"INFO\""), 3);
    assert_eq!(logs.count("no REST API"), 1);
}

#[tokio::test]
async fn test_handle_http_request() {
    let dispatcher = test_dispatcher().await;
    let request = http::Request::builder()
        .method("POST")
        .uri("/api/test")
        .header("content-type", "application/json")
        .body(r#"{"key1":"v"}"#)
        .unwrap();
    let response = dispatcher.handle_http(request).await;
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(response.body().as_ref(), br#"{"key1":"v"}"#);
}
