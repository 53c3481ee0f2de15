#![allow(dead_code)]

use schemarouter::error::{ApiError, ErrorKind};
use schemarouter::{
    dispatcher::{DownloadableFile, HandlerOutput, HandlerRequest},
    security::bearer_token,
    AuthHooks, Dispatcher, HandlerRegistry, HookLoader, NoHooks, RouteTable, RouterConfig,
};
use serde_json::json;

pub const CONTEXT_PATH: &str = "/api";

/// Interface document shared by the dispatcher tests.
pub const TEST_SPEC: &str = r##"
openapi: 3.0.3
info:
  title: Test API
  version: "1.0.0"
security:
  - oauth: []
components:
  securitySchemes:
    oauth:
      type: oauth2
      flows:
        clientCredentials:
          tokenUrl: https://auth.example.com/api/oauth/token
          scopes: {}
  schemas:
    Pair:
      type: object
      required: [key1]
      properties:
        key1: { type: string }
        key2: { type: string }
      additionalProperties: false
paths:
  /test:
    get:
      operationId: getTest
      parameters:
        - { name: param1, in: query, required: true, schema: { type: string } }
      responses:
        "200":
          content:
            application/json:
              schema: { $ref: "#/components/schemas/Pair" }
    post:
      operationId: postTest
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: "#/components/schemas/Pair" }
      responses:
        "200":
          content:
            application/json:
              schema: { $ref: "#/components/schemas/Pair" }
  /users/{id}:
    parameters:
      - { name: id, in: path, required: true, schema: { type: integer } }
    get:
      operationId: getUser
      responses:
        "200":
          content:
            application/json:
              schema:
                type: object
                required: [id]
                properties:
                  id: { type: integer }
  /fail:
    get:
      operationId: fail
      security: []
      responses:
        "200": { description: never }
  /panic:
    get:
      operationId: panic
      security: []
      responses:
        "200": { description: never }
  /report:
    get:
      operationId: report
      security: []
      responses:
        "200":
          content:
            application/pdf: {}
  /greeting:
    get:
      operationId: greeting
      security: []
      responses:
        "200":
          content:
            text/plain: {}
  /list:
    get:
      operationId: list
      security: []
      responses:
        "200":
          content:
            application/json:
              schema: { type: array }
"##;

pub const TEST_ROUTES: &str = r#"
/test:
  GET: { module: test, function: get }
  post: { module: test, function: post }
/users:
  get: { module: users, function: get }
/fail:
  get: { module: misc, function: fail }
/panic:
  get: { module: misc, function: panic }
/report:
  get: { module: misc, function: report }
/greeting:
  get: { module: misc, function: greeting }
/list:
  get: { module: misc, function: list }
"#;

pub fn test_config() -> RouterConfig {
    RouterConfig {
        context_path: CONTEXT_PATH.to_string(),
        ..RouterConfig::default()
    }
}

pub fn test_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register("test", "get", |req: HandlerRequest| async move {
            let param1 = req.body["param1"].as_str().unwrap_or_default().to_string();
            if param1 == "invalid" {
                return Ok(json!({ "key2": "missing key1" }));
            }
            let user_id = req
                .session_value("userId")
                .map(|id| id.to_string())
                .unwrap_or_default();
            Ok(json!({ "key1": user_id, "key2": param1 }))
        })
        .register("test", "post", |req: HandlerRequest| async move { Ok(req.body) })
        .register("users", "get", |req: HandlerRequest| async move {
            req.response.set_header("X-User", req.body["id"].to_string());
            Ok(json!({ "id": req.body["id"] }))
        })
        .register("misc", "fail", |req: HandlerRequest| async move {
            let kind = req.header("x-fail-kind").unwrap_or("AuthorizationError");
            Err::<HandlerOutput, _>(ApiError::new(
                ErrorKind::from_name(kind),
                "no access for you",
            ))
        })
        .register("misc", "panic", |_req: HandlerRequest| async move {
            if true {
                panic!("handler exploded");
            }
            Ok(())
        })
        .register("misc", "report", |_req: HandlerRequest| async move {
            Ok(DownloadableFile::new(
                "application/pdf",
                "report.pdf",
                &b"%PDF-1.4"[..],
            ))
        })
        .register("misc", "greeting", |_req: HandlerRequest| async move {
            Ok("hello")
        })
        .register("misc", "list", |req: HandlerRequest| async move {
            // `x-output` picks a shape that breaks the declared contract
            let output = match req.header("x-output") {
                Some("empty") => HandlerOutput::Empty,
                Some("csv") => HandlerOutput::File(DownloadableFile::new(
                    "text/csv",
                    "items.csv",
                    &b"a,b"[..],
                )),
                Some("text") => HandlerOutput::Text("not json".to_string()),
                Some("number") => HandlerOutput::Json(json!(3)),
                _ => HandlerOutput::Json(json!([])),
            };
            Ok(output)
        });
    registry
}

/// Authorize succeeds with `{userId: 1}` unless `x-deny` is present.
/// Authenticate issues a fixed token.
pub fn test_hooks() -> AuthHooks {
    AuthHooks::new()
        .with_authorize(|req| async move {
            if req.header("x-deny").is_some() {
                return Err(ApiError::authorization("denied"));
            }
            Ok(json!({ "userId": 1, "token": bearer_token(&req) }))
        })
        .with_authenticate(|_req| async move {
            Ok(json!({ "access_token": "abc", "token_type": "bearer" }))
        })
}

pub async fn dispatcher_with(hooks: &dyn HookLoader) -> Dispatcher {
    let spec = TEST_SPEC.parse().unwrap();
    let routes: RouteTable = TEST_ROUTES.parse().unwrap();
    Dispatcher::prepare(spec, routes, test_config())
        .unwrap()
        .bind(&test_registry(), hooks)
        .await
        .unwrap()
}

pub async fn test_dispatcher() -> Dispatcher {
    dispatcher_with(&test_hooks()).await
}

pub async fn dispatcher_without_hooks() -> Dispatcher {
    dispatcher_with(&NoHooks).await
}

pub mod logs {
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn lines(&self) -> Vec<String> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(str::to_string)
                .collect()
        }

        pub fn count(&self, needle: &str) -> usize {
            self.lines().iter().filter(|l| l.contains(needle)).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Capture INFO and above on the current thread until the guard drops.
    pub fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::INFO)
            .with_writer(logs.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }
}
