use super::handler::{HandlerFn, HandlerOutput, HandlerRequest, ResponseHandle};
use crate::body::{BodyParser, BodySettings, DefaultBodyParser};
use crate::config::RouterConfig;
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::logging::redact_headers;
use crate::params::{bind_parameters, ParameterSources};
use crate::registry::HandlerRegistry;
use crate::router::{PathMatch, PathResolver};
use crate::routes::RouteTable;
use crate::security::{AuthHooks, HookLoader};
use crate::server::{
    normalize_content_type, parse_query_params, split_query, ApiResponse, IncomingRequest,
    ResponseBody, ResponseWriter,
};
use crate::spec::{build_operations, strip_context_path, token_paths, ApiSpec, MediaTypeSpec, Operation, Operations};
use crate::validator::{fail_if_issues, validate, PathSegment, SchemaMap, ValidationIssue};
use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

type HandlerKey = (String, String);

/// Declarative tables parsed and cross-checked, waiting for handlers and
/// hooks.
pub struct PreparedDispatcher {
    operations: Operations,
    routes: RouteTable,
    schemas: SchemaMap,
    token_paths: Vec<String>,
    config: RouterConfig,
    body_parser: Arc<dyn BodyParser>,
}

/// Routes requests through hooks, validation and handlers.
///
/// Immutable once bound; share it behind an `Arc`.
pub struct Dispatcher {
    operations: Operations,
    routes: RouteTable,
    schemas: SchemaMap,
    resolver: PathResolver,
    token_paths: Vec<String>,
    context_path: String,
    writer: ResponseWriter,
    body_parser: Arc<dyn BodyParser>,
    hooks: AuthHooks,
    handlers: HashMap<HandlerKey, HandlerFn>,
}

/// Per-request facts for the completion log line.
#[derive(Default)]
struct RequestTrace {
    preflight: bool,
    operation: Option<String>,
    session: Option<Value>,
    reason: Option<&'static str>,
}

impl Dispatcher {
    /// Build the operation table and check it against the route table.
    ///
    /// Warnings (unreachable routes, operations without a route, unresolved
    /// references) are logged; errors abort.
    pub fn prepare(
        spec: ApiSpec,
        routes: RouteTable,
        config: RouterConfig,
    ) -> anyhow::Result<PreparedDispatcher> {
        let (operations, mut issues) = build_operations(&spec);
        issues.extend(check_routes(&operations, &routes));
        fail_if_issues(&issues)?;

        let token_paths = token_paths(&spec, config.normalized_context_path());
        info!(
            title = %spec.info.title,
            version = %spec.info.version,
            operations = operations.len(),
            routes = routes.len(),
            token_endpoints = token_paths.len(),
            "Dispatcher prepared"
        );
        Ok(PreparedDispatcher {
            operations,
            routes,
            schemas: spec.components.schemas,
            token_paths,
            config,
            body_parser: Arc::new(DefaultBodyParser),
        })
    }

    #[must_use]
    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// Handle one request. Never fails: every outcome is a response.
    pub async fn handle(&self, req: IncomingRequest) -> ApiResponse {
        let started = Instant::now();
        let request_id = RequestId::for_request(&req);
        let method = req.method.clone().unwrap_or_default();
        let url = req.url.clone().unwrap_or_default();
        let req = Arc::new(req);
        let mut trace = RequestTrace::default();

        let outcome = AssertUnwindSafe(self.process(&req, request_id, &mut trace))
            .catch_unwind()
            .await;
        let mut response = match outcome {
            Ok(response) => response,
            Err(_) => {
                error!(%request_id, method = %method, url = %url, "Request processing panicked");
                self.writer.internal_error()
            }
        };
        response.set_header("X-Request-Id", request_id.to_string());

        if !trace.preflight {
            info!(
                %request_id,
                method = %method,
                url = %url,
                status = response.status,
                operation_id = trace.operation.as_deref().unwrap_or("-"),
                session = ?trace.session,
                reason = trace.reason.unwrap_or("-"),
                duration_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
        }
        response
    }

    /// Convert and handle an `http` request.
    pub async fn handle_http<B: Into<bytes::Bytes>>(
        &self,
        req: http::Request<B>,
    ) -> http::Response<bytes::Bytes> {
        self.handle(IncomingRequest::from(req)).await.into_http()
    }

    async fn process(
        &self,
        req: &Arc<IncomingRequest>,
        request_id: RequestId,
        trace: &mut RequestTrace,
    ) -> ApiResponse {
        // 1: method and preflight
        let Some(method) = req.method.as_deref().map(str::to_ascii_lowercase) else {
            trace.reason = Some("no method");
            return self.writer.not_found();
        };
        if method == "options" {
            trace.preflight = true;
            debug!(%request_id, "Preflight request");
            return self.writer.preflight();
        }

        // 2-3: url, context path, query
        let Some(url) = req.url.as_deref() else {
            trace.reason = Some("no url");
            return self.writer.not_found();
        };
        let (raw_path, query) = split_query(url);
        if query == Some("") {
            trace.reason = Some("empty query");
            return self.writer.not_found();
        }
        let path = strip_context_path(raw_path, &self.context_path);

        // 4: token endpoint
        if let Some(authenticate) = &self.hooks.authenticate {
            if self.token_paths.iter().any(|p| p == path) {
                debug!(%request_id, path = %path, "Token endpoint request");
                return match authenticate(Arc::clone(req)).await {
                    Ok(token) => self.writer.success(ResponseBody::Json(token)),
                    Err(e) => self.hook_failure(request_id, "authenticate", &e),
                };
            }
        }

        // 5: resolve the path template
        let Some(matched) = self.resolver.resolve(path) else {
            trace.reason = Some("no REST API");
            return self.writer.not_found();
        };

        // 6: operation
        let Some(operation) = self.operations.get(&matched.template, &method) else {
            trace.reason = Some("no operation");
            return self.writer.not_found();
        };
        trace.operation = Some(operation.display_name());

        // 7: authorization
        let session = match (&self.hooks.authorize, operation.requires_auth()) {
            (Some(authorize), true) => match authorize(Arc::clone(req)).await {
                Ok(session) => Some(session),
                Err(e) => return self.hook_failure(request_id, "authorize", &e),
            },
            _ => None,
        };
        trace.session = session.clone();

        // 8: route target and handler
        let Some(target) = self.routes.target(&matched.template, matched.literal, &method) else {
            trace.reason = Some("no module");
            return self.writer.not_found();
        };
        let Some(handler) = self
            .handlers
            .get(&(target.module.clone(), target.function.clone()))
        else {
            error!(
                %request_id,
                module = %target.module,
                function = %target.function,
                "Route target has no bound handler"
            );
            return self.writer.internal_error();
        };

        // 9: body or parameters
        let settings = BodySettings {
            valid_types: target.valid_types.as_deref(),
        };
        let input = match self
            .request_input(req, operation, &matched, query, settings, request_id)
            .await
        {
            Ok(input) => input,
            Err(response) => return response,
        };

        // 10: handler
        let response_handle = ResponseHandle::default();
        let handler_req = HandlerRequest {
            request_id,
            method,
            path: path.to_string(),
            template: matched.template.clone(),
            operation_id: operation.operation_id.clone(),
            session,
            body: input,
            raw_body: req.body.clone(),
            headers: req.header_map(),
            response: response_handle.clone(),
        };
        debug!(
            %request_id,
            module = %target.module,
            function = %target.function,
            "Dispatching to handler"
        );
        let output = match AssertUnwindSafe(handler(handler_req)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(%request_id, operation = %operation.display_name(), "{}", e.message());
                debug!(%request_id, detail = %e.diagnostic(), "Handler error detail");
                return self.writer.api_error(&e);
            }
            Err(_) => {
                error!(%request_id, operation = %operation.display_name(), "Handler panicked");
                return self.writer.internal_error();
            }
        };

        // 11: response
        let mut response = self.respond(operation, output, request_id);
        if response.status == 200 {
            for (name, value) in response_handle.headers() {
                response.set_header(name, value);
            }
        }
        response
    }

    /// The value handed to the handler as its body, or the 400 to send.
    async fn request_input(
        &self,
        req: &IncomingRequest,
        operation: &Operation,
        matched: &PathMatch,
        query: Option<&str>,
        settings: BodySettings<'_>,
        request_id: RequestId,
    ) -> Result<Value, ApiResponse> {
        if let Some(request_body) = &operation.request_body {
            let parsed = self
                .body_parser
                .parse(req, settings)
                .await
                .map_err(|e| self.writer.api_error(&e))?;
            let Some(parsed) = parsed else {
                if request_body.required {
                    return Err(self.writer.error(400, "request body is required"));
                }
                return Ok(Value::Null);
            };
            let content_type = req.content_type().unwrap_or_default();
            let Some(media) = request_body.content.get(&content_type) else {
                return Err(self.writer.error(
                    400,
                    format!("content type '{content_type}' is not accepted"),
                ));
            };
            if let Some(schema) = &media.schema {
                if let Err(e) = validate(&parsed.data, schema, &self.schemas) {
                    let e = e.within(PathSegment::Property("body".to_string()));
                    error!(
                        %request_id,
                        operation = %operation.display_name(),
                        error = %e,
                        headers = ?redact_headers(&req.headers),
                        definition = ?schema,
                        "Request body failed validation"
                    );
                    return Err(self.writer.error(400, e.to_string()));
                }
            }
            return Ok(parsed.data);
        }

        if operation.parameters.is_empty() {
            return Ok(Value::Null);
        }
        let query_params = query.map(parse_query_params).unwrap_or_default();
        let sources = ParameterSources {
            request: req,
            query: &query_params,
            template: &matched.template,
            path_values: &matched.params,
        };
        match bind_parameters(&operation.parameters, &sources, &self.schemas) {
            Ok(bound) => Ok(Value::Object(bound)),
            Err(e) => {
                error!(
                    %request_id,
                    operation = %operation.display_name(),
                    error = %e,
                    url = ?req.url,
                    headers = ?redact_headers(&req.headers),
                    definition = ?operation.parameters,
                    "Parameter binding failed"
                );
                Err(self.writer.error(400, e.to_string()))
            }
        }
    }

    /// Check the handler output against the declared `"200"` response.
    fn respond(&self, operation: &Operation, output: HandlerOutput, request_id: RequestId) -> ApiResponse {
        let declared = operation.response_content.as_ref();
        match (output, declared) {
            (HandlerOutput::Empty, None) => self.writer.success(ResponseBody::Empty),
            (HandlerOutput::File(file), Some(content))
                if media_for(content, &file.content_type).is_some() =>
            {
                self.writer.file(&file.content_type, &file.file_name, file.data)
            }
            (HandlerOutput::Json(value), Some(content))
                if value.is_object() || value.is_array() =>
            {
                let Some(media) = media_for(content, "application/json") else {
                    return self.response_mismatch(operation, request_id, "application/json is not declared");
                };
                if let Some(schema) = &media.schema {
                    if let Err(e) = validate(&value, schema, &self.schemas) {
                        error!(
                            %request_id,
                            operation = %operation.display_name(),
                            error = %e,
                            definition = ?schema,
                            "Response failed validation"
                        );
                        return self.writer.internal_error();
                    }
                }
                self.writer.success(ResponseBody::Json(value))
            }
            (HandlerOutput::Text(text), Some(content))
                if media_for(content, "text/plain").is_some() =>
            {
                self.writer.success(ResponseBody::Text(text))
            }
            (HandlerOutput::Empty, Some(_)) => {
                self.response_mismatch(operation, request_id, "handler returned nothing but content is declared")
            }
            (output, _) => {
                let kind = match output {
                    HandlerOutput::Empty => "empty",
                    HandlerOutput::Json(_) => "json",
                    HandlerOutput::Text(_) => "text",
                    HandlerOutput::File(_) => "file",
                };
                warn!(%request_id, output = kind, "No declared response matches handler output");
                self.response_mismatch(operation, request_id, "handler output does not match the declared response")
            }
        }
    }

    fn response_mismatch(&self, operation: &Operation, request_id: RequestId, why: &str) -> ApiResponse {
        error!(%request_id, operation = %operation.display_name(), "{why}");
        self.writer.internal_error()
    }

    fn hook_failure(&self, request_id: RequestId, hook: &str, err: &ApiError) -> ApiResponse {
        let response = self.writer.api_error(err);
        if response.status >= 500 {
            error!(%request_id, hook, kind = %err.kind(), detail = %err.diagnostic(), "Hook failed");
        } else {
            debug!(%request_id, hook, kind = %err.kind(), "{}", err.message());
        }
        response
    }
}

impl PreparedDispatcher {
    /// Replace the default body parser.
    #[must_use]
    pub fn with_body_parser(mut self, parser: impl BodyParser + 'static) -> Self {
        self.body_parser = Arc::new(parser);
        self
    }

    #[must_use]
    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// Resolve every route's handler and load the hooks.
    ///
    /// Fails if a route names a handler the registry doesn't have, or if the
    /// hook loader fails.
    pub async fn bind(
        self,
        registry: &HandlerRegistry,
        hook_loader: &dyn HookLoader,
    ) -> anyhow::Result<Dispatcher> {
        let mut handlers = HashMap::new();
        let mut issues = Vec::new();
        for (path, method, target) in self.routes.iter() {
            match registry.resolve(target) {
                Some(f) => {
                    handlers.insert((target.module.clone(), target.function.clone()), f);
                }
                None => issues.push(ValidationIssue::new(
                    format!("{} {path}", method.to_ascii_uppercase()),
                    "MissingHandler",
                    format!("no handler registered for {}::{}", target.module, target.function),
                )),
            }
        }
        fail_if_issues(&issues)?;

        let hooks = hook_loader.load().await?;
        info!(
            handlers = handlers.len(),
            authenticate = hooks.authenticate.is_some(),
            authorize = hooks.authorize.is_some(),
            "Dispatcher bound"
        );

        let resolver = PathResolver::new(self.operations.templates());
        Ok(Dispatcher {
            resolver,
            writer: ResponseWriter::new(&self.config),
            context_path: self.config.normalized_context_path().to_string(),
            operations: self.operations,
            routes: self.routes,
            schemas: self.schemas,
            token_paths: self.token_paths,
            body_parser: self.body_parser,
            hooks,
            handlers,
        })
    }
}

impl std::fmt::Debug for PreparedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedDispatcher")
            .field("operations", &self.operations.len())
            .field("routes", &self.routes.len())
            .field("token_paths", &self.token_paths)
            .finish()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.operations.len())
            .field("handlers", &self.handlers.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn media_for<'a>(content: &'a IndexMap<String, MediaTypeSpec>, content_type: &str) -> Option<&'a MediaTypeSpec> {
    let wanted = normalize_content_type(content_type);
    content.get(&wanted)
}

/// Route entries no operation can reach, and operations no route serves.
fn check_routes(operations: &Operations, routes: &RouteTable) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (path, method, _) in routes.iter() {
        let reachable = operations.iter().any(|op| {
            op.method == method
                && (op.path == path
                    || op.path.strip_prefix(path).is_some_and(|rest| rest.starts_with('/')))
        });
        if !reachable {
            issues.push(ValidationIssue::warning(
                format!("{} {path}", method.to_ascii_uppercase()),
                "UnreachableRoute",
                "no operation in the interface document is served by this route",
            ));
        }
    }
    for op in operations.iter() {
        if routes.target(&op.path, true, &op.method).is_none()
            && routes.target(&op.path, false, &op.method).is_none()
        {
            issues.push(ValidationIssue::warning(
                format!("{} {}", op.method.to_ascii_uppercase(), op.path),
                "MissingRoute",
                "operation has no route entry and will answer 404",
            ));
        }
    }
    issues
}
