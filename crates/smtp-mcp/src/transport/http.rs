//! HTTP Transport
//!
//! MCP "HTTP with SSE" transport plus two REST helpers.
//!
//! Routes:
//! - `GET  /sse`           event stream; first event names the message endpoint
//! - `POST <message path>` JSON-RPC (`/message` streamable, `/` root)
//! - `GET  /`              service descriptor
//! - `POST /api/test-email` manual send, answers with a result envelope
//! - `GET|POST /api/health` fixed status document

use super::{shutdown_signal, McpHandler, Transport};
use crate::envelope::ResultEnvelope;
use crate::tool_registry::{Arguments, DispatchError};
use crate::tools::SEND_EMAIL_TOOL;
use crate::{JsonRpcError, McpRequest, McpResponse};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
        },
        HeaderName, StatusCode,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SSE_KEEPALIVE: Duration = Duration::from_secs(15);
const SESSION_BUFFER: usize = 32;
const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: to, subject, body";

/// Where JSON-RPC requests are posted. Fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathMode {
    /// `POST /`
    #[default]
    Root,
    /// `POST /message`
    Streamable,
}

impl PathMode {
    pub fn message_path(self) -> &'static str {
        match self {
            PathMode::Root => "/",
            PathMode::Streamable => "/message",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PathMode::Root => "root",
            PathMode::Streamable => "streamable",
        }
    }
}

/// Open SSE sessions, keyed by the id handed out in the `endpoint` event
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<RwLock<HashMap<String, mpsc::Sender<String>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. It lives until the returned guard is dropped.
    pub fn open(&self) -> (SessionGuard, mpsc::Receiver<String>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), tx);

        let guard = SessionGuard {
            id,
            sessions: self.clone(),
        };
        (guard, rx)
    }

    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<String>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }
}

/// Removes its session from the table when the SSE stream is dropped
pub struct SessionGuard {
    id: String,
    sessions: SessionTable,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        info!(session = %self.id, "SSE client disconnected");
    }
}

/// Shared state for HTTP handlers
struct HttpState<H> {
    handler: Arc<H>,
    sessions: SessionTable,
    mode: PathMode,
    shutdown: watch::Receiver<bool>,
}

/// HTTP+SSE bidirectional transport
pub struct HttpSseTransport {
    bind_addr: String,
    mode: PathMode,
    max_in_flight: usize,
}

impl HttpSseTransport {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            mode: PathMode::default(),
            max_in_flight: crate::config::DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn with_mode(mut self, mode: PathMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

#[async_trait::async_trait]
impl Transport for HttpSseTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!(addr = %self.bind_addr, mode = self.mode.as_str(), "Starting HTTP+SSE transport");

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_addr))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = router(handler, self.mode, self.max_in_flight, shutdown_rx);

        info!(addr = %self.bind_addr, "HTTP+SSE transport listening");
        info!("  SSE:        GET  /sse");
        info!("  Messages:   POST {}", self.mode.message_path());
        info!("  Test email: POST /api/test-email");
        info!("  Health:     GET  /api/health");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                // Close open SSE streams
                let _ = shutdown_tx.send(true);
            })
            .await
            .context("HTTP server error")?;

        info!("HTTP+SSE transport stopped");
        Ok(())
    }
}

/// Build the full application router.
///
/// SSE streams end when `shutdown` flips to `true` or its sender is dropped.
pub fn router<H: McpHandler + 'static>(
    handler: Arc<H>,
    mode: PathMode,
    max_in_flight: usize,
    shutdown: watch::Receiver<bool>,
) -> Router {
    let state = Arc::new(HttpState {
        handler,
        sessions: SessionTable::new(),
        mode,
        shutdown,
    });

    let protocol: Router<Arc<HttpState<H>>> = match mode {
        PathMode::Root => {
            Router::new().route("/", get(root_handler::<H>).post(message_handler::<H>))
        }
        PathMode::Streamable => Router::new()
            .route("/", get(root_handler::<H>))
            .route("/message", post(message_handler::<H>)),
    }
    .route("/sse", get(sse_handler::<H>))
    // Fully open CORS; revisit if the server is ever exposed beyond localhost
    .layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let api: Router<Arc<HttpState<H>>> = Router::new()
        .route(
            "/api/test-email",
            post(test_email_handler::<H>).options(preflight_handler),
        )
        .route("/api/health", get(health_handler).post(health_handler));

    protocol
        .merge(api)
        .with_state(state)
        // One semaphore shared by every route
        .layer(GlobalConcurrencyLimitLayer::new(max_in_flight.max(1)))
        .layer(TraceLayer::new_for_http())
}

// === Handlers ===

async fn root_handler<H: McpHandler + 'static>(
    State(state): State<Arc<HttpState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "service": crate::SERVER_NAME,
        "version": crate::SERVER_VERSION,
        "protocol": crate::PROTOCOL_VERSION,
        "mode": state.mode.as_str(),
        "endpoints": {
            "sse": "GET /sse",
            "message": format!("POST {}", state.mode.message_path()),
            "test_email": "POST /api/test-email",
            "health": "GET /api/health"
        }
    }))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn message_handler<H: McpHandler + 'static>(
    State(state): State<Arc<HttpState<H>>>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    let request = match McpRequest::parse(&body) {
        Ok(request) => request,
        Err(response) => {
            warn!(body = %body, "Rejected malformed JSON-RPC body");
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    debug!(method = %request.method, session = ?query.session_id, "HTTP MCP request");
    let notification = request.is_notification();

    let Some(session_id) = query.session_id else {
        let response = state.handler.handle_request(request).await;
        if notification {
            return StatusCode::ACCEPTED.into_response();
        }
        return Json(response).into_response();
    };

    let Some(tx) = state.sessions.sender(&session_id) else {
        warn!(session = %session_id, "Message for unknown session");
        let response = McpResponse::error(request.id, JsonRpcError::unknown_session(&session_id));
        return (StatusCode::NOT_FOUND, Json(response)).into_response();
    };

    let response = state.handler.handle_request(request).await;
    if !notification {
        match serde_json::to_string(&response) {
            Ok(data) => {
                if tx.send(data).await.is_err() {
                    warn!(session = %session_id, "SSE stream closed before delivery");
                }
            }
            Err(e) => error!(session = %session_id, error = %e, "Failed to encode response"),
        }
    }
    StatusCode::ACCEPTED.into_response()
}

async fn sse_handler<H: McpHandler + 'static>(
    State(state): State<Arc<HttpState<H>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, mut rx) = state.sessions.open();
    let endpoint = format!("{}?sessionId={}", state.mode.message_path(), guard.id());
    let mut shutdown = state.shutdown.clone();

    info!(session = %guard.id(), "SSE client connected");

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<Event, Infallible>(Event::default().event("endpoint").data(endpoint));

        let closing = *shutdown.borrow();
        if closing {
            return;
        }

        loop {
            let next = tokio::select! {
                message = rx.recv() => message,
                _ = shutdown.changed() => None,
            };
            match next {
                Some(data) => yield Ok(Event::default().event("message").data(data)),
                None => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE))
}

fn test_email_cors() -> [(HeaderName, &'static str); 3] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    ]
}

fn envelope_response(status: StatusCode, envelope: &ResultEnvelope) -> Response {
    (
        status,
        test_email_cors(),
        [(CONTENT_TYPE, "application/json")],
        envelope.to_text(),
    )
        .into_response()
}

fn has_required_fields(arguments: &Arguments) -> bool {
    let text = |key: &str| arguments.get(key).and_then(Value::as_str);
    text("to").is_some_and(|to| !to.trim().is_empty())
        && text("subject").is_some()
        && text("body").is_some()
}

async fn test_email_handler<H: McpHandler + 'static>(
    State(state): State<Arc<HttpState<H>>>,
    body: Bytes,
) -> Response {
    let arguments = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(_) => {
            let envelope =
                ResultEnvelope::error("Request body must be a JSON object", "InvalidRequest");
            return envelope_response(StatusCode::BAD_REQUEST, &envelope);
        }
        Err(e) => {
            warn!(error = %e, "Unparseable test-email body");
            let envelope = ResultEnvelope::error(format!("Invalid JSON: {}", e), "InvalidRequest");
            return envelope_response(StatusCode::BAD_REQUEST, &envelope);
        }
    };

    if !has_required_fields(&arguments) {
        let envelope = ResultEnvelope::invalid_arguments(MISSING_FIELDS_MESSAGE);
        return envelope_response(StatusCode::BAD_REQUEST, &envelope);
    }

    match state.handler.call_tool(SEND_EMAIL_TOOL, arguments).await {
        Ok(envelope) => envelope_response(StatusCode::OK, &envelope),
        Err(err @ DispatchError::InvalidArguments(_)) => {
            envelope_response(StatusCode::BAD_REQUEST, &err.to_envelope())
        }
        Err(err @ DispatchError::UnknownTool(_)) => {
            error!(error = %err, "send-email tool is not registered");
            envelope_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_envelope())
        }
    }
}

async fn preflight_handler() -> impl IntoResponse {
    (StatusCode::OK, test_email_cors())
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    server: &'static str,
    version: &'static str,
}

// Method-agnostic on purpose; revisit if health ever needs to be read-only
async fn health_handler() -> impl IntoResponse {
    (
        [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(HealthStatus {
            status: "healthy",
            server: crate::HEALTH_SERVER_LABEL,
            version: crate::SERVER_VERSION,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{server_with, RecordingMailer};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use futures::StreamExt;
    use smtp_mailer::{EmailRequest, MailError, Mailer, SendReceipt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const HEALTH_BODY: &str =
        r#"{"status":"healthy","server":"SMTP MCP Server","version":"1.0.0"}"#;

    fn app(mailer: Arc<RecordingMailer>, mode: PathMode) -> (Router, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (router(server_with(mailer), mode, 16, rx), tx)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Read SSE frames until one contains `needle`
    async fn next_frame_with<S>(stream: &mut S, needle: &str) -> String
    where
        S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
    {
        let mut seen = String::new();
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(chunk) = stream.next().await {
                seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
                if seen.contains(needle) {
                    return;
                }
            }
        })
        .await
        .unwrap();
        seen
    }

    #[tokio::test]
    async fn test_health_get_and_post_identical() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        for method in ["GET", "POST", "GET"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/api/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(bytes, HEALTH_BODY.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_email_success() {
        let mailer = RecordingMailer::ok();
        let (app, _tx) = app(mailer.clone(), PathMode::Streamable);

        let response = app
            .oneshot(post_json(
                "/api/test-email",
                r#"{"to":"a@example.com","subject":"Hi","body":"Hello","cc":"c@example.com"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");

        let envelope = body_json(response).await;
        assert_eq!(envelope["status"], "success");
        assert_eq!(envelope["details"]["cc"], "c@example.com");
        assert_eq!(envelope["details"]["bcc"], "");
        assert_eq!(mailer.calls(), 1);
    }

    #[tokio::test]
    async fn test_email_missing_fields() {
        let mailer = RecordingMailer::ok();
        let (app, _tx) = app(mailer.clone(), PathMode::Streamable);

        for body in [r#"{"to":"a@example.com"}"#, r#"{"to":"","subject":"s","body":"b"}"#] {
            let response = app.clone().oneshot(post_json("/api/test-email", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

            let envelope = body_json(response).await;
            assert_eq!(envelope["status"], "error");
            assert_eq!(envelope["message"], "Missing required fields: to, subject, body");
            assert_eq!(envelope["errorType"], "InvalidArguments");
        }
        assert_eq!(mailer.calls(), 0);
    }

    #[tokio::test]
    async fn test_email_bad_json() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        for body in ["{not json", "[1, 2]"] {
            let response = app.clone().oneshot(post_json("/api/test-email", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["errorType"], "InvalidRequest");
        }
    }

    #[tokio::test]
    async fn test_email_send_failure_is_reported_in_envelope() {
        let mailer = RecordingMailer::failing(MailError::connection("connection refused"));
        let (app, _tx) = app(mailer, PathMode::Streamable);

        let response = app
            .oneshot(post_json(
                "/api/test-email",
                r#"{"to":"a@example.com","subject":"Hi","body":"Hello"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let envelope = body_json(response).await;
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["errorType"], "ConnectionFailed");
    }

    #[tokio::test]
    async fn test_email_preflight() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/test-email")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_direct_post_returns_response() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        let response = app
            .clone()
            .oneshot(post_json("/message", r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"][0]["name"], "send-email");

        let initialized = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let response = app.oneshot(post_json("/message", initialized)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_unparseable_message() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        let response = app.oneshot(post_json("/message", "{oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_message_without_method_is_invalid_request() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        let response = app
            .oneshot(post_json("/message", r#"{"jsonrpc":"2.0","id":11}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["id"], 11);
    }

    /// Sleeps inside every send and remembers the highest overlap seen
    struct SlowMailer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Mailer for SlowMailer {
        async fn send(&self, _request: &EmailRequest) -> Result<SendReceipt, MailError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SendReceipt::new("250", "OK"))
        }
    }

    #[tokio::test]
    async fn test_in_flight_limit_spans_routes() {
        let mailer = Arc::new(SlowMailer {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (_tx, rx) = watch::channel(false);
        let app = router(server_with(mailer.clone()), PathMode::Streamable, 1, rx);

        let arguments = r#"{"to":"a@example.com","subject":"Hi","body":"Hello"}"#;
        let call = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{{"name":"send-email","arguments":{}}}}}"#,
            arguments
        );

        let (manual, rpc) = tokio::join!(
            app.clone().oneshot(post_json("/api/test-email", arguments)),
            app.clone().oneshot(post_json("/message", &call)),
        );

        assert_eq!(manual.unwrap().status(), StatusCode::OK);
        let rpc = body_json(rpc.unwrap()).await;
        assert_eq!(rpc["result"]["isError"], false);
        assert_eq!(mailer.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Streamable);

        let response = app
            .oneshot(post_json(
                "/message?sessionId=nope",
                r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32001);
        assert_eq!(body["id"], 3);
    }

    #[tokio::test]
    async fn test_sse_session_round_trip() {
        let mailer = RecordingMailer::ok();
        let (app, _tx) = app(mailer.clone(), PathMode::Streamable);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut stream = response.into_body().into_data_stream();
        let first = next_frame_with(&mut stream, "sessionId=").await;
        assert!(first.contains("event: endpoint"));
        assert!(first.contains("data: /message?sessionId="));

        let session_id = first
            .split("sessionId=")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap()
            .trim()
            .to_string();
        assert_eq!(session_id.len(), 36);

        let call = r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"send-email","arguments":{"to":"a@example.com","subject":"Hi","body":"Hello"}}}"#;
        let response = app
            .oneshot(post_json(&format!("/message?sessionId={}", session_id), call))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = next_frame_with(&mut stream, "\"id\":7").await;
        assert!(pushed.contains("event: message"));
        assert_eq!(mailer.calls(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_ends_sse_stream() {
        let (app, tx) = app(RecordingMailer::ok(), PathMode::Root);

        let response = app
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut stream = response.into_body().into_data_stream();
        let first = next_frame_with(&mut stream, "sessionId=").await;
        assert!(first.contains("data: /?sessionId="));

        tx.send(true).unwrap();
        let rest = tokio::time::timeout(Duration::from_secs(5), async {
            while stream.next().await.is_some() {}
        })
        .await;
        assert!(rest.is_ok());
    }

    #[tokio::test]
    async fn test_root_mode_paths() {
        let (app, _tx) = app(RecordingMailer::ok(), PathMode::Root);

        let info = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let info = body_json(info).await;
        assert_eq!(info["mode"], "root");
        assert_eq!(info["endpoints"]["message"], "POST /");

        let response = app
            .clone()
            .oneshot(post_json("/", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let missing = app
            .oneshot(post_json("/message", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_session_guard_removes_session() {
        let sessions = SessionTable::new();
        let (guard, _rx) = sessions.open();
        assert!(sessions.sender(guard.id()).is_some());
        assert_eq!(sessions.len(), 1);

        drop(guard);
        assert!(sessions.is_empty());
    }
}
