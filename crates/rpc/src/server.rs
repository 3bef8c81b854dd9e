use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use drive_registry::{ContentRegistry, RegistryError};
use drive_types::{CallError, ErrorBody};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::registry::{handle_grant, handle_grantees, handle_list, handle_publish};
use crate::replay::ReplayGuard;

/// Signed calls are small; anything larger is not a registry request.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ContentRegistry>,
    pub start_time: Instant,
    pub node_id: String,
    /// Accepted distance between a call's timestamp and local time.
    pub max_clock_skew_ms: u64,
    pub metrics: Option<PrometheusHandle>,
    pub req_count: Arc<AtomicUsize>,
    pub(crate) replay: Arc<ReplayGuard>,
}

impl AppState {
    pub fn new(registry: Arc<ContentRegistry>, node_id: impl Into<String>) -> Self {
        Self {
            registry,
            start_time: Instant::now(),
            node_id: node_id.into(),
            max_clock_skew_ms: 300_000,
            metrics: None,
            req_count: Arc::new(AtomicUsize::new(0)),
            replay: Arc::new(ReplayGuard::new()),
        }
    }

    pub(crate) fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub(crate) type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    uptime_secs: u64,
    owners: u64,
    req_total: u64,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    node_id: String,
    version: &'static str,
    commit: &'static str,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    limit: Option<u64>,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, code: &'static str, message: S) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            limit: None,
        }
    }

    pub(crate) fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub(crate) fn replayed() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "replayed_request",
            "signed call has already been applied",
        )
    }

    pub(crate) fn unauthenticated() -> Self {
        let err = RegistryError::AuthenticationMissing;
        Self::new(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            RegistryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RegistryError::QuotaExceeded { .. } => StatusCode::CONFLICT,
            RegistryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RegistryError::Corrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RegistryError::AuthenticationMissing => StatusCode::UNAUTHORIZED,
        };
        let limit = match &err {
            RegistryError::QuotaExceeded { limit, .. } => Some(*limit),
            _ => None,
        };
        Self {
            limit,
            ..Self::new(status, err.code(), err.to_string())
        }
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Encoding(_) => Self::bad_request(err.to_string()),
            CallError::Stale { .. } => {
                Self::new(StatusCode::UNAUTHORIZED, "stale_request", err.to_string())
            }
            CallError::InvalidSignatureEncoding
            | CallError::InvalidPublicKey
            | CallError::SignatureMismatch => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_signature", err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(code = self.code, "request failed: {}", self.message);
        }
        let payload = Json(ErrorBody {
            code: self.code.to_string(),
            message: self.message,
            limit: self.limit,
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("Registry RPC listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .await
        .context("RPC server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {addr}"))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/metrics", get(handle_metrics))
        .route("/registry/publish", post(handle_publish))
        .route("/registry/grant", post(handle_grant))
        .route("/registry/list", post(handle_list))
        .route("/registry/grantees", post(handle_grantees))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    let req_total = state.record_request();
    let stats = state.registry.stats()?;
    Ok(Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        uptime_secs: state.uptime_seconds(),
        owners: stats.owners,
        req_total,
    }))
}

async fn handle_version(State(state): State<SharedState>) -> Json<VersionResponse> {
    state.record_request();
    Json(VersionResponse {
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_HASH").unwrap_or("unknown"),
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let req_total = state.record_request();
    let uptime = state.uptime_seconds();

    let mut metrics =
        "# HELP drive_http_requests_total Total number of RPC requests handled\n".to_string();
    metrics.push_str("# TYPE drive_http_requests_total counter\n");
    metrics.push_str(&format!("drive_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP drive_uptime_seconds Uptime of the node in seconds\n");
    metrics.push_str("# TYPE drive_uptime_seconds gauge\n");
    metrics.push_str(&format!("drive_uptime_seconds {uptime}\n"));

    if let Some(handle) = &state.metrics {
        metrics.push_str(&handle.render());
    }

    let mut response = metrics.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
