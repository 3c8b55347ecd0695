// Path: crates/http-issuer-gateway/src/lib.rs
#![forbid(unsafe_code)]

//! HTTP surface of the Attestor issuer service.
//!
//! Routes are scoped by issuer instance id; the gateway resolves the
//! instance, translates the service error taxonomy onto HTTP statuses, and
//! leaves authorization to fronting collaborators. The tower stack (load
//! shedding, concurrency limit, timeout, panic catching, body limit) and
//! the per-IP token-bucket limiter are applied by [`run_server`]; the bare
//! [`router`] is what integration tests drive.

use anyhow::Result;
use attestor_issuer::Issuer;
use attestor_types::error::{ErrorCode, IssuerError};
use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{ConnectInfo, Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use ipnetwork::IpNetwork;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec,
};
use serde::Deserialize;
use serde_json::Value;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tower::{
    limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer, BoxError,
    ServiceBuilder,
};
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

// --- Error Handling ---

/// The HTTP-facing error wrapper. The wire body carries the taxonomy name
/// in `data.type` so clients can switch on it without parsing messages.
pub struct AppError(IssuerError);

impl From<IssuerError> for AppError {
    fn from(e: IssuerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IssuerError::Validation { .. } | IssuerError::Data(_) => StatusCode::BAD_REQUEST,
            IssuerError::NotAllowed(_) => StatusCode::FORBIDDEN,
            IssuerError::NotFound(_) => StatusCode::NOT_FOUND,
            IssuerError::Duplicate(_) | IssuerError::InvalidState(_) => StatusCode::CONFLICT,
            IssuerError::QuotaExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
            IssuerError::Internal(_) => {
                tracing::error!(target: "http-gateway", "internal error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut data = serde_json::json!({ "type": self.0.code() });
        if let IssuerError::Validation { details, .. } = &self.0 {
            if !details.is_empty() {
                data["details"] = serde_json::json!(details);
            }
        }
        let message = match &self.0 {
            // Do not leak internals to callers.
            IssuerError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (
            status,
            Json(serde_json::json!({ "message": message, "data": data })),
        )
            .into_response()
    }
}

// --- Metrics (local to gateway) ---
static GATEWAY_REQ_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static GATEWAY_REQ_LATENCY: OnceCell<HistogramVec> = OnceCell::new();

fn install_gateway_metrics() {
    let _ = GATEWAY_REQ_TOTAL.set(
        register_int_counter_vec!(
            "attestor_gateway_requests_total",
            "Total HTTP issuer-gateway requests",
            &["route", "result"]
        )
        .expect("register_int_counter_vec"),
    );
    let _ = GATEWAY_REQ_LATENCY.set(
        register_histogram_vec!(
            "attestor_gateway_request_duration_seconds",
            "Latency of HTTP issuer-gateway requests (seconds)",
            &["route", "result"],
            exponential_buckets(0.001, 2.0, 15).expect("buckets")
        )
        .expect("register_histogram_vec"),
    );
}

fn observe(route: &'static str, result: &'static str, started: Instant) {
    if let Some(counter) = GATEWAY_REQ_TOTAL.get() {
        counter.with_label_values(&[route, result]).inc();
    }
    if let Some(histogram) = GATEWAY_REQ_LATENCY.get() {
        histogram
            .with_label_values(&[route, result])
            .observe(started.elapsed().as_secs_f64());
    }
}

// --- Rate limiting ---

const RATE_WINDOW: Duration = Duration::from_secs(1);
/// Client entries idle this long are dropped during pruning.
const RATE_IDLE_EVICT: Duration = Duration::from_secs(120);
/// Map size past which a pruning pass runs.
const RATE_PRUNE_THRESHOLD: usize = 16 * 1024;

/// Fixed-window admission gate, one window per client address.
///
/// A client's first window may spend up to `burst` requests; every later
/// window is capped at `per_second`. Windows reset a second after they
/// open, so a client that pauses pays no catch-up arithmetic and an
/// abusive one is cut off within the current second. The map is pruned
/// of idle entries once it grows past a threshold.
#[derive(Clone)]
struct RateGate {
    clients: Arc<DashMap<IpAddr, RateWindow>>,
    per_second: u32,
    burst: u32,
    proxy_nets: Arc<Vec<IpNetwork>>,
}

struct RateWindow {
    opened: Instant,
    spent: u32,
    first: bool,
}

impl RateGate {
    fn new(per_second: u32, burst: u32, proxy_nets: Arc<Vec<IpNetwork>>) -> Self {
        let per_second = per_second.max(1);
        Self {
            clients: Arc::new(DashMap::new()),
            per_second,
            burst: burst.max(per_second),
            proxy_nets,
        }
    }

    fn is_own_proxy(&self, ip: IpAddr) -> bool {
        self.proxy_nets.iter().any(|net| net.contains(ip))
    }

    /// The address to account against. `x-forwarded-for` is only honoured
    /// when the peer is one of our proxies, and the client is the
    /// rightmost hop that is not itself a trusted proxy — everything left
    /// of that is client-controlled and must not buy a fresh window.
    fn client_addr<B>(&self, req: &Request<B>) -> IpAddr {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|c| c.0.ip())
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));
        if !self.is_own_proxy(peer) {
            return peer;
        }
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");
        for hop in forwarded.rsplit(',') {
            match hop.trim().parse::<IpAddr>() {
                Ok(ip) if self.is_own_proxy(ip) => continue,
                Ok(ip) => return ip,
                Err(_) => break,
            }
        }
        peer
    }

    fn admit<B>(&self, req: &Request<B>) -> bool {
        let ip = self.client_addr(req);
        let now = Instant::now();
        let allowed = {
            let mut window = self.clients.entry(ip).or_insert_with(|| RateWindow {
                opened: now,
                spent: 0,
                first: true,
            });
            if now.duration_since(window.opened) >= RATE_WINDOW {
                window.opened = now;
                window.spent = 0;
                window.first = false;
            }
            let cap = if window.first {
                self.burst
            } else {
                self.per_second
            };
            if window.spent < cap {
                window.spent += 1;
                true
            } else {
                false
            }
        };
        if self.clients.len() > RATE_PRUNE_THRESHOLD {
            self.clients
                .retain(|_, w| now.duration_since(w.opened) < RATE_IDLE_EVICT);
        }
        allowed
    }
}

async fn throttle_middleware(
    State(gate): State<RateGate>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if gate.admit(&req) {
        next.run(req).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "message": "request rate exceeded",
                "data": { "type": "RateLimitError" }
            })),
        )
            .into_response()
    }
}

// Small helper used by HandleErrorLayer to produce structured responses.
async fn map_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(serde_json::json!({
                "message": "request timed out",
                "data": { "type": "TimeoutError" }
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "message": err.to_string(),
                "data": { "type": "OverloadedError" }
            })),
        )
    }
}

// --- Request/Response Types ---
#[derive(Deserialize)]
struct IssueRequest {
    credential: Value,
    #[serde(default)]
    options: Option<attestor_types::credential::RequestOptions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    credential_id: String,
    index_allocator: String,
    credential_status: Value,
    status: bool,
}

#[derive(Deserialize)]
struct ContextRequest {
    id: String,
    context: Value,
}

#[derive(Deserialize)]
struct SlcQuery {
    #[serde(default)]
    refresh: Option<bool>,
}

// --- Handlers ---
async fn issue_handler(
    State(issuer): State<Arc<Issuer>>,
    Path(config_id): Path<String>,
    Json(payload): Json<IssueRequest>,
) -> Result<Json<Value>, AppError> {
    let started = Instant::now();
    let result = issuer
        .issue(
            &config_id,
            payload.credential,
            payload.options.unwrap_or_default(),
        )
        .await;
    match result {
        Ok(credential) => {
            observe("/credentials/issue", "ok", started);
            Ok(Json(serde_json::json!({ "verifiableCredential": credential })))
        }
        Err(e) => {
            observe("/credentials/issue", "error", started);
            Err(e.into())
        }
    }
}

async fn status_handler(
    State(issuer): State<Arc<Issuer>>,
    Path(config_id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Value>, AppError> {
    let started = Instant::now();
    let result = issuer
        .update_status(
            &config_id,
            &payload.credential_id,
            &payload.index_allocator,
            &payload.credential_status,
            payload.status,
        )
        .await;
    match result {
        Ok(()) => {
            observe("/credentials/status", "ok", started);
            Ok(Json(serde_json::json!({})))
        }
        Err(e) => {
            observe("/credentials/status", "error", started);
            Err(e.into())
        }
    }
}

async fn get_credential_handler(
    State(issuer): State<Arc<Issuer>>,
    Path((config_id, credential_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let credential = issuer.get_credential(&config_id, &credential_id).await?;
    Ok(Json(
        serde_json::json!({ "verifiableCredential": credential }),
    ))
}

async fn slc_handler(
    State(issuer): State<Arc<Issuer>>,
    Path((config_id, list_id)): Path<(String, String)>,
    Query(query): Query<SlcQuery>,
) -> Result<Json<Value>, AppError> {
    let started = Instant::now();
    let refresh = query.refresh.unwrap_or(false);
    match issuer
        .status_list_credential(&config_id, &list_id, refresh)
        .await
    {
        Ok(document) => {
            observe("/status-lists", "ok", started);
            Ok(Json(document))
        }
        Err(e) => {
            observe("/status-lists", "error", started);
            Err(e.into())
        }
    }
}

async fn contexts_handler(
    State(issuer): State<Arc<Issuer>>,
    Path(config_id): Path<String>,
    Json(payload): Json<ContextRequest>,
) -> Result<Json<Value>, AppError> {
    issuer
        .instances()
        .add_context(&config_id, &payload.id, &payload.context)
        .await?;
    Ok(Json(serde_json::json!({})))
}

async fn metrics_handler() -> ([(axum::http::HeaderName, String); 1], axum::body::Bytes) {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::with_capacity(1 << 16);
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
    }
    (
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buf.into(),
    )
}

async fn healthz_handler() -> &'static str {
    "ok"
}

/// The bare route table over an issuer. Layers are applied by
/// [`run_server`]; tests drive this directly.
pub fn router(issuer: Arc<Issuer>) -> Router {
    Router::new()
        .route("/:config_id/credentials/issue", post(issue_handler))
        .route("/:config_id/credentials/status", post(status_handler))
        .route(
            "/:config_id/credentials/:credential_id",
            get(get_credential_handler),
        )
        .route(
            "/:config_id/status-lists/:list_id",
            get(slc_handler).post(slc_handler),
        )
        .route("/:config_id/contexts", post(contexts_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(issuer)
}

// --- Server ---

/// Listener and hardening options for the public gateway.
pub struct GatewayConfig {
    /// The socket address to bind, e.g. `0.0.0.0:8080`.
    pub listen_addr: String,
    /// Requests allowed per client IP per one-second window.
    pub rps: u32,
    /// Allowance for a client's first window (clamped to at least `rps`).
    pub burst: u32,
    /// Request body limit in KiB.
    pub body_limit_kb: usize,
    /// CIDRs whose `x-forwarded-for` is trusted for client identification.
    pub trusted_proxies: Vec<String>,
    /// Whole-request timeout; must cover signing plus storage.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".into(),
            rps: 50,
            burst: 200,
            body_limit_kb: 1024,
            trusted_proxies: vec![],
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Serves the gateway until the shutdown signal flips.
pub async fn run_server(
    config: GatewayConfig,
    issuer: Arc<Issuer>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    install_gateway_metrics();

    let cidrs = Arc::new(
        config
            .trusted_proxies
            .iter()
            .filter_map(|s| IpNetwork::from_str(s).ok())
            .collect(),
    );
    let gate = RateGate::new(config.rps, config.burst, cidrs);

    let app = router(issuer)
        .route_layer(middleware::from_fn_with_state(gate, throttle_middleware))
        // `HandleErrorLayer` must wrap the fallible layers to make the
        // service infallible.
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(map_middleware_error))
                .layer(LoadShedLayer::new())
                .layer(ConcurrencyLimitLayer::new(128))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_kb * 1024));

    let addr: SocketAddr = config.listen_addr.parse()?;
    tracing::info!(target: "http-gateway", "issuer gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_rx.changed().await.ok();
        tracing::info!(target: "http-gateway", "shutting down gracefully");
    });

    if let Err(e) = server.await {
        tracing::error!(target: "http-gateway", error = %e, "server error");
    }

    Ok(())
}
