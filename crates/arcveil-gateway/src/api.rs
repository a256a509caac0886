//! HTTP API: one endpoint per pipeline stage plus the combined secure
//! query, behind bearer-token auth and an access-log middleware

use crate::access_log::{AccessEntry, AccessLog};
use crate::auth::{constant_time_eq, AuthRateLimiter, TokenStore};
use crate::config::GatewayConfig;
use arcveil_core::{
    add_noise, apply_filters, partition_key, query_archives, redact_names, run_pipeline,
    ArchiveStore, FilterSpec, NoiseTarget, PipelineRequest, PrivacySpec, QueryRequest, Record,
    RedactionSpec, StageError,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Identity attached to a request after token validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Username the presented token resolves to
    pub username: String,
    /// The presented token itself (needed by logout)
    pub token: String,
}

/// Shared state behind every handler.
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
    /// Archive store read by the query stage
    pub store: Arc<dyn ArchiveStore>,
    /// Issued bearer tokens
    pub tokens: TokenStore,
    /// Bounded request log
    pub access_log: AccessLog,
    /// Per-IP login failure lockout
    pub rate_limiter: AuthRateLimiter,
}

/// The gateway API surface.
#[derive(Clone)]
pub struct GatewayApi {
    state: Arc<AppState>,
}

impl GatewayApi {
    /// Build the API over a config and archive store.
    pub fn new(config: Arc<GatewayConfig>, store: Arc<dyn ArchiveStore>) -> Self {
        let access_log = AccessLog::new(config.access_log_capacity);
        Self {
            state: Arc::new(AppState {
                config,
                store,
                tokens: TokenStore::new(),
                access_log,
                rate_limiter: AuthRateLimiter::new(),
            }),
        }
    }

    /// Shared state, for embedding and tests.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Assemble the router: public health/login routes, protected stage
    /// routes, access-log middleware over everything.
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/auth/logout", post(logout_handler))
            .route("/api/archive", post(archive_handler))
            .route("/api/query", post(query_handler))
            .route("/api/filter", post(filter_handler))
            .route("/api/redact", post(redact_handler))
            .route("/api/privacy", post(privacy_handler))
            .route("/api/secure-query", post(secure_query_handler))
            .route("/api/access-log", get(access_log_handler))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ));

        let public = Router::new()
            .route("/health", get(health_handler))
            .route("/api/privacy-services/health", get(privacy_health_handler))
            .route("/auth/login", post(login_handler));

        Router::new()
            .merge(protected)
            .merge(public)
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                access_log_middleware,
            ))
            .with_state(self.state.clone())
    }

    /// Bind and serve until shutdown.
    pub async fn serve(&self) -> anyhow::Result<()> {
        let addr = self.state.config.bind_addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Arcveil gateway listening on {}", addr);
        axum::serve(listener, self.router().into_make_service()).await?;
        Ok(())
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    // last whitespace-separated part, tolerating a bare token
    value.rsplit(' ').next()
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, Response> {
    serde_json::from_str(body)
        .map_err(|_| error_body(StatusCode::BAD_REQUEST, "Invalid JSON data"))
}

/// Map a stage result onto the wire: 200 + payload, or the stage's own
/// status with `{"error": message}`.
fn stage_response<T: Serialize>(result: Result<T, StageError>) -> Response {
    match result {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_body(status, &err.to_string())
        }
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn privacy_health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "services": {
            "query": "available",
            "filter": "available",
            "redact": "available",
            "privacy": "available"
        }
    }))
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let ip = client_ip(&headers);
    state.rate_limiter.prune();
    if state.rate_limiter.is_rate_limited(&ip) {
        return error_body(StatusCode::TOO_MANY_REQUESTS, "Too many login attempts");
    }
    let login: LoginBody = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let authenticated = state.config.users.iter().any(|user| {
        user.username == login.username && constant_time_eq(&user.password, &login.password)
    });
    if !authenticated {
        state.rate_limiter.record_failure(&ip);
        tracing::warn!(username = %login.username, %ip, "login rejected");
        return error_body(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    let token = state
        .tokens
        .issue(&login.username, state.config.token_ttl_secs);
    tracing::info!(username = %login.username, "login successful");
    (
        StatusCode::OK,
        Json(json!({"token": token, "message": "Login successful"})),
    )
        .into_response()
}

async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Response {
    state.tokens.revoke(&user.token);
    (
        StatusCode::OK,
        Json(json!({"message": "Logged out"})),
    )
        .into_response()
}

async fn archive_handler(State(state): State<Arc<AppState>>, body: String) -> Response {
    let record: Record = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ts = record
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or_else(|| Utc::now().timestamp());
    let key = match partition_key(ts) {
        Ok(key) => key,
        Err(err) => return stage_response::<Value>(Err(err)),
    };
    let serialized = match serde_json::to_string(&record) {
        Ok(s) => s,
        Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    state.store.append(&key, serialized);
    (
        StatusCode::OK,
        Json(json!({"archived": true, "partition": key})),
    )
        .into_response()
}

async fn query_handler(State(state): State<Arc<AppState>>, body: String) -> Response {
    let req: QueryRequest = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    stage_response(query_archives(state.store.as_ref(), &req))
}

#[derive(Deserialize)]
struct FilterBody {
    #[serde(default)]
    results: Vec<Record>,
    #[serde(default)]
    filters: FilterSpec,
}

async fn filter_handler(body: String) -> Response {
    let req: FilterBody = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    stage_response(apply_filters(&req.results, &req.filters))
}

#[derive(Deserialize)]
struct RedactBody {
    #[serde(default)]
    results: Vec<Record>,
    #[serde(flatten)]
    spec: RedactionSpec,
}

async fn redact_handler(body: String) -> Response {
    let req: RedactBody = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    stage_response(redact_names(&req.results, &req.spec))
}

#[derive(Deserialize)]
struct PrivacyBody {
    #[serde(default)]
    results: NoiseTarget,
    #[serde(flatten)]
    spec: PrivacySpec,
}

async fn privacy_handler(body: String) -> Response {
    let req: PrivacyBody = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut rng = rand::thread_rng();
    stage_response(add_noise(req.results, &req.spec, &mut rng))
}

async fn secure_query_handler(State(state): State<Arc<AppState>>, body: String) -> Response {
    let req: PipelineRequest = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut rng = rand::thread_rng();
    stage_response(run_pipeline(state.store.as_ref(), &mut rng, &req).map(|(res, _stats)| res))
}

async fn access_log_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"entries": state.access_log.recent(100)}))
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return error_body(StatusCode::UNAUTHORIZED, "Token is missing");
    };
    match state.tokens.validate(token) {
        Some(username) => {
            let token = token.to_string();
            request
                .extensions_mut()
                .insert(AuthenticatedUser { username, token });
            next.run(request).await
        }
        None => error_body(StatusCode::UNAUTHORIZED, "Token is invalid or expired"),
    }
}

async fn access_log_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let ip = client_ip(request.headers());
    let username =
        bearer_token(request.headers()).and_then(|token| state.tokens.validate(token));

    let response = next.run(request).await;
    state.access_log.record(AccessEntry {
        timestamp: Utc::now().timestamp(),
        method,
        path,
        ip,
        status: response.status().as_u16(),
        username,
    });
    response
}
