mod rate_limit;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use ballot_agents::AssistantAgent;
use ballot_core::{AssistantConfig, ChatInput};
use ballot_llm::{EscalationStatus, Escalator, OpenAiSettings};
use ballot_observability::{AppMetrics, MetricsSnapshot};
use ballot_retrieval::{KnowledgeBase, KnowledgeStats};
use ballot_storage::Store;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use crate::rate_limit::{IpRateLimiter, RateDecision};

const MAX_TEXT_CHARS: usize = 4_000;
const DEFAULT_KB_SEARCH_LIMIT: usize = 5;
const MAX_KB_SEARCH_LIMIT: usize = 20;
const DEFAULT_API_KEY: &str = "dev-ballot-key";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5500";

/// Everything the HTTP surface needs at startup. [`ApiConfig::new`] uses
/// defaults only; [`ApiConfig::from_env`] layers the environment on top.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub kb_root: PathBuf,
    pub api_key: String,
    pub database_url: Option<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
    pub assistant: AssistantConfig,
    pub openai: OpenAiSettings,
}

impl ApiConfig {
    pub fn new(kb_root: impl Into<PathBuf>) -> Self {
        Self {
            kb_root: kb_root.into(),
            api_key: DEFAULT_API_KEY.to_string(),
            database_url: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            assistant: AssistantConfig::default(),
            openai: OpenAiSettings::default(),
        }
    }

    pub fn from_env(kb_root: impl Into<PathBuf>) -> Result<Self> {
        let defaults = Self::new(kb_root);

        Ok(Self {
            api_key: env::var("BALLOT_API_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.api_key),
            database_url: env::var("BALLOT_DATABASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            rate_limit_window: env::var("BALLOT_API_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("BALLOT_API_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            allowed_origins: parse_allowed_origins(env::var("BALLOT_ALLOWED_ORIGINS").ok())
                .unwrap_or(defaults.allowed_origins),
            assistant: AssistantConfig::from_env().context("invalid assistant configuration")?,
            openai: OpenAiSettings::from_env(),
            kb_root: defaults.kb_root,
        })
    }

    pub fn with_openai(mut self, openai: OpenAiSettings) -> Self {
        self.openai = openai;
        self
    }

    pub fn with_assistant(mut self, assistant: AssistantConfig) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn with_rate_limit(mut self, window: Duration, max_requests: usize) -> Self {
        self.rate_limit_window = window;
        self.rate_limit_max = max_requests;
        self
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<AssistantAgent<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub storage_backend: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    escalation: EscalationStatus,
    model: Option<String>,
    selection: &'static str,
    storage: &'static str,
    knowledge: KnowledgeStats,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatRequest {
    text: String,
    #[serde(default)]
    is_admin: bool,
    session_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassifyRequest {
    text: String,
    #[serde(default)]
    is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct KbSearchQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

pub async fn build_app(kb_root: impl Into<PathBuf>) -> Result<Router> {
    build_app_with(ApiConfig::from_env(kb_root)?).await
}

pub async fn build_app_with(config: ApiConfig) -> Result<Router> {
    let state = build_state(config).await?;
    Ok(build_router(state))
}

pub async fn build_state(config: ApiConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();

    let knowledge = Arc::new(
        KnowledgeBase::from_kb_dir_or_builtin(&config.kb_root).with_context(|| {
            format!(
                "failed loading knowledge base from {}",
                config.kb_root.display()
            )
        })?,
    );

    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };
    let storage_backend = store.backend_name();

    let escalator = Arc::new(Escalator::from_settings(&config.openai));

    let agent = Arc::new(AssistantAgent::new(
        knowledge,
        escalator,
        Arc::new(store),
        metrics.clone(),
        config.assistant,
    ));

    Ok(ApiState {
        agent,
        metrics,
        api_key: config.api_key,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins),
        storage_backend,
    })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/classify", post(classify))
        .route("/v1/intents", get(intents))
        .route("/v1/kb/search", get(kb_search))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

/// Periodically drops expired conversation sessions and idle limiter entries.
pub fn spawn_housekeeping(state: &ApiState, every: Duration) -> tokio::task::JoinHandle<()> {
    let agent = state.agent.clone();
    let limiter = state.limiter.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match agent.purge_expired_sessions().await {
                Ok(purged) if purged > 0 => info!(purged, "expired sessions removed"),
                Ok(_) => {}
                Err(error) => error!(error = %error, "session purge failed"),
            }
            limiter.prune();
        }
    })
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let agent = &state.agent;
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        escalation: agent.escalation_status(),
        model: agent.escalation_model().map(ToString::to_string),
        selection: agent.selector_name(),
        storage: state.storage_backend,
        knowledge: agent.knowledge().stats(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Response {
    if let Some(rejection) = validate_text(&request.text) {
        return rejection;
    }

    let input = ChatInput {
        session_id: request.session_id,
        text: request.text,
        is_admin: request.is_admin,
        user_id: request.user_id,
    };

    match state.agent.handle_chat(input).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => {
            error!(error = %err, "chat handling failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "chat_failed",
                "the assistant could not handle this message",
            )
        }
    }
}

async fn classify(
    State(state): State<ApiState>,
    Json(request): Json<ClassifyRequest>,
) -> Response {
    if let Some(rejection) = validate_text(&request.text) {
        return rejection;
    }

    let classification = state.agent.classify(&request.text, request.is_admin);
    (StatusCode::OK, Json(classification)).into_response()
}

async fn intents(State(state): State<ApiState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.agent.intents()))
}

async fn kb_search(State(state): State<ApiState>, Query(query): Query<KbSearchQuery>) -> Response {
    let q = query.q.trim();
    if q.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty_query", "q must not be empty");
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_KB_SEARCH_LIMIT)
        .clamp(1, MAX_KB_SEARCH_LIMIT);
    let hits = state.agent.kb_search(q, limit);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "query": q,
            "hits": hits,
        })),
    )
        .into_response()
}

fn validate_text(text: &str) -> Option<Response> {
    if text.trim().is_empty() {
        return Some(error_response(
            StatusCode::BAD_REQUEST,
            "empty_text",
            "text must not be empty",
        ));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Some(error_response(
            StatusCode::BAD_REQUEST,
            "text_too_long",
            "text exceeds 4000 characters",
        ));
    }
    None
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message,
        })),
    )
        .into_response()
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key",
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    match state.limiter.check(&ip) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "rate limit exceeded for this IP",
            );
            let seconds = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

fn parse_allowed_origins(raw: Option<String>) -> Option<Vec<String>> {
    let origins = raw?
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect::<Vec<_>>();

    (!origins.is_empty()).then_some(origins)
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
