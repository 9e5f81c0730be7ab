use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, OriginalUri, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use repo_search_core::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use repo_search_core::{
    FixedWindowRateLimiter, QueryEngine, QueryError, RateDecision, RecordQueryParams,
    RecordStore, RemoteSearchClient, SearchOrchestrator, SearchPage, SearchParams, StoredRecord,
    TransportError, ValidationError,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rate_limit: DEFAULT_MAX_REQUESTS,
            rate_window: DEFAULT_WINDOW,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit == 0 {
            anyhow::bail!("rate limit must be greater than 0");
        }
        if self.rate_window.is_zero() {
            anyhow::bail!("rate-limit window must be greater than 0 seconds");
        }
        Ok(())
    }

    pub fn limiter(&self) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(self.rate_limit, self.rate_window)
    }
}

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<SearchOrchestrator<dyn RemoteSearchClient, dyn RecordStore>>,
    records: Arc<QueryEngine<dyn RecordStore>>,
    limiter: Arc<FixedWindowRateLimiter>,
}

impl AppState {
    pub fn new(
        client: Arc<dyn RemoteSearchClient>,
        store: Arc<dyn RecordStore>,
        limiter: FixedWindowRateLimiter,
    ) -> Self {
        Self {
            orchestrator: Arc::new(SearchOrchestrator::new(client, Arc::clone(&store))),
            records: Arc::new(QueryEngine::new(store)),
            limiter: Arc::new(limiter),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Routes added after `route_layer` are not throttled.
    let api = Router::new()
        .route("/search/repositories", get(search_repositories))
        .route("/repositories", get(list_repositories))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .route("/health", get(health));

    Router::new()
        .nest("/api/github", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        rate_limit = config.rate_limit,
        window_secs = config.rate_window.as_secs(),
        "repository search api listening"
    );

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(error = %error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

async fn health() -> &'static str {
    "OK"
}

async fn search_repositories(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchPage>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::rejected(&rejection, uri.path()))?;
    let request = params
        .validate()
        .map_err(|error| ApiError::validation(error, uri.path()))?;

    info!(
        query = %request.query,
        language = request.language.as_deref().unwrap_or(""),
        page = request.page,
        per_page = request.per_page,
        "searching repositories"
    );

    let dispatch = state
        .orchestrator
        .search(&request)
        .await
        .map_err(|error| ApiError::upstream(error, uri.path()))?;

    // Dropping the handle detaches ingestion; the response does not wait on it.
    Ok(Json(dispatch.page))
}

/// A stored repository as served over HTTP, with its derived page URL.
#[derive(Debug, Serialize)]
struct RepositoryView {
    #[serde(flatten)]
    record: StoredRecord,
    html_url: Option<String>,
}

impl From<StoredRecord> for RepositoryView {
    fn from(record: StoredRecord) -> Self {
        let html_url = record.html_url();
        Self { record, html_url }
    }
}

async fn list_repositories(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<RecordQueryParams>, QueryRejection>,
) -> Result<Json<Vec<RepositoryView>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::rejected(&rejection, uri.path()))?;
    let query = params
        .validate()
        .map_err(|error| ApiError::validation(error, uri.path()))?;

    let records = state
        .records
        .get_filtered_records(
            query.language.as_deref(),
            query.min_stars,
            query.sort_by.as_deref(),
        )
        .await
        .map_err(|error| ApiError::query(error, uri.path()))?;

    Ok(Json(records.into_iter().map(RepositoryView::from).collect()))
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_identity(&request);

    match state.limiter.check(&client) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(client = %client, path = %request.uri().path(), "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": "Too many requests" })),
            )
                .into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            response
        }
    }
}

/// Peer address when known, else the first `X-Forwarded-For` hop.
fn client_identity(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    message: String,
    error: &'static str,
    status: u16,
    timestamp: DateTime<Utc>,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_errors: Option<BTreeMap<&'static str, String>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    path: String,
    validation_errors: Option<BTreeMap<&'static str, String>>,
}

impl ApiError {
    fn validation(error: ValidationError, path: &str) -> Self {
        warn!(path, error = %error, "rejected invalid request");
        let mut fields = BTreeMap::new();
        for violation in error.violations {
            fields.entry(violation.field).or_insert(violation.message);
        }
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: "Validation failed".to_string(),
            path: path.to_string(),
            validation_errors: Some(fields),
        }
    }

    fn rejected(rejection: &QueryRejection, path: &str) -> Self {
        let message = rejection.body_text();
        warn!(path, error = %message, "rejected malformed query string");
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message,
            path: path.to_string(),
            validation_errors: None,
        }
    }

    fn upstream(error: TransportError, path: &str) -> Self {
        error!(path, error = %error, "remote search failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "UPSTREAM_ERROR",
            message: format!("Failed to search repositories: {error}"),
            path: path.to_string(),
            validation_errors: None,
        }
    }

    fn query(error: QueryError, path: &str) -> Self {
        match error {
            QueryError::InvalidSortKey(token) => {
                warn!(path, token = %token, "rejected unknown sort key");
                Self {
                    status: StatusCode::BAD_REQUEST,
                    code: "INVALID_SORT_KEY",
                    message: format!("Unknown sort key: {token}"),
                    path: path.to_string(),
                    validation_errors: None,
                }
            }
            QueryError::Storage(error) => {
                error!(path, error = %error, "stored repository query failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "STORAGE_ERROR",
                    message: "Failed to read stored repositories".to_string(),
                    path: path.to_string(),
                    validation_errors: None,
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            message: self.message,
            error: self.code,
            status: self.status.as_u16(),
            timestamp: Utc::now(),
            path: self.path,
            validation_errors: self.validation_errors,
        };
        (self.status, Json(body)).into_response()
    }
}
