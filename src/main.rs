use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use domain_resolver::{Config, DomainClient, NormalizedRecord, QueryScope, ResolveError};

// Metrics live in the binary only
mod metrics;

const SUCCESS_CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=86400";
const NOT_FOUND_CACHE_CONTROL: &str = "public, s-maxage=60";
const ERROR_CACHE_CONTROL: &str = "no-cache";

#[derive(Clone)]
pub struct AppState {
    client: DomainClient,
    config: Arc<Config>,
}

#[derive(Deserialize)]
struct LookupQuery {
    /// Domain or URL to look up (e.g. "example.com", "https://www.example.com/")
    domain: String,
    /// Skip the result cache if true
    #[serde(default)]
    fresh: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

/// A failed lookup rendered as `{ code, message, details? }`.
struct ApiError {
    error: ResolveError,
    include_details: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = self.error.to_body(self.include_details);

        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control_for(status)));
        response
    }
}

fn cache_control_for(status: StatusCode) -> &'static str {
    if status.is_success() {
        SUCCESS_CACHE_CONTROL
    } else if status == StatusCode::NOT_FOUND {
        NOT_FOUND_CACHE_CONTROL
    } else {
        ERROR_CACHE_CONTROL
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("domain_resolver=info,tower_http=debug")),
        )
        .init();

    let config = Arc::new(Config::load().context("Failed to load configuration")?);
    info!("Configuration loaded ({:?} environment)", config.environment);

    let client = DomainClient::with_config(config.clone()).context("Failed to initialize resolver")?;

    metrics::init_metrics();

    let app_state = AppState {
        client,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/whois", get(lookup_query).post(lookup_post))
        .route("/whois/:domain", get(lookup_path))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Domain resolver listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, gracefully shutting down...");
}

async fn lookup_query(
    State(state): State<AppState>,
    Query(params): Query<LookupQuery>,
) -> Result<Response, ApiError> {
    lookup(&state, &params.domain, params.fresh).await
}

async fn lookup_post(
    State(state): State<AppState>,
    Json(payload): Json<LookupQuery>,
) -> Result<Response, ApiError> {
    lookup(&state, &payload.domain, payload.fresh).await
}

async fn lookup_path(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    lookup(&state, &domain, false).await
}

async fn lookup(state: &AppState, domain: &str, fresh: bool) -> Result<Response, ApiError> {
    match state.client.lookup_with_scope(domain, fresh, &QueryScope::new()).await {
        Ok(record) => {
            track_success(&record);
            let mut response = Json(record).into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(SUCCESS_CACHE_CONTROL));
            Ok(response)
        }
        Err(error) => {
            metrics::increment_errors(error.code());
            Err(ApiError {
                error,
                include_details: !state.config.is_production(),
            })
        }
    }
}

fn track_success(record: &NormalizedRecord) {
    if record.cached {
        metrics::increment_cache_hits();
        return;
    }
    metrics::increment_cache_misses();
    metrics::increment_lookups(record.source, &record.domain);
    metrics::record_query_time(record.query_time_ms);
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
    })
}
