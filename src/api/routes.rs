//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{AgentFactory, RunnerRef};
use crate::cache::{CachedRunner, DiskCache};
use crate::config::Config;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Runs (or replays) the agent for a request
    pub runner: RunnerRef,
}

impl AppState {
    /// Wire the agent factory and, if enabled, the response cache.
    pub fn from_config(config: Config) -> Self {
        let factory: RunnerRef = Arc::new(AgentFactory::from_config(&config));

        let runner: RunnerRef = if config.cache.enabled {
            tracing::info!("Response cache enabled at {}", config.cache.dir.display());
            let cache = DiskCache::new(config.cache.dir.clone()).with_ttl(config.cache.ttl);
            Arc::new(CachedRunner::new(factory, Arc::new(cache)))
        } else {
            tracing::info!("Response cache disabled");
            factory
        };

        Self { config, runner }
    }
}

/// Error surfaced to HTTP callers as a bare 500.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Chat request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Build the router for the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::from_config(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_enabled: state.config.cache.enabled,
        max_iterations: state.config.max_iterations,
    })
}

/// Send a message to the agent and return its answer as a JSON string.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<String>, ApiError> {
    if req.message.is_empty() {
        return Ok(Json(String::new()));
    }

    let model = req
        .model
        .unwrap_or_else(|| state.config.default_model.clone());

    let answer = state.runner.run_agent(&req.message, &model).await?;
    Ok(Json(answer))
}
