//! JSON HTTP API over the engine.

mod handlers;

use crate::config::HttpServerConfig;
use crate::error::{RagchatError, Result};
use crate::rag::RagEngine;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
}

/// Error body in the `{"detail": ...}` shape clients already parse
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<RagchatError> for ApiError {
    fn from(e: RagchatError) -> Self {
        let status = match &e {
            RagchatError::InvalidFilter { .. } | RagchatError::InvalidInput(_) | RagchatError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            RagchatError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", e);
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(engine: Arc<RagEngine>, config: &HttpServerConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/upload", post(handlers::upload))
        .route("/files", get(handlers::list_files))
        .route("/files/:filename", delete(handlers::delete_file))
        .route("/search", post(handlers::search))
        .route("/rag/status", get(handlers::rag_status))
        .route("/rag/filters", get(handlers::rag_filters))
        .route("/rag/reinitialize", post(handlers::reinitialize))
        .route("/initialize-rag", post(handlers::initialize_legacy))
        .route("/system/status", get(handlers::system_status))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(AppState { engine })
}

/// Run one incremental reindex, then serve until the process stops
pub async fn serve(engine: Arc<RagEngine>, config: &HttpServerConfig) -> Result<()> {
    log::info!("Initializing RAG index before serving");
    match engine.reindex(true, None).await {
        Ok(report) => log::info!(
            "Startup reindex {}: {} processed, {} skipped, {} failed",
            report.status,
            report.files_processed,
            report.skipped,
            report.failed.len()
        ),
        Err(e) => log::error!("Startup reindex failed, continuing in simple mode: {}", e),
    }

    let app = router(engine, config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RagchatError::Io(std::io::Error::new(e.kind(), format!("Failed to bind to {}: {}", addr, e))))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| RagchatError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;
    Ok(())
}

/// Reindex in the background; the request that triggered it returns at once
pub(crate) fn spawn_reindex(engine: Arc<RagEngine>, incremental: bool) {
    tokio::spawn(async move {
        match engine.reindex(incremental, None).await {
            Ok(report) => log::info!(
                "Background reindex {}: {} processed, {} chunks, {} removed",
                report.status,
                report.files_processed,
                report.chunks_indexed,
                report.removed.len()
            ),
            Err(e) => log::error!("Background reindex failed: {}", e),
        }
    });
}
