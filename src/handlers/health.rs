use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppResult;
use crate::handlers::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let cleanup = state.cleanup.clone();
    let storage = tokio::task::spawn_blocking(move || cleanup.folder_stats()).await?;
    let limiter = state.limiter.metrics();

    let status = if storage.exists { "healthy" } else { "degraded" };
    let file_count = storage.file_count;

    let response = json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
        "retention_minutes": state.cleanup.max_age().as_secs() / 60,
        "rate_limiting": {
            "total_requests": limiter.total_requests,
            "rejected_requests": limiter.rejected_requests,
            "available_permits": limiter.available_permits,
        }
    });

    info!(
        status = status,
        file_count = file_count,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint
pub async fn ready_handler(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    if state.storage.root().is_dir() {
        info!("Readiness check passed");
        Ok(StatusCode::OK)
    } else {
        info!("Readiness check failed - storage area missing");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
