pub mod convert;
pub mod health;

pub use convert::*;
pub use health::*;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::AppResult;
use crate::middleware::{logging_middleware, rate_limit_middleware, RequestLimiter};
use crate::services::{CleanupService, DocumentConverter, Storage};

/// Shared by every handler. All members are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub converter: DocumentConverter,
    pub cleanup: Arc<CleanupService>,
    pub limiter: Arc<RequestLimiter>,
    pub max_file_size_mb: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let storage = Storage::new(&config.upload_folder)?;
        Ok(Self {
            converter: DocumentConverter::new(storage.clone()),
            cleanup: Arc::new(CleanupService::new(
                storage.root().to_path_buf(),
                config.file_retention(),
            )),
            limiter: Arc::new(RequestLimiter::new(config.max_concurrent_requests)),
            max_file_size_mb: config.max_file_size_mb,
            storage,
        })
    }
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let convert_routes = Router::new()
        .route("/upload/images-to-pdf", post(images_to_pdf_handler))
        .route("/upload/merge-pdfs", post(merge_pdfs_handler))
        .route("/upload/split-pdf", post(split_pdf_handler))
        .route("/pdf-info", post(pdf_info_handler))
        .route("/download/:filename", get(download_handler))
        .route("/stats", get(stats_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/convert", convert_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config))
                .layer(DefaultBodyLimit::max(config.max_body_bytes()))
                .layer(axum::middleware::from_fn(logging_middleware)),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
