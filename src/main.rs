use std::env;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docconvert::config::{Config, LogFormat};
use docconvert::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing(Config::log_format());

    let config = Config::from_env()?;

    tracing::info!("Starting docconvert service");
    tracing::info!("Max file size: {}MB", config.max_file_size_mb);
    tracing::info!("Upload folder: {}", config.upload_folder.display());
    tracing::info!(
        "File retention: {} minutes, cleanup every {} minutes",
        config.file_retention_minutes,
        config.cleanup_interval_minutes
    );

    let state = AppState::from_config(&config).context("Failed to prepare storage area")?;
    let cleanup = state.cleanup.clone().start(config.cleanup_interval());

    let app = create_router(state, &config);

    // PORT wins over SERVER_PORT for platform deployments
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.server_port);
    let addr = format!("{}:{}", config.server_host, port);

    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docconvert=debug,tower_http=debug,axum::rejection=trace".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
