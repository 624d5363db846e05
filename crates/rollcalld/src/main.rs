use anyhow::{Context, Result};
use rollcall_core::{OnnxEmbedder, ARCFACE_MIN_THRESHOLD};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod http;
mod models;
mod service;
mod store;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rollcalld starting");

    let config = config::Config::load().context("failed to load configuration")?;
    tracing::info!(
        bind = %config.bind,
        db = %config.db_path.display(),
        models = %config.model_dir.display(),
        threshold = config.match_threshold,
        policy = %config.face_policy,
        "configuration loaded"
    );

    let store = store::SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let embedder = OnnxEmbedder::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
    if config.threshold_below_arcface_range() {
        tracing::warn!(
            threshold = config.match_threshold,
            recommended = ARCFACE_MIN_THRESHOLD,
            "match threshold is below the ArcFace range (1.0 to 1.1); most genuine matches will be rejected"
        );
    }
    let engine = engine::spawn_engine(Box::new(embedder), config.face_policy)?;

    let service = service::RegistryService::new(store, engine, config.match_threshold);
    let app = http::app(service, &config);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "rollcalld ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
