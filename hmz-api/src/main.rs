//! hmz-api - metered humanize service
//!
//! Loads configuration, opens the usage database, connects the model
//! provider and serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hmz_api::llm::{CompletionProvider, OpenAiCompatClient};
use hmz_api::{build_router, AppState};
use hmz_common::config::{resolve_config_path, ServiceConfig};
use hmz_common::db::init_database;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for hmz-api
#[derive(Parser, Debug)]
#[command(name = "hmz-api")]
#[command(about = "Metered text humanize service with SSE streaming")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "HMZ_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides config and HMZ_BIND
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database path, overrides config and HMZ_DATABASE_PATH
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level applies
    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = ServiceConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup step
    info!(
        "Starting hmz-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let db_path = config.database.path.clone();
    info!("Database: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let llm: Option<Arc<dyn CompletionProvider>> = match OpenAiCompatClient::from_config(&config.llm)? {
        Some(client) => {
            info!(
                "✓ LLM provider {} (rewrite: {}, scoring: {})",
                config.llm.base_url, config.llm.rewrite_model, config.llm.scoring_model
            );
            Some(Arc::new(client))
        }
        None => {
            warn!("No LLM API key configured; humanize requests will answer 503");
            None
        }
    };

    if config.billing.webhook_secret.is_none() {
        warn!("billing.webhook_secret not set; payment webhooks are accepted unsigned");
    }

    let bind = config.server.bind.clone();
    let state = AppState::new(pool, llm, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("hmz-api listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
