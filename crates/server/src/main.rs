//! lyrebird server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use lyrebird_core::config::AppConfig;
use lyrebird_server::upstream::GeminiClient;
use lyrebird_server::{AppState, create_router};
use lyrebird_storage::LyricsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// lyrebird - A caching lyrics translation proxy
#[derive(Parser, Debug)]
#[command(name = "lyrebirdd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "LYREBIRD_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Build the configuration from defaults, the optional file, and the environment.
fn load_config(args: &Args) -> Result<AppConfig> {
    // Every field has a serde default, so an empty figment yields the defaults
    let mut figment = Figment::new();

    if std::path::Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}, using defaults", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("LYREBIRD_").ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")?;

    let config = config.with_fallback_api_key(std::env::var("GEMINI_API_KEY").ok());
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("lyrebird v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;

    if config.gemini.api_key.is_none() {
        tracing::warn!(
            "No Gemini API key configured (set GEMINI_API_KEY or LYREBIRD_GEMINI__API_KEY); \
             translation requests will fail until one is provided"
        );
    }

    tokio::fs::create_dir_all(&config.cache.root)
        .await
        .with_context(|| format!("failed to create cache root {}", config.cache.root.display()))?;
    tracing::info!(cache_root = %config.cache.root.display(), "Cache root ready");

    let store = LyricsStore::from_config(&config.cache);

    // Locks left behind by a previous instance
    let swept = store
        .locks()
        .sweep_stale()
        .await
        .context("failed to sweep stale locks")?;
    if swept > 0 {
        tracing::warn!(count = swept, "Removed stale locks from a previous run");
    }

    let generator = GeminiClient::new(&config.gemini).context("failed to build Gemini client")?;
    tracing::info!(endpoint = %generator.endpoint(), "Gemini client initialized");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::with_store(config, store, Arc::new(generator));
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
