use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use baton_api::config::{self, AppConfig};
use baton_api::database::{fixtures, Executor, MemoryExecutor, MySqlExecutor};
use baton_api::handlers;
use baton_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "baton-api", version, about = "Baton API server")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// YAML validation spec (overrides VALIDATION_SPEC_PATH)
    #[arg(long)]
    validation_spec: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = config::config().clone();
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if let Some(path) = cli.validation_spec {
        config.validation.spec_path = Some(path);
    }
    info!("Starting Baton API in {:?} mode", config.environment);
    config.check_deployable()?;
    if config.security.allow_test_mode {
        warn!("test_mode header bypass is enabled");
    }

    let executor = executor_for(&config)?;
    let port = config.api.port;
    let state = Arc::new(AppState::build(config, executor)?);
    let app = handlers::app(state)?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Baton API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// MySQL when a URL is configured; otherwise the seeded in-memory store,
/// which production refuses.
fn executor_for(config: &AppConfig) -> Result<Arc<dyn Executor>> {
    if config.database.url.is_some() {
        return Ok(Arc::new(MySqlExecutor::connect_lazy(&config.database)?));
    }
    if config.is_production() {
        bail!("DATABASE_URL is required in production");
    }

    warn!("DATABASE_URL not set, using in-memory store with development fixtures");
    let memory = MemoryExecutor::new();
    fixtures::seed_development(&memory)?;
    Ok(Arc::new(memory))
}
