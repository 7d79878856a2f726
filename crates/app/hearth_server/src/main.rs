//! Hearth API server binary.
//!
//! Loads configuration from the environment (and `.env`), picks the
//! PostgreSQL or in-memory document store, and serves the API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hearth_api::config::ApiConfig;
use hearth_core::rate_limit::InMemoryRateLimiter;
use hearth_core::store::{DocumentStore, MemoryStore, PgStore};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server. Flags override the environment.
#[derive(Parser, Debug)]
#[command(name = "hearth_server", about = "Hearth API server")]
struct Args {
    /// Address to listen on (overrides `BIND_ADDR`).
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Without one, data lives in memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

async fn open_store(
    database_url: Option<&str>,
    max_connections: u32,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    let Some(url) = database_url else {
        warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    info!(max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    info!("running database migrations");
    hearth_core::migrate::migrate(&pool).await?;

    Ok(Arc::new(PgStore::new(pool)))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
    }
    info!("shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,hearth_api=debug,hearth_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    // Fails fast when the session secret is missing.
    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    info!(version = hearth_core::version(), ?config, "starting hearth_server");

    let store = open_store(config.database_url.as_deref(), args.max_connections).await?;

    let shutdown = CancellationToken::new();
    let rate_limiter = Arc::new(InMemoryRateLimiter::new());
    let sweeper = Arc::clone(&rate_limiter).spawn_sweeper(shutdown.clone());

    let bind_addr = config.bind_addr.clone();
    let state = hearth_api::AppState::new(store, config, rate_limiter)?;
    let app = hearth_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    let _ = sweeper.await;

    result?;
    Ok(())
}
