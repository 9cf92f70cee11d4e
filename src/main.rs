//! FinIntel - multi-tenant financial metrics API
//!
//! Serves revenue trends, source breakdowns and anomaly detection per
//! tenant over REST and GraphQL.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finintel::api::{build_router, AppState};
use finintel::auth::{Authenticator, JwksVerifier};
use finintel::config::{Config, LogFormat};
use finintel::db;
use finintel::jobs::JobScheduler;
use finintel::ratelimit::{CounterStore, RateLimiterRegistry, RedisCounterStore};
use finintel::repository::PgRepository;
use finintel::storage::LocalReportStorage;

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "finintel=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Redis-backed limiting. The connection is made on first use and retried
/// while Redis is down; requests meanwhile count in memory.
async fn build_limiter(config: &Config) -> RateLimiterRegistry {
    let store = match RedisCounterStore::open(&config.redis_url) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid REDIS_URL, rate limiting in memory only");
            return RateLimiterRegistry::in_memory();
        }
    };

    match store.ping().await {
        Ok(()) => tracing::info!("Rate limiting backed by Redis"),
        Err(e) => tracing::warn!(error = %e, "Redis unavailable, counting in memory until it recovers"),
    }

    RateLimiterRegistry::new(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting FinIntel API");
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config).await?;

    // Requests answer 503 until migrations have run
    if !db::check_schema(&pool).await? {
        tracing::warn!("Database schema is not complete. Please run migrations.");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let verifier = Arc::new(JwksVerifier::new(http.clone(), config.jwks_uri.clone()));
    let authenticator = Authenticator::new(verifier, &config);
    let limiter = build_limiter(&config).await;
    let storage = Arc::new(LocalReportStorage::new(&config.local_upload_dir));
    let repository = Arc::new(PgRepository::new(pool.clone()));

    let scheduler = JobScheduler::new(limiter.clone()).start();

    let state = AppState::new(config, repository, authenticator, limiter, storage, http);
    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    scheduler.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
