// ABOUTME: Server bootstrap for the HellaFresh API
// ABOUTME: Wires config, database, review service and HTTP layers, then serves until shutdown

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hellafresh_api::{create_router, ApiTokens, AppState};
use hellafresh_review::ReviewService;
use hellafresh_storage::{connect, PoolSettings};

pub mod config;
pub mod middleware;


pub use config::{Config, ConfigError};

/// Install the global tracing subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();
}

pub async fn open_database(config: &Config) -> anyhow::Result<SqlitePool> {
    connect(&config.database_path, &PoolSettings::default())
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                config.database_path.display()
            )
        })
}

fn build_cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]))
}

/// Full application with every HTTP layer, over an already-migrated pool
pub fn build_app(pool: SqlitePool, config: &Config) -> anyhow::Result<Router> {
    let review = ReviewService::new(pool, config.policy, config.similarity_threshold)?;
    let state = AppState::new(
        review,
        ApiTokens::new(config.api_tokens.clone()),
        config.request_timeout,
    );

    Ok(create_router(state)
        .layer(build_cors(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::create_panic_handler()))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = open_database(&config).await?;
    let app = build_app(pool.clone(), &config)?;

    if config.api_tokens.is_empty() {
        info!("No API tokens configured; write endpoints are open");
    }

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Server listening on {} (database: {})",
        addr,
        config.database_path.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server stopped");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
