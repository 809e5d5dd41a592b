pub mod config;
pub mod constants;
pub mod dao;
pub mod macros;
pub mod middleware;
pub mod model;
pub mod service;
pub mod types;
pub mod utils;

use anyhow::Context;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::env::Config::load();
    let (state, worker) = config::init::init(&config).await.context("start-up failed")?;
    let app = config::routes::config_routes(state);

    let addr: SocketAddr = config
        .addr
        .parse()
        .with_context(|| format!("ADDR={} is not a socket address", config.addr))?;
    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown(config.outbox.shutdown_timeout).await;
    Ok(())
}
