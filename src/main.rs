use std::sync::Arc;

use anyhow::Context;
use likeroom::{app, config::Config, server::ChatServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let server = ChatServer::open(&config)
        .await
        .context("cannot load the account store")?;

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("cannot start the server on {}", config.addr))?;

    info!("starting chat server on {}", config.addr);
    axum::serve(listener, app(Arc::new(server)))
        .with_graceful_shutdown(shutdown())
        .await?;

    info!("chat server stopped");
    Ok(())
}

async fn shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
