//! # Mede-Mede Worker
//!
//! Standalone notification dispatcher for deployments on Postgres. It drains
//! the notification outbox written by the API and delivers SMS through Twilio
//! and email through SendGrid.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run -p medemede-worker
//! ```

use medemede_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use medemede_shared::storage::PgStorage;
use medemede_worker::config::WorkerConfig;
use medemede_worker::dispatcher::Dispatcher;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medemede_worker=debug,medemede_shared=info".into());
    let json = std::env::var("LOG_FORMAT").map_or(false, |v| v == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Mede-Mede Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(&config.database_url).with_max_connections(config.database_max_connections),
    )
    .await?;
    let storage = Arc::new(PgStorage::new(pool.clone()));

    let dispatcher = Dispatcher::new(storage, config.dispatcher.clone())
        .with_senders(config.channels.senders());

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    dispatcher.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");
    Ok(())
}
