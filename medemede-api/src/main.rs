//! # Mede-Mede API Server
//!
//! ## Usage
//!
//! ```bash
//! # in-memory store with the seeded catalogue
//! cargo run -p medemede-api
//!
//! # Postgres
//! STORAGE_BACKEND=postgres DATABASE_URL=postgresql://... cargo run -p medemede-api
//! ```
//!
//! Startup order: configuration, storage (and migrations), admin bootstrap,
//! payment gateway, inline notification dispatcher, HTTP server. Ctrl-C
//! drains in-flight requests, stops the dispatcher, then closes the pool.

use medemede_api::app::{build_router, AppState};
use medemede_api::config::{Config, DispatchMode, StorageBackend};
use medemede_api::middleware::rate_limit::{RateLimit, RateLimiter};
use medemede_shared::db::{
    migrations::{ensure_database_exists, run_migrations},
    pool::{close_pool, create_pool, DatabaseConfig},
};
use medemede_shared::services::accounts;
use medemede_shared::services::payments::{MockGateway, PaymentGateway, StripeGateway};
use medemede_shared::storage::{MemoryStorage, PgStorage, Storage};
use medemede_worker::dispatcher::Dispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medemede_api=debug,medemede_shared=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").map_or(false, |v| v == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Mede-Mede API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let (storage, pool) = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on restart");
            let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::seeded());
            (storage, None)
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;
            ensure_database_exists(&url).await?;
            let pool = create_pool(
                DatabaseConfig::new(url).with_max_connections(config.storage.max_connections),
            )
            .await?;
            run_migrations(&pool).await?;
            let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool.clone()));
            (storage, Some(pool))
        }
    };

    if let Some(admin) = &config.shop.admin {
        let user = accounts::ensure_admin(storage.as_ref(), &admin.email, &admin.password).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "Admin account ready");
    }

    let payments: Arc<dyn PaymentGateway> = match &config.shop.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(key.clone())),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, payments use the mock gateway");
            Arc::new(MockGateway)
        }
    };

    let dispatcher = match config.notifications.dispatch {
        DispatchMode::Inline => {
            let dispatcher = Dispatcher::new(storage.clone(), config.notifications.dispatcher.clone())
                .with_senders(config.notifications.channels.senders());
            let token = dispatcher.shutdown_token();
            let handle = tokio::spawn(async move { dispatcher.run().await });
            Some((token, handle))
        }
        DispatchMode::Off => {
            tracing::info!("Inline notification dispatch disabled");
            None
        }
    };

    let limit = RateLimit::per_minute(config.rate_limit.auth_per_minute);
    let limiter = match &config.rate_limit.redis_url {
        Some(url) => match RateLimiter::with_redis(limit, url).await {
            Ok(limiter) => limiter,
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, rate limiting in process");
                RateLimiter::new(limit)
            }
        },
        None => RateLimiter::new(limit),
    };

    let bind_address = config.bind_address();
    let state = AppState::new(storage, payments, config).with_rate_limiter(limiter);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some((token, handle)) = dispatcher {
        token.cancel();
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Notification dispatcher task failed");
        }
    }
    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
