//! Postgres connection pooling and schema migrations
//!
//! - `pool`: pool construction, health checks, and stats
//! - `migrations`: embedded `sqlx` migrations from `medemede-shared/migrations`
//!
//! # Example
//!
//! ```no_run
//! use medemede_shared::db::{migrations, pool::{create_pool, DatabaseConfig}};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
//! migrations::run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod pool;
