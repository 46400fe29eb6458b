//! Database models for Mede-Mede Spot
//!
//! Each model owns its row type plus the Postgres queries that read and write
//! it. The in-memory store reuses the row types and their `from_*`
//! constructors.
//!
//! # Models
//!
//! - `user`: Accounts for customers, admins, and drivers
//! - `product`: Flower and pre-roll catalogue
//! - `cart`: Cart lines
//! - `order`: Orders and snapshotted line items
//! - `tracking`: Driver location pings
//! - `loyalty`: Points ledger and tiers
//! - `payment`: Stripe payment records
//! - `event`: Storefront events
//! - `notification`: Notification log / outbox
//! - `message`: Order and support chat
//! - `analytics`: Daily sales summaries
//!
//! # Example
//!
//! ```no_run
//! use medemede_shared::db::pool::{create_pool, DatabaseConfig};
//! use medemede_shared::models::product::Product;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//! let catalogue = Product::list(&pool, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod cart;
pub mod event;
pub mod loyalty;
pub mod message;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod tracking;
pub mod user;
