//! # Mede-Mede Shared Library
//!
//! Domain types, storage, and business logic used by the Mede-Mede API
//! server and the notification worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `storage`: The `Storage` trait with in-memory and Postgres backends
//! - `services`: Customer, admin, driver, payment, notification, and chat operations
//! - `auth`: Password hashing, session tokens, and role checks
//! - `db`: Connection pool and migration helpers

pub mod auth;
pub mod db;
pub mod models;
pub mod services;
pub mod storage;

/// Current version of the Mede-Mede shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
