//! # Mede-Mede API Server Library
//!
//! REST backend for the Mede-Mede Spot storefront, admin console, and
//! driver app.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from environment variables
//! - `error`: Error type and HTTP response mapping
//! - `middleware`: Auth gates, rate limiting, security headers
//! - `routes`: Route handlers per resource

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
