//! Request middleware
//!
//! - `auth`: token validation and role gates
//! - `rate_limit`: token bucket limiting of the credential endpoints
//! - `security`: security response headers

pub mod auth;
pub mod rate_limit;
pub mod security;
