//! Authentication and authorization
//!
//! - [`password`]: Argon2id hashing and the registration password policy
//! - [`jwt`]: HS256 session tokens carrying user id and role
//! - [`middleware`]: token extraction from the bearer header or session cookie
//! - [`authorization`]: role gates and order visibility rules

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
