//! Route handlers, one module per resource
//!
//! Handlers stay thin: extract, validate, call a service, shape the response.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod delivery;
pub mod driver;
pub mod events;
pub mod health;
pub mod loyalty;
pub mod orders;
pub mod payment;
pub mod products;
pub mod users;
