//! # Mede-Mede Worker Library
//!
//! Background delivery of queued notifications.
//!
//! ## Modules
//!
//! - `channels`: SMS (Twilio), email (SendGrid), and log-only senders
//! - `dispatcher`: Claims pending notifications and sends them
//! - `config`: Environment configuration for senders and the dispatcher
//!
//! ## Example
//!
//! ```no_run
//! use medemede_shared::storage::MemoryStorage;
//! use medemede_worker::channels::LogSender;
//! use medemede_worker::dispatcher::{Dispatcher, DispatcherConfig};
//! use medemede_shared::models::notification::NotificationChannel;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let mut dispatcher = Dispatcher::new(Arc::new(MemoryStorage::new()), DispatcherConfig::default());
//! dispatcher.register_sender(Arc::new(LogSender::new(NotificationChannel::Email)));
//! let report = dispatcher.dispatch_once().await;
//! # }
//! ```

pub mod channels;
pub mod config;
pub mod dispatcher;
