//! Business operations over the storage interface
//!
//! Each submodule is a set of free functions taking `&dyn Storage`, so the
//! HTTP layer, the worker, and tests can drive them against either backend.
//! Side effects that reach third parties (payments, notifications) are
//! passed in explicitly.

pub mod accounts;
pub mod admin;
pub mod chat;
pub mod customer;
pub mod driver;
pub mod notifications;
pub mod payments;

use crate::auth::{authorization::AuthzError, password::PasswordError};
use crate::storage::StorageError;
use payments::PaymentError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input or business-rule failure, surfaced to the caller verbatim
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Bad credentials
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// The request is valid but clashes with the current state
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Maps a missing row to `NotFound`
pub(crate) fn found<T>(value: Option<T>, what: &'static str) -> ServiceResult<T> {
    value.ok_or(ServiceError::NotFound(what))
}
