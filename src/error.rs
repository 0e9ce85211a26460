//! Service-level error type shared by every component.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::Amount;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the booking, payment, wallet and OTP services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("room unavailable: {0}")]
    RoomUnavailable(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    /// Stable machine-readable kind, used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::RoomUnavailable(_) => "room_unavailable",
            Self::InvalidSignature => "invalid_signature",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AlreadyProcessed(_) => "already_processed",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => ServiceError::NotFound(entity.to_string()),
            StorageError::Unavailable(msg) => ServiceError::RoomUnavailable(msg),
            StorageError::InvalidState(msg) => ServiceError::Validation(msg),
            // Conflicts reaching this point exhausted their retries.
            StorageError::Conflict(msg) => ServiceError::UpstreamUnavailable(format!("contention: {msg}")),
            StorageError::Busy(msg) => ServiceError::UpstreamUnavailable(msg),
            StorageError::Corrupt(msg) | StorageError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        ServiceError::UpstreamUnavailable(err.to_string())
    }
}
