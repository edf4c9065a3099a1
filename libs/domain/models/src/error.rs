//! [libs/domain/models/src/error.rs]
//! Error taxonomy shared by every layer of the control plane.
//!
//! Components return `NyxError`; the HTTP adapter in `apps/control-plane`
//! is the only place that turns a kind into a status code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The wire-visible `kind` discriminator from the JSON error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidState,
    BalanceError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    QueueFull,
    QueueTimeout,
    StorageBusy,
    StorageError,
    SafetyBlocked,
    Internal,
}

#[derive(Error, Debug)]
pub enum NyxError {
    #[error("[E_INVALID_INPUT]: {0}")]
    InvalidInput(String),

    #[error("[E_INVALID_STATE]: {0}")]
    InvalidState(String),

    #[error("[E_BALANCE]: {0}")]
    BalanceError(String),

    #[error("[E_NOT_FOUND]: {0}")]
    NotFound(String),

    #[error("[E_UNAUTHORIZED]: {0}")]
    Unauthorized(String),

    #[error("[E_FORBIDDEN]: {0}")]
    Forbidden(String),

    #[error("[E_RATE_LIMITED]: retry after {retry_after_s}s")]
    RateLimited { retry_after_s: u64 },

    #[error("[E_QUEUE_FULL]: queue at capacity")]
    QueueFull,

    #[error("[E_QUEUE_TIMEOUT]: request timed out waiting in queue")]
    QueueTimeout,

    #[error("[E_STORAGE_BUSY]: store is busy, retry")]
    StorageBusy,

    #[error("[E_STORAGE]: {0}")]
    StorageError(String),

    #[error("[E_SAFETY_BLOCKED:{boundary_type}]: {reason}")]
    SafetyBlocked {
        boundary_type: String,
        reason: String,
    },

    #[error("[E_INTERNAL]: {0}")]
    Internal(String),
}

impl NyxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NyxError::InvalidInput(_) => ErrorKind::InvalidInput,
            NyxError::InvalidState(_) => ErrorKind::InvalidState,
            NyxError::BalanceError(_) => ErrorKind::BalanceError,
            NyxError::NotFound(_) => ErrorKind::NotFound,
            NyxError::Unauthorized(_) => ErrorKind::Unauthorized,
            NyxError::Forbidden(_) => ErrorKind::Forbidden,
            NyxError::RateLimited { .. } => ErrorKind::RateLimited,
            NyxError::QueueFull => ErrorKind::QueueFull,
            NyxError::QueueTimeout => ErrorKind::QueueTimeout,
            NyxError::StorageBusy => ErrorKind::StorageBusy,
            NyxError::StorageError(_) => ErrorKind::StorageError,
            NyxError::SafetyBlocked { .. } => ErrorKind::SafetyBlocked,
            NyxError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn retry_after_s(&self) -> Option<u64> {
        match self {
            NyxError::RateLimited { retry_after_s } => Some(*retry_after_s),
            _ => None,
        }
    }
}
