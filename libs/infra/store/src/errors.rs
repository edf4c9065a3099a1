//! [libs/infra/store/src/errors.rs]
//! Error catalog for the persistence layer.

use nyx_domain_models::error::NyxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("[L3_DB_NET_FAULT]: connection failed -> {0}")]
    Connection(String),

    #[error("[L3_DB_CONFIG_FAULT]: {0}")]
    Configuration(String),

    #[error("[L3_DB_QUERY_FAULT]: {0}")]
    Query(#[from] libsql::Error),

    #[error("[L3_DB_MAPPING_FAULT]: {0}")]
    Mapping(String),

    #[error("[L3_DB_BUSY]: pool exhausted, retry")]
    Busy,

    #[error("[L3_DB_FAULT]: booking '{0}' not found")]
    BookingNotFound(String),

    #[error("[L3_DB_FAULT]: booking '{0}' is not in the expected state for this transition")]
    InvalidState(String),
}

impl From<StoreError> for NyxError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Busy => NyxError::StorageBusy,
            StoreError::BookingNotFound(id) => NyxError::NotFound(format!("booking '{id}'")),
            StoreError::InvalidState(msg) => NyxError::InvalidState(msg),
            other => NyxError::StorageError(other.to_string()),
        }
    }
}
