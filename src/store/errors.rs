use thiserror::Error;

/// Failures raised by a ledger-store backend.
///
/// "Not found" is deliberately absent: lookups express absence through their
/// return types so callers can distinguish a missing record from a broken
/// store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    ConnectionError(String),

    #[error("store operation failed: {0}")]
    OperationFailed(String),

    #[error("integrity constraint violation: {0}")]
    IntegrityError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("store operation timed out: {0}")]
    Timeout(String),
}

impl StoreError {
    /// Transient failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }

    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::IntegrityError(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
