use thiserror::Error;

/// Failure kinds surfaced by every snapshot store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The database could not be opened or upgraded. Fatal for the session.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// An operation was issued before `initialize()` resolved.
    #[error("Store not initialized")]
    NotInitialized,
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
}

impl StoreError {
    pub(crate) fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::StoreUnavailable(err.to_string())
    }

    pub(crate) fn write(err: sqlx::Error) -> Self {
        StoreError::WriteFailed(err.to_string())
    }

    pub(crate) fn read(err: sqlx::Error) -> Self {
        StoreError::ReadFailed(err.to_string())
    }
}
