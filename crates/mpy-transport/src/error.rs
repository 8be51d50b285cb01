use thiserror::Error;

/// Transport-level failure modes (spec.md §4.1).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying handle is closed or was never opened.
    #[error("transport closed")]
    TransportFailed,
    /// A deadline expired before the operation completed.
    #[error("deadline exceeded")]
    Timeout,
    /// The underlying device is locked by another process (serial only).
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// An underlying OS-level I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
