//! Error types for the signaling layer

use thiserror::Error;

/// Result type for signaling operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Errors raised by a [`SignalChannel`](crate::SignalChannel)
/// implementation.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The backing store is unreachable or rejected the write.
    ///
    /// Fatal for offer/answer publishes; callers treat it as a
    /// best-effort drop for individual ICE candidates.
    #[error("signaling store unavailable: {reason}")]
    Persistence { reason: String },

    /// No record exists for the given id.
    #[error("signaling record not found: {id}")]
    NotFound { id: String },

    /// The subscription has been closed and delivers no further records.
    #[error("signal subscription closed")]
    SubscriptionClosed,
}

impl SignalError {
    /// Create a persistence error
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}
