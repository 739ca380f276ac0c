//! Error types for the call coordination layer

use membercall_media_core::MediaError;
use membercall_signal_core::{CallId, SignalError};
use thiserror::Error;

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors surfaced by [`CallCoordinator`](crate::CallCoordinator)
/// operations.
///
/// Setup-phase failures (initiate/answer) always unwind to `Idle`
/// through the shared cleanup path before one of these is returned;
/// mid-call operational failures (camera switch) are non-fatal and the
/// call continues.
#[derive(Debug, Error)]
pub enum CallError {
    /// Media-layer failure: access denied, negotiation, invalid state,
    /// camera switch.
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// Signaling-layer failure: store unreachable, record missing.
    #[error("signaling error: {0}")]
    Signal(#[from] SignalError),

    /// A call is already active or ringing.
    #[error("a call is already in progress")]
    AlreadyInCall,

    /// No tracked call matches the given id.
    #[error("no call found for id {call_id}")]
    CallNotFound { call_id: CallId },

    /// The operation was overtaken by `end_call` while in flight.
    #[error("call setup was canceled")]
    Canceled,

    /// The coordinator has not been started (no signal subscription).
    #[error("coordinator not started")]
    NotStarted,
}

impl CallError {
    /// Whether retrying the operation may succeed (transient store
    /// failures only).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CallError::Signal(SignalError::Persistence { .. }))
    }

    /// Short category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            CallError::Media(_) => "media",
            CallError::Signal(_) => "signaling",
            CallError::AlreadyInCall => "state",
            CallError::CallNotFound { .. } => "state",
            CallError::Canceled => "canceled",
            CallError::NotStarted => "lifecycle",
        }
    }
}
