//! Error types for the media layer

use thiserror::Error;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by [`MediaSessionManager`](crate::MediaSessionManager)
/// and [`MediaCapture`](crate::MediaCapture) implementations.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Camera/microphone permission was refused or no device is
    /// available. Fatal to call setup; callers must not proceed to
    /// signaling.
    #[error("media access denied: {reason}")]
    AccessDenied { reason: String },

    /// SDP generation or application failed. Fatal; triggers cleanup.
    #[error("negotiation failed: {reason}")]
    Negotiation { reason: String },

    /// An operation was invoked before its prerequisites existed
    /// (e.g. applying an answer before an offer was created).
    #[error("invalid media session state: {message}")]
    InvalidState { message: String },

    /// The physical camera could not be swapped. Non-fatal; the call
    /// continues on the prior camera.
    #[error("camera switch failed: {reason}")]
    CameraSwitch { reason: String },

    /// Underlying WebRTC transport error.
    #[error("webrtc error: {0}")]
    Transport(#[from] webrtc::Error),
}

impl MediaError {
    /// Create an access-denied error
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Create a negotiation error
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::Negotiation {
            reason: reason.into(),
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a camera-switch error
    pub fn camera_switch(reason: impl Into<String>) -> Self {
        Self::CameraSwitch {
            reason: reason.into(),
        }
    }
}
