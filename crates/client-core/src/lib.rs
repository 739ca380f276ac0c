//! # membercall-client-core
//!
//! The call coordination layer: a state machine that glues the
//! signaling channel ([`membercall_signal_core`]) to the WebRTC media
//! session ([`membercall_media_core`]) and exposes the member-facing
//! call surface (initiate, answer, decline, end, plus the in-call
//! controls and reactive state a notification/UI layer consumes).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use membercall_client_core::{AlwaysGranted, CallCoordinator, CoordinatorConfig};
//! use membercall_media_core::{MediaConfig, MediaSessionManager, SyntheticCapture};
//! use membercall_signal_core::{CallType, InMemorySignalChannel, MemberId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = InMemorySignalChannel::new();
//! let media = Arc::new(MediaSessionManager::new(
//!     MediaConfig::default(),
//!     SyntheticCapture::new(),
//! ));
//! let coordinator = CallCoordinator::new(
//!     MemberId::new("member-123"),
//!     channel,
//!     media,
//!     AlwaysGranted::new(),
//!     CoordinatorConfig::default(),
//! );
//! coordinator.start().await?;
//!
//! let call_id = coordinator
//!     .initiate_call(MemberId::new("member-456"), CallType::Video)
//!     .await?;
//! // ... later
//! coordinator.end_call().await?;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod permission;
pub mod retry;

pub use call::{CallDirection, CallSession, IncomingCall};
pub use config::CoordinatorConfig;
pub use coordinator::CallCoordinator;
pub use error::{CallError, CallResult};
pub use events::{CallEvent, CallEventStream, EndReason, EventEmitter};
pub use permission::{AlwaysGranted, DenyAll, PermissionGate};
pub use retry::RetryConfig;

// Re-export the identifier and record types that appear in this crate's
// public API.
pub use membercall_signal_core::{CallId, CallStatus, CallType, MemberId};
