//! # membercall-signal-core
//!
//! Durable call-signaling records and the channel abstraction that
//! moves them between two members.
//!
//! A call is negotiated by appending [`SignalRecord`]s (offer, answer,
//! ICE candidates, end) to a persisted, subscribable log. This crate
//! defines the wire-exact record model, the injectable
//! [`SignalChannel`] trait the call coordinator speaks to, and an
//! in-memory channel implementation for tests and single-process use.

pub mod channel;
pub mod error;
pub mod memory;
pub mod types;

pub use channel::{SignalChannel, SignalSubscription, SubscriptionHandle};
pub use error::{SignalError, SignalResult};
pub use memory::InMemorySignalChannel;
pub use types::{
    CallId, CallStatus, CallType, IceCandidateInit, MemberId, RecordId, SessionDescription,
    Signal, SignalDraft, SignalRecord,
};
