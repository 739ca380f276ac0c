//! Event surface for UI layers
//!
//! Alongside the coordinator's reactive getters, every significant call
//! transition is broadcast as a [`CallEvent`] so notification/UI code
//! can subscribe without polling. Events are fan-out: each subscriber
//! gets an independent stream, and emitting with no subscribers is not
//! an error.

use membercall_media_core::ConnectionState;
use membercall_signal_core::{CallId, CallStatus};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::call::{CallSession, IncomingCall};

/// Events emitted by the call coordinator.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// An offer arrived; the call is ringing and awaiting a decision.
    IncomingCall { call: IncomingCall },

    /// A locally initiated call is ringing at the far end.
    OutgoingCall { call: CallSession },

    /// The tracked call changed status.
    CallStateChanged {
        call: CallSession,
        previous: CallStatus,
    },

    /// The call ended (locally or remotely) and state returned to idle.
    CallEnded {
        call_id: CallId,
        reason: EndReason,
    },

    /// The transport reported degraded connectivity. Non-fatal: no
    /// automatic teardown is performed.
    ConnectivityWarning {
        call_id: Option<CallId>,
        state: ConnectionState,
    },

    /// A non-fatal operational failure worth surfacing to the user.
    Error { message: String },
}

/// Why a call left the active/ringing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// This member hung up.
    LocalHangup,
    /// The far member hung up.
    RemoteHangup,
    /// This member declined the incoming call.
    Declined,
    /// The far member declined our call.
    RemoteDeclined,
    /// Ringing exceeded the configured timeout.
    RingTimeout,
    /// Call setup failed and was unwound.
    SetupFailed,
}

/// Stream adapter over the broadcast channel.
pub type CallEventStream = BroadcastStream<CallEvent>;

/// Broadcast emitter for [`CallEvent`]s.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<CallEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Send errors (no receivers) are ignored.
    pub fn emit(&self, event: CallEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events from this point on.
    pub fn subscribe(&self) -> CallEventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Subscribe, keeping the raw broadcast receiver.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<CallEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_does_not_error() {
        let emitter = EventEmitter::new(8);
        emitter.emit(CallEvent::Error {
            message: "nobody listening".to_string(),
        });
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let emitter = EventEmitter::new(8);
        let mut rx = emitter.subscribe_raw();

        emitter.emit(CallEvent::Error {
            message: "hello".to_string(),
        });

        match rx.recv().await.unwrap() {
            CallEvent::Error { message } => assert_eq!(message, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
