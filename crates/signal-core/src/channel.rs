//! The signaling channel abstraction
//!
//! A [`SignalChannel`] is the seam between the call coordinator and
//! whatever store actually moves signaling records between two members
//! (websocket push, long-poll, message queue). The coordinator only
//! ever sees this trait, so the backing implementation is swappable
//! without touching call logic. The crate ships
//! [`InMemorySignalChannel`](crate::InMemorySignalChannel) for tests
//! and single-process deployments.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SignalResult;
use crate::types::{CallId, CallStatus, MemberId, SignalDraft, SignalRecord};

/// Durable, ordered-enough delivery of signaling records between two
/// members, plus live delivery of newly created records to a listening
/// receiver.
///
/// Ordering guarantee relied on by the coordinator: the offer record for
/// a call is always observed before any answer/ice/end record for the
/// same call, because the receiver cannot answer before seeing the offer
/// and the sender cannot know the call id before the offer is stored.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    /// Persist a new record, assigning its `id` and server timestamp,
    /// and make it visible to subscribers.
    async fn publish(&self, draft: SignalDraft) -> SignalResult<SignalRecord>;

    /// Open a live, append-only sequence of records whose `receiver_id`
    /// matches. Records already stored at subscribe time are delivered
    /// first, in persistence order; new records follow in arrival order.
    ///
    /// The subscription is long-lived and not restartable mid-call;
    /// cancellation is explicit via [`SubscriptionHandle::unsubscribe`]
    /// and idempotent.
    async fn subscribe(&self, receiver_id: &MemberId) -> SignalResult<SignalSubscription>;

    /// Mutate the status of the originating (offer) record of a call in
    /// place, without creating a new row.
    async fn update_status(&self, call_id: CallId, status: CallStatus) -> SignalResult<()>;
}

/// Cancellation token for a subscription. Cloneable so the owner can
/// keep one while the receiving half is moved into a task.
#[derive(Clone)]
pub struct SubscriptionHandle {
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl SubscriptionHandle {
    pub fn new(cancel: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { cancel }
    }

    /// Stop delivery. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle").finish()
    }
}

/// The receiving half of a subscription: an async sequence of
/// [`SignalRecord`]s for one receiver.
#[derive(Debug)]
pub struct SignalSubscription {
    rx: mpsc::UnboundedReceiver<SignalRecord>,
    handle: SubscriptionHandle,
}

impl SignalSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SignalRecord>, handle: SubscriptionHandle) -> Self {
        Self { rx, handle }
    }

    /// Receive the next record, or `None` once the subscription is
    /// cancelled and drained.
    pub async fn recv(&mut self) -> Option<SignalRecord> {
        self.rx.recv().await
    }

    /// A detached cancellation handle for this subscription.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Cancel this subscription. Idempotent.
    pub fn unsubscribe(&self) {
        self.handle.unsubscribe();
    }
}

impl futures::Stream for SignalSubscription {
    type Item = SignalRecord;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
