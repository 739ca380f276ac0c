//! In-process signaling channel
//!
//! A complete [`SignalChannel`] backed by an append-only in-memory log
//! with per-receiver live fan-out. Used by the test suite, the example
//! binaries, and single-process deployments; a production store adapter
//! plugs in behind the same trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::channel::{SignalChannel, SignalSubscription, SubscriptionHandle};
use crate::error::{SignalError, SignalResult};
use crate::types::{CallId, CallStatus, MemberId, RecordId, SignalDraft, SignalRecord};

struct Subscriber {
    receiver_id: MemberId,
    tx: mpsc::UnboundedSender<SignalRecord>,
}

/// In-memory implementation of [`SignalChannel`].
///
/// Publish assigns the record id and timestamp, appends to the log, and
/// fans the record out to every live subscriber whose `receiver_id`
/// matches. The log mutex is held across the fan-out so delivery order
/// always matches persistence order, and a subscriber registered while
/// a backlog is being replayed can neither miss nor double-receive a
/// record.
pub struct InMemorySignalChannel {
    log: Mutex<Vec<SignalRecord>>,
    subscribers: Arc<DashMap<Uuid, Subscriber>>,
    offline: AtomicBool,
}

impl InMemorySignalChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            subscribers: Arc::new(DashMap::new()),
            offline: AtomicBool::new(false),
        })
    }

    /// Simulate the backing store becoming unreachable: while offline,
    /// `publish` and `update_status` fail with a persistence error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of every record persisted so far, in insertion order.
    pub async fn records(&self) -> Vec<SignalRecord> {
        self.log.lock().await.clone()
    }

    fn check_online(&self) -> SignalResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SignalError::persistence("store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignalChannel for InMemorySignalChannel {
    async fn publish(&self, draft: SignalDraft) -> SignalResult<SignalRecord> {
        self.check_online()?;

        let record = SignalRecord {
            id: RecordId::generate(),
            call_id: draft.call_id,
            caller_id: draft.caller_id,
            receiver_id: draft.receiver_id,
            call_type: draft.call_type,
            signal: draft.signal,
            status: draft.status,
            created_at: Utc::now(),
        };

        let mut log = self.log.lock().await;
        log.push(record.clone());
        trace!(
            id = %record.id,
            signal = record.signal.kind(),
            receiver = %record.receiver_id,
            "persisted signal record"
        );

        // Fan out under the log lock so live delivery preserves
        // persistence order relative to concurrent subscribes.
        self.subscribers.retain(|_, sub| {
            if sub.receiver_id == record.receiver_id {
                sub.tx.send(record.clone()).is_ok()
            } else {
                true
            }
        });

        Ok(record)
    }

    async fn subscribe(&self, receiver_id: &MemberId) -> SignalResult<SignalSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let log = self.log.lock().await;
        for record in log.iter().filter(|r| &r.receiver_id == receiver_id) {
            // A send can only fail if the caller already dropped the
            // receiver, which it cannot have at this point.
            let _ = tx.send(record.clone());
        }

        let sub_id = Uuid::new_v4();
        self.subscribers.insert(
            sub_id,
            Subscriber {
                receiver_id: receiver_id.clone(),
                tx,
            },
        );
        drop(log);

        debug!(receiver = %receiver_id, %sub_id, "signal subscription opened");

        let subscribers = Arc::clone(&self.subscribers);
        let handle = SubscriptionHandle::new(Arc::new(move || {
            if subscribers.remove(&sub_id).is_some() {
                debug!(%sub_id, "signal subscription cancelled");
            }
        }));

        Ok(SignalSubscription::new(rx, handle))
    }

    async fn update_status(&self, call_id: CallId, status: CallStatus) -> SignalResult<()> {
        self.check_online()?;

        let mut log = self.log.lock().await;
        let record = log
            .iter_mut()
            .find(|r| r.id.0 == call_id.0)
            .ok_or_else(|| SignalError::not_found(call_id))?;
        record.status = status;
        debug!(%call_id, status = status.as_str(), "updated originating record status");
        Ok(())
    }
}
