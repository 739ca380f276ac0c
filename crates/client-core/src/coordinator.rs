//! Call coordination
//!
//! [`CallCoordinator`] is the state machine gluing the signaling
//! channel to the media session: it translates inbound signaling
//! records into media operations, translates user actions into
//! signaling writes plus media operations, and guarantees that every
//! exit path (success, failure, cancellation, remote hangup) routes
//! through the same idempotent cleanup.
//!
//! States: idle, outgoing-ringing, incoming-ringing, active. User
//! actions and subscription-delivered records are serialized through
//! one state lock; awaited I/O (device access, SDP generation, record
//! publishes) runs outside the lock and re-validates a setup epoch at
//! each commit point, so a hangup during an in-flight setup wins and
//! the setup's late results are discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use membercall_media_core::{
    LocalMediaStream, MediaError, MediaSessionListeners, MediaSessionManager, RemoteMediaStream,
};
use membercall_signal_core::{
    CallId, CallStatus, CallType, IceCandidateInit, MemberId, Signal, SignalChannel, SignalDraft,
    SignalRecord, SubscriptionHandle,
};

use crate::call::{CallDirection, CallSession, IncomingCall};
use crate::config::CoordinatorConfig;
use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, CallEventStream, EndReason, EventEmitter};
use crate::permission::PermissionGate;
use crate::retry::retry_with_backoff;

/// The signaling identity of the call currently being set up or in
/// flight. Drives the ICE publish pipeline.
#[derive(Debug, Clone)]
struct SignalContext {
    token: u64,
    call_id: CallId,
    peer: MemberId,
    call_type: CallType,
}

#[derive(Default)]
struct CallState {
    active: Option<CallSession>,
    incoming: Option<IncomingCall>,
    /// Candidates the caller trickled while the offer was still
    /// ringing here; applied once the user answers and a peer
    /// connection exists.
    pending_remote_candidates: Vec<IceCandidateInit>,
    is_muted: bool,
    is_video_enabled: bool,
    is_speaker_enabled: bool,
}

#[derive(Default)]
struct Tasks {
    subscription: Option<(SubscriptionHandle, JoinHandle<()>)>,
    ice_pump: Option<JoinHandle<()>>,
}

/// Coordinates one member's calls over an injected [`SignalChannel`]
/// and an owned [`MediaSessionManager`].
///
/// The coordinator is scoped to a logged-in session: [`start`] opens
/// the member's signal subscription, [`stop`] tears it down (logout).
/// One incoming-call slot is tracked; a second offer while one is
/// ringing is dropped.
///
/// [`start`]: CallCoordinator::start
/// [`stop`]: CallCoordinator::stop
pub struct CallCoordinator {
    member_id: MemberId,
    config: CoordinatorConfig,
    media: Arc<MediaSessionManager>,
    channel: Arc<dyn SignalChannel>,
    permissions: Arc<dyn PermissionGate>,
    state: Mutex<CallState>,
    events: EventEmitter,
    /// Bumped by `end_call`/`terminate` and at the start of every call
    /// setup; in-flight setups compare their token against it before
    /// committing anything.
    setup_epoch: AtomicU64,
    ctx_tx: watch::Sender<Option<SignalContext>>,
    ice_tx: mpsc::UnboundedSender<(u64, IceCandidateInit)>,
    ice_rx: Mutex<Option<mpsc::UnboundedReceiver<(u64, IceCandidateInit)>>>,
    tasks: Mutex<Tasks>,
    stopped: AtomicBool,
    weak: Weak<Self>,
}

impl CallCoordinator {
    /// Create a coordinator for one member.
    pub fn new(
        member_id: MemberId,
        channel: Arc<dyn SignalChannel>,
        media: Arc<MediaSessionManager>,
        permissions: Arc<dyn PermissionGate>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let (ice_tx, ice_rx) = mpsc::unbounded_channel();
        let (ctx_tx, _) = watch::channel(None);
        let events = EventEmitter::new(config.event_capacity);

        Arc::new_cyclic(|weak| Self {
            member_id,
            config,
            media,
            channel,
            permissions,
            state: Mutex::new(CallState::default()),
            events,
            setup_epoch: AtomicU64::new(0),
            ctx_tx,
            ice_tx,
            ice_rx: Mutex::new(Some(ice_rx)),
            tasks: Mutex::new(Tasks::default()),
            stopped: AtomicBool::new(false),
            weak: weak.clone(),
        })
    }

    // ===== Lifecycle =====

    /// Open the member's signal subscription and begin dispatching
    /// records. Idempotent while running; a stopped coordinator cannot
    /// be restarted (create a new one on the next login).
    pub async fn start(&self) -> CallResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(CallError::NotStarted);
        }
        let mut tasks = self.tasks.lock().await;
        if tasks.subscription.is_some() {
            return Ok(());
        }

        let mut subscription = self.channel.subscribe(&self.member_id).await?;
        let handle = subscription.handle();
        let weak = self.weak.clone();
        let join = tokio::spawn(async move {
            while let Some(record) = subscription.recv().await {
                let Some(this) = weak.upgrade() else { break };
                this.handle_record(record).await;
            }
            debug!("signal subscription drained");
        });
        tasks.subscription = Some((handle, join));

        if let Some(rx) = self.ice_rx.lock().await.take() {
            let weak = self.weak.clone();
            tasks.ice_pump = Some(tokio::spawn(run_ice_pump(weak, rx)));
        }

        info!(member = %self.member_id, "call coordinator started");
        Ok(())
    }

    /// End any active call, close the signal subscription, and stop
    /// background work. Called when the member's session ends (logout).
    /// Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.terminate(true, EndReason::LocalHangup).await;

        let mut tasks = self.tasks.lock().await;
        if let Some((handle, join)) = tasks.subscription.take() {
            handle.unsubscribe();
            join.abort();
        }
        if let Some(pump) = tasks.ice_pump.take() {
            pump.abort();
        }
        info!(member = %self.member_id, "call coordinator stopped");
    }

    // ===== User actions =====

    /// Place a call to another member.
    ///
    /// Acquires permissions and local media, generates the offer, and
    /// publishes the offer record; its store-assigned id becomes the
    /// call id. On any failure the shared cleanup path runs and state
    /// returns to idle before the error is surfaced.
    pub async fn initiate_call(
        &self,
        receiver_id: MemberId,
        call_type: CallType,
    ) -> CallResult<CallId> {
        {
            let state = self.state.lock().await;
            if state.active.is_some() || state.incoming.is_some() {
                return Err(CallError::AlreadyInCall);
            }
        }

        if !self
            .permissions
            .request_permissions(call_type.is_video())
            .await
        {
            info!("camera/microphone permission refused, call not started");
            return Err(MediaError::access_denied("camera/microphone permission refused").into());
        }

        let token = self.begin_setup().await;
        match self.setup_outgoing(token, receiver_id, call_type).await {
            Ok(call_id) => Ok(call_id),
            Err(e) => {
                let canceled = self.setup_epoch.load(Ordering::SeqCst) != token;
                self.abort_setup(token).await;
                Err(if canceled { CallError::Canceled } else { e })
            }
        }
    }

    /// Answer the ringing incoming call.
    ///
    /// Acquires permissions and media for the offer's call type,
    /// generates and publishes the answer, and marks the originating
    /// record active. On failure the incoming call is discarded and
    /// state returns to idle.
    pub async fn answer_call(&self, call_id: CallId) -> CallResult<()> {
        let incoming = {
            let mut state = self.state.lock().await;
            match state.incoming.as_ref() {
                Some(inc) if inc.call_id == call_id => state.incoming.take(),
                _ => None,
            }
        }
        .ok_or(CallError::CallNotFound { call_id })?;

        if !self
            .permissions
            .request_permissions(incoming.call_type.is_video())
            .await
        {
            info!(%call_id, "camera/microphone permission refused, call not answered");
            return Err(MediaError::access_denied("camera/microphone permission refused").into());
        }

        let token = self.begin_setup().await;
        match self.setup_answer(token, &incoming).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let canceled = self.setup_epoch.load(Ordering::SeqCst) != token;
                self.abort_setup(token).await;
                Err(if canceled { CallError::Canceled } else { e })
            }
        }
    }

    /// Decline the ringing incoming call. No media is ever touched on
    /// this path.
    pub async fn decline_call(&self, call_id: CallId) -> CallResult<()> {
        let incoming = {
            let mut state = self.state.lock().await;
            match state.incoming.as_ref() {
                Some(inc) if inc.call_id == call_id => {
                    state.pending_remote_candidates.clear();
                    state.incoming.take()
                }
                _ => None,
            }
        }
        .ok_or(CallError::CallNotFound { call_id })?;

        // State is already idle; a store failure below is reported but
        // cannot resurrect the call.
        let update = self
            .channel
            .update_status(call_id, CallStatus::Declined)
            .await;
        let publish = self
            .channel
            .publish(SignalDraft::end(
                call_id,
                self.member_id.clone(),
                incoming.caller_id.clone(),
                incoming.call_type,
                CallStatus::Declined,
            ))
            .await;

        info!(%call_id, caller = %incoming.caller_id, "incoming call declined");
        self.events.emit(CallEvent::CallEnded {
            call_id,
            reason: EndReason::Declined,
        });

        update?;
        publish?;
        Ok(())
    }

    /// Hang up. Publishes an end record for the tracked call (if any),
    /// always runs media cleanup, and always resets call state; a
    /// network failure on the outbound end signal never skips cleanup.
    /// Calling with no call in flight is a safe no-op.
    pub async fn end_call(&self) -> CallResult<()> {
        self.terminate(true, EndReason::LocalHangup).await;
        Ok(())
    }

    // ===== In-call controls =====

    /// Toggle the microphone. Returns the resulting muted state.
    pub async fn toggle_mute(&self) -> bool {
        let muted = self.media.toggle_mute().await;
        self.state.lock().await.is_muted = muted;
        muted
    }

    /// Toggle the camera feed. Returns the resulting enabled state.
    pub async fn toggle_video(&self) -> bool {
        let enabled = self.media.toggle_video().await;
        self.state.lock().await.is_video_enabled = enabled;
        enabled
    }

    /// Swap between front and back camera. Non-fatal on failure: the
    /// call continues on the prior camera and the error is surfaced as
    /// a notice.
    pub async fn switch_camera(&self) -> CallResult<bool> {
        match self.media.switch_camera().await {
            Ok(front) => Ok(front),
            Err(e) => {
                warn!("camera switch failed: {}", e);
                self.events.emit(CallEvent::Error {
                    message: format!("camera switch failed: {e}"),
                });
                Err(e.into())
            }
        }
    }

    /// Toggle the loudspeaker route hint. Returns the new state.
    pub async fn toggle_speaker(&self) -> bool {
        let target = !self.state.lock().await.is_speaker_enabled;
        let enabled = self.media.enable_speaker(target).await;
        self.state.lock().await.is_speaker_enabled = enabled;
        enabled
    }

    // ===== Reactive state =====

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    /// The tracked call, outgoing or answered.
    pub async fn active_call(&self) -> Option<CallSession> {
        self.state.lock().await.active.clone()
    }

    /// The offer awaiting an accept/decline decision.
    pub async fn incoming_call(&self) -> Option<IncomingCall> {
        self.state.lock().await.incoming.clone()
    }

    pub async fn local_stream(&self) -> Option<Arc<LocalMediaStream>> {
        self.media.local_stream().await
    }

    pub async fn remote_stream(&self) -> Option<Arc<RemoteMediaStream>> {
        self.media.remote_stream().await
    }

    pub async fn is_muted(&self) -> bool {
        self.state.lock().await.is_muted
    }

    pub async fn is_video_enabled(&self) -> bool {
        self.state.lock().await.is_video_enabled
    }

    pub async fn is_speaker_enabled(&self) -> bool {
        self.state.lock().await.is_speaker_enabled
    }

    /// Subscribe to call events from this point on.
    pub fn subscribe_events(&self) -> CallEventStream {
        self.events.subscribe()
    }

    // ===== Setup plumbing =====

    async fn begin_setup(&self) -> u64 {
        let token = self.setup_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.install_media_listeners(token).await;
        token
    }

    /// Unwind a failed setup, unless something newer (a hangup, another
    /// setup) already owns the media session.
    async fn abort_setup(&self, token: u64) {
        if self.setup_epoch.load(Ordering::SeqCst) == token {
            self.media.cleanup().await;
            self.ctx_tx.send_replace(None);
        }
    }

    async fn setup_outgoing(
        &self,
        token: u64,
        receiver_id: MemberId,
        call_type: CallType,
    ) -> CallResult<CallId> {
        self.media
            .initialize_media_stream(call_type.is_video())
            .await?;
        let offer = self.media.create_offer().await?;

        if self.setup_epoch.load(Ordering::SeqCst) != token {
            return Err(CallError::Canceled);
        }

        let draft = SignalDraft::offer(
            self.member_id.clone(),
            receiver_id.clone(),
            call_type,
            offer,
        );
        let channel = Arc::clone(&self.channel);
        let record = retry_with_backoff("publish_offer", &self.config.setup_retry, || {
            let draft = draft.clone();
            let channel = Arc::clone(&channel);
            async move { channel.publish(draft).await.map_err(CallError::from) }
        })
        .await?;
        let call_id = CallId::from(record.id);

        let mut state = self.state.lock().await;
        if self.setup_epoch.load(Ordering::SeqCst) != token {
            drop(state);
            // The offer reached the store after the user already hung
            // up; retract it so the far end does not keep ringing.
            self.retract(call_id, &receiver_id, call_type).await;
            return Err(CallError::Canceled);
        }
        let session =
            CallSession::outgoing(call_id, self.member_id.clone(), receiver_id.clone(), call_type);
        state.active = Some(session.clone());
        state.is_muted = false;
        state.is_video_enabled = call_type.is_video();
        drop(state);

        self.ctx_tx.send_replace(Some(SignalContext {
            token,
            call_id,
            peer: receiver_id,
            call_type,
        }));
        self.spawn_ring_timeout(call_id);

        info!(%call_id, call_type = call_type.as_str(), "outgoing call ringing");
        self.events.emit(CallEvent::OutgoingCall { call: session });
        Ok(call_id)
    }

    async fn setup_answer(&self, token: u64, incoming: &IncomingCall) -> CallResult<()> {
        let call_id = incoming.call_id;
        self.media
            .initialize_media_stream(incoming.call_type.is_video())
            .await?;

        // Unlike the outgoing path the call id is already known, so the
        // candidate pipeline opens before negotiation even starts.
        self.ctx_tx.send_replace(Some(SignalContext {
            token,
            call_id,
            peer: incoming.caller_id.clone(),
            call_type: incoming.call_type,
        }));

        let answer = self.media.create_answer(incoming.offer.clone()).await?;

        // Candidates the caller trickled while this side was ringing.
        let held = {
            let mut state = self.state.lock().await;
            std::mem::take(&mut state.pending_remote_candidates)
        };
        for candidate in held {
            self.media.add_ice_candidate(Some(candidate)).await;
        }

        if self.setup_epoch.load(Ordering::SeqCst) != token {
            return Err(CallError::Canceled);
        }

        let draft = SignalDraft::answer(
            call_id,
            self.member_id.clone(),
            incoming.caller_id.clone(),
            incoming.call_type,
            answer,
        );
        let channel = Arc::clone(&self.channel);
        retry_with_backoff("publish_answer", &self.config.setup_retry, || {
            let draft = draft.clone();
            let channel = Arc::clone(&channel);
            async move { channel.publish(draft).await.map_err(CallError::from) }
        })
        .await?;
        self.channel
            .update_status(call_id, CallStatus::Active)
            .await?;

        let mut state = self.state.lock().await;
        if self.setup_epoch.load(Ordering::SeqCst) != token {
            drop(state);
            // The answer reached the store after the user hung up; the
            // caller may believe the call is live, so follow with an end.
            self.retract(call_id, &incoming.caller_id, incoming.call_type)
                .await;
            return Err(CallError::Canceled);
        }
        let session = CallSession::incoming_active(incoming, self.member_id.clone());
        state.active = Some(session.clone());
        state.is_muted = false;
        state.is_video_enabled = incoming.call_type.is_video();
        drop(state);

        info!(%call_id, caller = %incoming.caller_id, "incoming call answered");
        self.events.emit(CallEvent::CallStateChanged {
            call: session,
            previous: CallStatus::Ringing,
        });
        Ok(())
    }

    /// Best-effort end record for a call that was signaled to the store
    /// but lost the race against a local hangup.
    async fn retract(&self, call_id: CallId, peer: &MemberId, call_type: CallType) {
        let draft = SignalDraft::end(
            call_id,
            self.member_id.clone(),
            peer.clone(),
            call_type,
            CallStatus::Ended,
        );
        if let Err(e) = self.channel.publish(draft).await {
            warn!(%call_id, "failed to retract canceled call: {}", e);
        }
        if let Err(e) = self.channel.update_status(call_id, CallStatus::Ended).await {
            debug!(%call_id, "failed to update retracted call status: {}", e);
        }
    }

    /// The shared teardown path. Cancels any in-flight setup, clears
    /// call state, optionally publishes an end record, and always runs
    /// media cleanup, in that order, so nothing can skip the cleanup.
    async fn terminate(&self, send_signal: bool, reason: EndReason) {
        self.setup_epoch.fetch_add(1, Ordering::SeqCst);

        let (active, incoming) = {
            let mut state = self.state.lock().await;
            let active = state.active.take();
            let incoming = state.incoming.take();
            state.pending_remote_candidates.clear();
            state.is_muted = false;
            state.is_video_enabled = false;
            state.is_speaker_enabled = false;
            (active, incoming)
        };

        let ended = active
            .map(|call| (call.call_id, call.peer().clone(), call.call_type))
            .or_else(|| {
                incoming.map(|inc| (inc.call_id, inc.caller_id, inc.call_type))
            });

        let Some((call_id, peer, call_type)) = ended else {
            // Nothing tracked: release any half-built media from an
            // in-flight setup and return. No record is published.
            self.media.cleanup().await;
            self.ctx_tx.send_replace(None);
            return;
        };

        if send_signal {
            let draft = SignalDraft::end(
                call_id,
                self.member_id.clone(),
                peer,
                call_type,
                CallStatus::Ended,
            );
            if let Err(e) = self.channel.publish(draft).await {
                warn!(%call_id, "failed to publish end signal, cleaning up anyway: {}", e);
            }
            if let Err(e) = self.channel.update_status(call_id, CallStatus::Ended).await {
                debug!(%call_id, "failed to update record status: {}", e);
            }
        }

        self.media.cleanup().await;
        self.ctx_tx.send_replace(None);

        info!(%call_id, ?reason, "call ended");
        self.events.emit(CallEvent::CallEnded { call_id, reason });
    }

    async fn install_media_listeners(&self, token: u64) {
        let ice_tx = self.ice_tx.clone();
        let events = self.events.clone();
        let ctx_rx = self.ctx_tx.subscribe();

        self.media
            .set_listeners(MediaSessionListeners {
                // Streams are read through accessors; no fan-out needed.
                on_local_stream: Arc::new(|_| {}),
                on_remote_stream: Arc::new(|_| {}),
                on_ice_candidate: Arc::new(move |candidate| {
                    // Forward immediately and individually; the pump
                    // holds candidates only until the call id exists.
                    let _ = ice_tx.send((token, candidate));
                }),
                on_connection_state_change: Arc::new(move |state| {
                    if state.is_degraded() {
                        warn!(?state, "call connectivity degraded");
                        events.emit(CallEvent::ConnectivityWarning {
                            call_id: ctx_rx.borrow().as_ref().map(|ctx| ctx.call_id),
                            state,
                        });
                    }
                }),
            })
            .await;
    }

    fn spawn_ring_timeout(&self, call_id: CallId) {
        let Some(timeout) = self.config.ring_timeout else {
            return;
        };
        let weak = self.weak.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(this) = weak.upgrade() else { return };

            let (outgoing_ringing, incoming_ringing) = {
                let state = this.state.lock().await;
                (
                    state
                        .active
                        .as_ref()
                        .is_some_and(|c| c.call_id == call_id && c.is_ringing()),
                    state
                        .incoming
                        .as_ref()
                        .is_some_and(|inc| inc.call_id == call_id),
                )
            };

            if outgoing_ringing {
                info!(%call_id, "ring timeout, ending unanswered outgoing call");
                this.terminate(true, EndReason::RingTimeout).await;
            } else if incoming_ringing {
                info!(%call_id, "ring timeout, dismissing unanswered incoming call");
                let cleared = {
                    let mut state = this.state.lock().await;
                    if state
                        .incoming
                        .as_ref()
                        .is_some_and(|inc| inc.call_id == call_id)
                    {
                        state.incoming = None;
                        state.pending_remote_candidates.clear();
                        true
                    } else {
                        false
                    }
                };
                if cleared {
                    this.events.emit(CallEvent::CallEnded {
                        call_id,
                        reason: EndReason::RingTimeout,
                    });
                }
            }
        });
    }

    // ===== Inbound record dispatch =====

    async fn handle_record(&self, record: SignalRecord) {
        debug!(
            id = %record.id,
            signal = record.signal.kind(),
            caller = %record.caller_id,
            "signal record received"
        );
        match &record.signal {
            Signal::Offer(_) => self.handle_offer(record).await,
            Signal::Answer(_) => self.handle_answer(record).await,
            Signal::IceCandidate(_) => self.handle_candidate(record).await,
            Signal::End => self.handle_remote_end(record).await,
        }
    }

    async fn handle_offer(&self, record: SignalRecord) {
        let Signal::Offer(offer) = record.signal else {
            return;
        };
        let call_id = record.call_id.unwrap_or_else(|| CallId::from(record.id));

        let incoming = IncomingCall {
            call_id,
            caller_id: record.caller_id,
            call_type: record.call_type,
            offer,
            received_at: record.created_at,
        };

        {
            let mut state = self.state.lock().await;
            if state.active.is_some() || state.incoming.is_some() {
                // Single incoming-call slot: a second offer while one
                // call is tracked is dropped.
                debug!(%call_id, caller = %incoming.caller_id, "busy, dropping incoming offer");
                return;
            }
            state.incoming = Some(incoming.clone());
        }

        self.spawn_ring_timeout(call_id);
        info!(%call_id, caller = %incoming.caller_id, call_type = incoming.call_type.as_str(), "incoming call ringing");
        self.events.emit(CallEvent::IncomingCall { call: incoming });
    }

    async fn handle_answer(&self, record: SignalRecord) {
        let Signal::Answer(answer) = record.signal else {
            return;
        };
        let Some(call_id) = record.call_id else {
            debug!("ignoring answer without call id");
            return;
        };

        {
            let state = self.state.lock().await;
            let matches = state.active.as_ref().is_some_and(|call| {
                call.call_id == call_id
                    && call.direction == CallDirection::Outgoing
                    && call.is_ringing()
            });
            if !matches {
                debug!(%call_id, "ignoring answer for untracked call");
                return;
            }
        }

        if let Err(e) = self.media.set_remote_description(answer).await {
            // Expected when the call was torn down while the answer was
            // in flight; fatal only if the call is still tracked.
            let still_tracked = self
                .state
                .lock()
                .await
                .active
                .as_ref()
                .is_some_and(|call| call.call_id == call_id);
            if still_tracked {
                warn!(%call_id, "failed to apply remote answer: {}", e);
                self.events.emit(CallEvent::Error {
                    message: format!("failed to establish call: {e}"),
                });
                self.terminate(true, EndReason::SetupFailed).await;
            }
            return;
        }

        let session = {
            let mut state = self.state.lock().await;
            let Some(call) = state
                .active
                .as_mut()
                .filter(|call| call.call_id == call_id && call.is_ringing())
            else {
                return;
            };
            call.status = CallStatus::Active;
            call.started_at = Some(Utc::now());
            call.clone()
        };

        info!(%call_id, "call answered by remote, now active");
        self.events.emit(CallEvent::CallStateChanged {
            call: session,
            previous: CallStatus::Ringing,
        });
    }

    async fn handle_candidate(&self, record: SignalRecord) {
        let Signal::IceCandidate(candidate) = record.signal else {
            return;
        };
        let Some(call_id) = record.call_id else {
            debug!("ignoring ICE candidate without call id");
            return;
        };

        let apply = {
            let mut state = self.state.lock().await;
            if state
                .incoming
                .as_ref()
                .is_some_and(|inc| inc.call_id == call_id)
            {
                // No peer connection exists until the user answers;
                // hold the candidate for the answer setup.
                state.pending_remote_candidates.push(candidate);
                return;
            }
            if state
                .active
                .as_ref()
                .is_some_and(|call| call.call_id == call_id)
            {
                Some(candidate)
            } else {
                None
            }
        };

        match apply {
            Some(candidate) => self.media.add_ice_candidate(Some(candidate)).await,
            None => debug!(%call_id, "ignoring ICE candidate for untracked call"),
        }
    }

    async fn handle_remote_end(&self, record: SignalRecord) {
        let call_id = record.effective_call_id();

        let tracked = {
            let state = self.state.lock().await;
            state
                .active
                .as_ref()
                .is_some_and(|call| call.call_id == call_id)
                || state
                    .incoming
                    .as_ref()
                    .is_some_and(|inc| inc.call_id == call_id)
        };
        if !tracked {
            debug!(%call_id, "ignoring end signal for untracked call");
            return;
        }

        let reason = if record.status == CallStatus::Declined {
            EndReason::RemoteDeclined
        } else {
            EndReason::RemoteHangup
        };
        info!(%call_id, ?reason, "remote end signal received");
        // Remotely-initiated end: tear down without echoing the signal.
        self.terminate(false, reason).await;
    }
}

impl std::fmt::Debug for CallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCoordinator")
            .field("member_id", &self.member_id)
            .finish()
    }
}

/// Publishes locally discovered ICE candidates, each one immediately
/// and individually. Candidates discovered before the offer publish has
/// returned the call id are held here and flushed the moment the call
/// context exists; candidates from an abandoned setup are dropped.
async fn run_ice_pump(
    weak: Weak<CallCoordinator>,
    mut rx: mpsc::UnboundedReceiver<(u64, IceCandidateInit)>,
) {
    while let Some((token, candidate)) = rx.recv().await {
        let Some(this) = weak.upgrade() else { return };
        let mut ctx_rx = this.ctx_tx.subscribe();

        loop {
            if this.setup_epoch.load(Ordering::SeqCst) != token {
                debug!("dropping ICE candidate from abandoned setup");
                break;
            }
            let ctx = ctx_rx.borrow().clone();
            if let Some(ctx) = ctx {
                if ctx.token == token {
                    publish_candidate(&this, &ctx, candidate).await;
                } else {
                    debug!("dropping ICE candidate for superseded call context");
                }
                break;
            }
            if ctx_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

async fn publish_candidate(
    this: &CallCoordinator,
    ctx: &SignalContext,
    candidate: IceCandidateInit,
) {
    let status = this
        .state
        .lock()
        .await
        .active
        .as_ref()
        .map(|call| call.status)
        .unwrap_or(CallStatus::Ringing);

    let draft = SignalDraft::ice_candidate(
        ctx.call_id,
        this.member_id.clone(),
        ctx.peer.clone(),
        ctx.call_type,
        candidate,
        status,
    );
    // Losing one candidate must not abort the call: no retry, no error.
    if let Err(e) = this.channel.publish(draft).await {
        warn!(call_id = %ctx.call_id, "dropping ICE candidate, publish failed: {}", e);
    }
}
