//! End-to-end call flows: two coordinators wired through one in-memory
//! signal channel, exercising the full initiate/answer/decline/end
//! lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use membercall_client_core::{
    AlwaysGranted, CallCoordinator, CallError, CallEvent, CoordinatorConfig, DenyAll,
};
use membercall_media_core::{
    CameraFacing, MediaCapture, MediaConfig, MediaConstraints, MediaError, MediaResult,
    MediaSessionManager, LocalMediaStream, SyntheticCapture,
};
use membercall_signal_core::{
    CallStatus, CallType, InMemorySignalChannel, MemberId, Signal, SignalChannel,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

async fn member(id: &str, channel: &Arc<InMemorySignalChannel>) -> Arc<CallCoordinator> {
    member_with(
        id,
        channel,
        SyntheticCapture::new(),
        CoordinatorConfig::default(),
    )
    .await
}

async fn member_with(
    id: &str,
    channel: &Arc<InMemorySignalChannel>,
    capture: Arc<dyn MediaCapture>,
    config: CoordinatorConfig,
) -> Arc<CallCoordinator> {
    let media = Arc::new(MediaSessionManager::new(MediaConfig::default(), capture));
    let coordinator = CallCoordinator::new(
        MemberId::new(id),
        channel.clone() as Arc<dyn SignalChannel>,
        media,
        AlwaysGranted::new(),
        config,
    );
    coordinator.start().await.expect("coordinator start");
    coordinator
}

async fn wait_for<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if cond().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Scenario A: a video call from X to Y reaches active on both sides.
#[tokio::test]
async fn video_call_connects_both_sides() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Video)
        .await
        .expect("initiate");

    // The offer record opened the call with the right shape.
    let records = channel.records().await;
    let offer = records
        .iter()
        .find(|r| matches!(r.signal, Signal::Offer(_)))
        .expect("offer record");
    assert_eq!(offer.call_type, CallType::Video);
    assert_eq!(offer.status, CallStatus::Ringing);
    assert_eq!(offer.call_id, None);
    assert_eq!(offer.effective_call_id(), call_id);

    // Y sees the incoming call and answers it.
    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;
    let incoming = y.incoming_call().await.expect("incoming");
    assert_eq!(incoming.call_id, call_id);
    assert_eq!(incoming.caller_id, MemberId::new("member-x"));
    assert_eq!(incoming.call_type, CallType::Video);

    y.answer_call(call_id).await.expect("answer");

    // Both sides converge on active.
    wait_for("X active", || async {
        x.active_call().await.is_some_and(|c| c.is_active())
    })
    .await;
    let x_call = x.active_call().await.expect("x session");
    assert!(x_call.started_at.is_some());

    let y_call = y.active_call().await.expect("y session");
    assert!(y_call.is_active());

    // Local media exists on both sides; the originating record reflects
    // the active call.
    assert!(x.local_stream().await.is_some());
    assert!(y.local_stream().await.is_some());
    let records = channel.records().await;
    assert_eq!(records[0].status, CallStatus::Active);
    assert!(records
        .iter()
        .any(|r| matches!(r.signal, Signal::Answer(_))));

    x.end_call().await.expect("end");
    wait_for("Y idle after end", || async {
        y.active_call().await.is_none()
    })
    .await;
}

/// Scenario B: Y declines; X returns to idle without ever seeing remote
/// media.
#[tokio::test]
async fn declined_call_unwinds_the_caller() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");

    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;
    y.decline_call(call_id).await.expect("decline");

    wait_for("X idle after decline", || async {
        x.active_call().await.is_none()
    })
    .await;

    assert!(y.incoming_call().await.is_none());
    assert!(x.remote_stream().await.is_none());

    let records = channel.records().await;
    assert_eq!(records[0].status, CallStatus::Declined);
    let ends: Vec<_> = records
        .iter()
        .filter(|r| matches!(r.signal, Signal::End))
        .collect();
    // Only Y's decline published an end; X must not echo one back.
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].status, CallStatus::Declined);
    assert_eq!(ends[0].receiver_id, MemberId::new("member-x"));
}

/// Scenario C: mute toggling flips the audio track and reports the
/// muted state.
#[tokio::test]
async fn mute_toggles_round_trip() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");
    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;
    y.answer_call(call_id).await.expect("answer");

    let stream = x.local_stream().await.expect("local stream");
    assert!(stream.audio().expect("audio track").is_enabled());

    assert!(x.toggle_mute().await);
    assert!(x.is_muted().await);
    assert!(!stream.audio().expect("audio track").is_enabled());

    assert!(!x.toggle_mute().await);
    assert!(!x.is_muted().await);
    assert!(stream.audio().expect("audio track").is_enabled());
}

/// Capture that takes long enough to acquire that a hangup can arrive
/// mid-setup.
struct SlowCapture {
    inner: Arc<SyntheticCapture>,
    delay: Duration,
}

#[async_trait]
impl MediaCapture for SlowCapture {
    async fn acquire(&self, constraints: MediaConstraints) -> MediaResult<LocalMediaStream> {
        tokio::time::sleep(self.delay).await;
        self.inner.acquire(constraints).await
    }

    async fn switch_camera(&self, facing: CameraFacing) -> MediaResult<()> {
        self.inner.switch_camera(facing).await
    }
}

/// Scenario D: hanging up while initiate is still acquiring media
/// cancels the setup; the offer is never published and state is idle.
#[tokio::test]
async fn hangup_mid_setup_suppresses_the_offer() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member_with(
        "member-x",
        &channel,
        Arc::new(SlowCapture {
            inner: SyntheticCapture::new(),
            delay: Duration::from_millis(250),
        }),
        CoordinatorConfig::default(),
    )
    .await;

    let initiate = {
        let x = x.clone();
        tokio::spawn(async move {
            x.initiate_call(MemberId::new("member-y"), CallType::Audio)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    x.end_call().await.expect("end");

    let result = initiate.await.expect("join");
    assert!(matches!(result, Err(CallError::Canceled)));

    assert!(x.active_call().await.is_none());
    assert!(x.local_stream().await.is_none());
    assert!(channel.records().await.is_empty(), "offer must be suppressed");
}

/// Scenario E: permission denial rejects before any media or signaling
/// is touched.
#[tokio::test]
async fn permission_denial_aborts_before_signaling() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let media = Arc::new(MediaSessionManager::new(
        MediaConfig::default(),
        SyntheticCapture::new(),
    ));
    let x = CallCoordinator::new(
        MemberId::new("member-x"),
        channel.clone() as Arc<dyn SignalChannel>,
        media.clone(),
        DenyAll::new(),
        CoordinatorConfig::default(),
    );
    x.start().await.expect("start");

    let result = x
        .initiate_call(MemberId::new("member-y"), CallType::Video)
        .await;
    assert!(matches!(
        result,
        Err(CallError::Media(MediaError::AccessDenied { .. }))
    ));

    assert!(x.active_call().await.is_none());
    assert!(media.local_stream().await.is_none());
    assert!(!media.has_peer_connection().await);
    assert!(channel.records().await.is_empty());
}

/// `end_call` with nothing in flight is a safe no-op and publishes
/// nothing.
#[tokio::test]
async fn end_call_when_idle_is_a_noop() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;

    x.end_call().await.expect("end");
    x.end_call().await.expect("end twice");

    assert!(channel.records().await.is_empty());
    assert!(x.active_call().await.is_none());
}

/// A second offer while one incoming call is ringing is dropped: only
/// one incoming-call slot exists.
#[tokio::test]
async fn second_offer_while_ringing_is_dropped() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let z = member("member-z", &channel).await;
    let y = member("member-y", &channel).await;

    x.initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate from x");
    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;

    z.initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate from z");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let incoming = y.incoming_call().await.expect("incoming");
    assert_eq!(incoming.caller_id, MemberId::new("member-x"));
}

/// A remote hangup tears the callee down without echoing an end record.
#[tokio::test]
async fn remote_hangup_clears_incoming_without_echo() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    x.initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");
    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;

    x.end_call().await.expect("end");

    wait_for("Y incoming cleared", || async {
        y.incoming_call().await.is_none()
    })
    .await;

    let records = channel.records().await;
    let ends: Vec<_> = records
        .iter()
        .filter(|r| matches!(r.signal, Signal::End))
        .collect();
    assert_eq!(ends.len(), 1, "only the hangup side publishes an end");
    assert_eq!(ends[0].caller_id, MemberId::new("member-x"));
}

/// Incoming-call and state-change events reach subscribers.
#[tokio::test]
async fn call_events_are_broadcast() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    let mut y_events = y.subscribe_events();

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");

    let event = tokio::time::timeout(Duration::from_secs(5), y_events.next())
        .await
        .expect("event within timeout")
        .expect("stream open")
        .expect("no lag");
    match event {
        CallEvent::IncomingCall { call } => assert_eq!(call.call_id, call_id),
        other => panic!("expected IncomingCall, got {other:?}"),
    }

    y.answer_call(call_id).await.expect("answer");
    let event = tokio::time::timeout(Duration::from_secs(5), y_events.next())
        .await
        .expect("event within timeout")
        .expect("stream open")
        .expect("no lag");
    match event {
        CallEvent::CallStateChanged { call, previous } => {
            assert_eq!(call.call_id, call_id);
            assert_eq!(previous, CallStatus::Ringing);
            assert!(call.is_active());
        }
        other => panic!("expected CallStateChanged, got {other:?}"),
    }
}

/// An answer for a different call id is ignored; the tracked call keeps
/// ringing.
#[tokio::test]
async fn mismatched_call_ids_are_ignored() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let _y = member("member-y", &channel).await;

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");

    // Forge an end record for an unrelated call aimed at X.
    let unrelated = membercall_signal_core::SignalDraft::end(
        membercall_signal_core::CallId(uuid::Uuid::new_v4()),
        MemberId::new("member-y"),
        MemberId::new("member-x"),
        CallType::Audio,
        CallStatus::Ended,
    );
    channel.publish(unrelated).await.expect("publish");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let call = x.active_call().await.expect("still tracked");
    assert_eq!(call.call_id, call_id);
    assert!(call.is_ringing());
}

/// With a ring timeout configured, an unanswered outgoing call ends
/// itself and retracts the offer.
#[tokio::test]
async fn ring_timeout_ends_unanswered_call() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member_with(
        "member-x",
        &channel,
        SyntheticCapture::new(),
        CoordinatorConfig::default().with_ring_timeout(Duration::from_millis(200)),
    )
    .await;

    x.initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");
    assert!(x.active_call().await.is_some());

    wait_for("ring timeout fires", || async {
        x.active_call().await.is_none()
    })
    .await;

    let records = channel.records().await;
    assert!(records.iter().any(|r| matches!(r.signal, Signal::End)));
    assert_eq!(records[0].status, CallStatus::Ended);
}

/// Logout while a call is active ends the call and closes the
/// subscription.
#[tokio::test]
async fn stop_ends_the_call_and_unsubscribes() {
    init_tracing();
    let channel = InMemorySignalChannel::new();
    let x = member("member-x", &channel).await;
    let y = member("member-y", &channel).await;

    let call_id = x
        .initiate_call(MemberId::new("member-y"), CallType::Audio)
        .await
        .expect("initiate");
    wait_for("incoming call at Y", || async {
        y.incoming_call().await.is_some()
    })
    .await;
    y.answer_call(call_id).await.expect("answer");

    x.stop().await;
    x.stop().await; // idempotent

    assert!(x.active_call().await.is_none());
    wait_for("Y idle after X logout", || async {
        y.active_call().await.is_none()
    })
    .await;
}
