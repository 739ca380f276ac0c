//! WebRTC session management
//!
//! [`MediaSessionManager`] is the only component allowed to touch
//! capture devices or the peer connection. It owns the local and remote
//! stream lifecycle, creates offers and answers, applies remote
//! descriptions and ICE candidates, exposes the in-call media controls,
//! and tears everything down through a single idempotent [`cleanup`]
//! path.
//!
//! [`cleanup`]: MediaSessionManager::cleanup

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

use membercall_signal_core::{IceCandidateInit, SessionDescription};

use crate::capture::MediaCapture;
use crate::config::{CameraFacing, MediaConfig};
use crate::error::{MediaError, MediaResult};
use crate::stream::{LocalMediaStream, RemoteMediaStream};

/// Connection lifecycle as observed from the underlying transport.
///
/// The manager surfaces these through the `on_connection_state_change`
/// listener; policy (warn vs. tear down) belongs to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    fn from_rtc(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::New => Some(ConnectionState::New),
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            RTCPeerConnectionState::Unspecified => None,
        }
    }

    /// Whether this state indicates lost connectivity.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

/// The callback set a consumer registers on the manager.
///
/// Registration is last-writer-wins: a new set replaces the previous
/// one wholesale. The manager is a single-consumer contract: one
/// coordinator per manager instance.
#[derive(Clone)]
pub struct MediaSessionListeners {
    pub on_local_stream: Arc<dyn Fn(Arc<LocalMediaStream>) + Send + Sync>,
    pub on_remote_stream: Arc<dyn Fn(Arc<RemoteMediaStream>) + Send + Sync>,
    pub on_ice_candidate: Arc<dyn Fn(IceCandidateInit) + Send + Sync>,
    pub on_connection_state_change: Arc<dyn Fn(ConnectionState) + Send + Sync>,
}

impl Default for MediaSessionListeners {
    fn default() -> Self {
        Self {
            on_local_stream: Arc::new(|_| {}),
            on_remote_stream: Arc::new(|_| {}),
            on_ice_candidate: Arc::new(|_| {}),
            on_connection_state_change: Arc::new(|_| {}),
        }
    }
}

impl std::fmt::Debug for MediaSessionListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionListeners").finish()
    }
}

struct SessionInner {
    local: Option<Arc<LocalMediaStream>>,
    pc: Option<Arc<RTCPeerConnection>>,
    is_front_camera: bool,
    is_speaker_enabled: bool,
}

impl SessionInner {
    fn empty() -> Self {
        Self {
            local: None,
            pc: None,
            is_front_camera: true,
            is_speaker_enabled: false,
        }
    }
}

/// Owner of all local/remote media state for one call at a time.
///
/// All async I/O results are guarded by an epoch counter bumped on
/// [`cleanup`](Self::cleanup): anything that lands after teardown has
/// run (a late capture result, a straggling ICE callback) is discarded
/// rather than applied to a stale session.
pub struct MediaSessionManager {
    config: MediaConfig,
    capture: Arc<dyn MediaCapture>,
    inner: Mutex<SessionInner>,
    remote: Arc<Mutex<Option<Arc<RemoteMediaStream>>>>,
    listeners: Arc<RwLock<MediaSessionListeners>>,
    epoch: Arc<AtomicU64>,
}

impl MediaSessionManager {
    pub fn new(config: MediaConfig, capture: Arc<dyn MediaCapture>) -> Self {
        Self {
            config,
            capture,
            inner: Mutex::new(SessionInner::empty()),
            remote: Arc::new(Mutex::new(None)),
            listeners: Arc::new(RwLock::new(MediaSessionListeners::default())),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the registered callback set (last-writer-wins).
    pub async fn set_listeners(&self, listeners: MediaSessionListeners) {
        *self.listeners.write().await = listeners;
    }

    /// Request microphone (and camera for video calls) access and store
    /// the resulting local stream.
    ///
    /// Fails with [`MediaError::AccessDenied`] when the platform
    /// refuses; the caller must not proceed to signaling in that case.
    pub async fn initialize_media_stream(
        &self,
        video: bool,
    ) -> MediaResult<Arc<LocalMediaStream>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let facing = self.inner.lock().await.is_front_camera;
        let constraints = self.config.constraints_for(
            video,
            if facing {
                CameraFacing::Front
            } else {
                CameraFacing::Back
            },
        );

        let stream = Arc::new(self.capture.acquire(constraints).await?);

        let mut inner = self.inner.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            drop(inner);
            stream.stop();
            return Err(MediaError::invalid_state(
                "session torn down during media acquisition",
            ));
        }
        inner.local = Some(Arc::clone(&stream));
        drop(inner);

        info!(video, "local media stream initialized");
        (self.listeners.read().await.on_local_stream)(Arc::clone(&stream));
        Ok(stream)
    }

    /// Lazily create the peer connection, attach all local tracks, and
    /// wire the internal event sinks. Idempotent: a second call while a
    /// connection exists is a no-op.
    pub async fn create_peer_connection(&self) -> MediaResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.pc.is_some() {
            return Ok(());
        }

        let api = build_api()?;
        let pc = Arc::new(
            api.new_peer_connection(self.config.rtc_configuration())
                .await?,
        );

        if let Some(local) = &inner.local {
            for track in local.tracks() {
                pc.add_track(track.rtc_track() as Arc<dyn TrackLocal + Send + Sync>)
                    .await?;
            }
        }

        let epoch = self.epoch.load(Ordering::SeqCst);

        {
            let listeners = Arc::clone(&self.listeners);
            let epoch_ref = Arc::clone(&self.epoch);
            pc.on_ice_candidate(Box::new(move |candidate| {
                let listeners = Arc::clone(&listeners);
                let epoch_ref = Arc::clone(&epoch_ref);
                Box::pin(async move {
                    let Some(candidate) = candidate else { return };
                    if epoch_ref.load(Ordering::SeqCst) != epoch {
                        debug!("discarding ICE candidate from torn-down session");
                        return;
                    }
                    match candidate.to_json() {
                        Ok(init) => {
                            (listeners.read().await.on_ice_candidate)(from_rtc_candidate(init));
                        }
                        Err(e) => warn!("failed to serialize ICE candidate: {}", e),
                    }
                })
            }));
        }

        {
            let listeners = Arc::clone(&self.listeners);
            let epoch_ref = Arc::clone(&self.epoch);
            let remote = Arc::clone(&self.remote);
            pc.on_track(Box::new(move |track, _receiver, _transceiver| {
                let listeners = Arc::clone(&listeners);
                let epoch_ref = Arc::clone(&epoch_ref);
                let remote = Arc::clone(&remote);
                Box::pin(async move {
                    if epoch_ref.load(Ordering::SeqCst) != epoch {
                        debug!("discarding remote track from torn-down session");
                        return;
                    }
                    debug!(kind = ?track.kind(), "remote track received");
                    let stream = {
                        let mut slot = remote.lock().await;
                        let stream = slot
                            .get_or_insert_with(|| Arc::new(RemoteMediaStream::new()))
                            .clone();
                        stream.push(track);
                        stream
                    };
                    (listeners.read().await.on_remote_stream)(stream);
                })
            }));
        }

        {
            let listeners = Arc::clone(&self.listeners);
            let epoch_ref = Arc::clone(&self.epoch);
            pc.on_peer_connection_state_change(Box::new(move |state| {
                let listeners = Arc::clone(&listeners);
                let epoch_ref = Arc::clone(&epoch_ref);
                Box::pin(async move {
                    let Some(state) = ConnectionState::from_rtc(state) else {
                        return;
                    };
                    if epoch_ref.load(Ordering::SeqCst) != epoch {
                        return;
                    }
                    debug!(?state, "peer connection state changed");
                    (listeners.read().await.on_connection_state_change)(state);
                })
            }));
        }

        inner.pc = Some(pc);
        debug!("peer connection created");
        Ok(())
    }

    /// Generate an SDP offer and set it as the local description.
    ///
    /// The offer proposes to receive audio always, and video only when
    /// the local stream carries a video track (track set drives the SDP
    /// media sections). Fails with [`MediaError::Negotiation`] when no
    /// local stream was initialized first.
    pub async fn create_offer(&self) -> MediaResult<SessionDescription> {
        if self.inner.lock().await.local.is_none() {
            return Err(MediaError::negotiation(
                "local media stream not initialized",
            ));
        }
        self.create_peer_connection().await?;
        let pc = self.require_pc().await?;

        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| MediaError::negotiation(format!("create_offer failed: {e}")))?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(|e| MediaError::negotiation(format!("set_local_description failed: {e}")))?;

        debug!("created SDP offer");
        Ok(from_rtc_description(&offer))
    }

    /// Apply a remote offer and generate, set, and return the local
    /// answer.
    pub async fn create_answer(
        &self,
        remote_offer: SessionDescription,
    ) -> MediaResult<SessionDescription> {
        self.create_peer_connection().await?;
        let pc = self.require_pc().await?;

        pc.set_remote_description(to_rtc_description(&remote_offer)?)
            .await
            .map_err(|e| MediaError::negotiation(format!("applying remote offer failed: {e}")))?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| MediaError::negotiation(format!("create_answer failed: {e}")))?;
        pc.set_local_description(answer.clone())
            .await
            .map_err(|e| MediaError::negotiation(format!("set_local_description failed: {e}")))?;

        debug!("created SDP answer");
        Ok(from_rtc_description(&answer))
    }

    /// Apply a received answer to the existing peer connection.
    ///
    /// Fails with [`MediaError::InvalidState`] when called before an
    /// offer was created or before a peer connection exists.
    pub async fn set_remote_description(&self, sdp: SessionDescription) -> MediaResult<()> {
        let pc = self.require_pc().await?;
        if pc.local_description().await.is_none() {
            return Err(MediaError::invalid_state(
                "no local offer to pair the answer with",
            ));
        }
        pc.set_remote_description(to_rtc_description(&sdp)?)
            .await
            .map_err(|e| MediaError::negotiation(format!("applying remote answer failed: {e}")))?;
        debug!("remote description applied");
        Ok(())
    }

    /// Apply one ICE candidate.
    ///
    /// Tolerant of races by design: a missing peer connection, a null
    /// candidate, or a malformed candidate is logged and ignored so
    /// that late-arriving candidates after teardown can never crash a
    /// call path.
    pub async fn add_ice_candidate(&self, candidate: Option<IceCandidateInit>) {
        let Some(candidate) = candidate else {
            debug!("ignoring null ICE candidate");
            return;
        };
        let pc = {
            let inner = self.inner.lock().await;
            inner.pc.clone()
        };
        let Some(pc) = pc else {
            debug!("ignoring ICE candidate, no peer connection");
            return;
        };
        if let Err(e) = pc.add_ice_candidate(to_rtc_candidate(candidate)).await {
            warn!("failed to apply ICE candidate, ignoring: {}", e);
        }
    }

    /// Flip the enabled flag on the active audio track.
    ///
    /// Returns the resulting *muted* state. No-op returning `false`
    /// when no local stream exists.
    pub async fn toggle_mute(&self) -> bool {
        let inner = self.inner.lock().await;
        match inner.local.as_ref().and_then(|l| l.audio()) {
            Some(track) => {
                let enabled = !track.is_enabled();
                track.set_enabled(enabled);
                debug!(muted = !enabled, "audio track toggled");
                !enabled
            }
            None => false,
        }
    }

    /// Flip the enabled flag on the active video track.
    ///
    /// Returns the resulting enabled state. No-op returning `false`
    /// when no video track exists.
    pub async fn toggle_video(&self) -> bool {
        let inner = self.inner.lock().await;
        match inner.local.as_ref().and_then(|l| l.video()) {
            Some(track) => {
                let enabled = !track.is_enabled();
                track.set_enabled(enabled);
                debug!(enabled, "video track toggled");
                enabled
            }
            None => false,
        }
    }

    /// Flip the camera facing and ask the capture layer to swap the
    /// physical feed on the existing video track.
    ///
    /// Returns the new front-camera flag. Fails with
    /// [`MediaError::CameraSwitch`] when no video track is present or
    /// the device swap fails; the session keeps the prior camera.
    pub async fn switch_camera(&self) -> MediaResult<bool> {
        let mut inner = self.inner.lock().await;
        let has_video = inner.local.as_ref().map_or(false, |l| l.has_video());
        if !has_video {
            return Err(MediaError::camera_switch("no active video track"));
        }

        let target = if inner.is_front_camera {
            CameraFacing::Back
        } else {
            CameraFacing::Front
        };
        self.capture
            .switch_camera(target)
            .await
            .map_err(|e| MediaError::camera_switch(e.to_string()))?;

        inner.is_front_camera = !inner.is_front_camera;
        info!(front = inner.is_front_camera, "camera switched");
        Ok(inner.is_front_camera)
    }

    /// Best-effort audio route hint. Platforms that auto-route audio
    /// treat this as a no-op; an unsupported route never fails the
    /// call. Returns the stored speaker flag.
    pub async fn enable_speaker(&self, enable: bool) -> bool {
        if let Err(e) = self.capture.set_speaker_route(enable).await {
            debug!("speaker route hint not supported: {}", e);
        }
        let mut inner = self.inner.lock().await;
        inner.is_speaker_enabled = enable;
        enable
    }

    /// Stop every local track, close the peer connection, and clear all
    /// internal state and listener references.
    ///
    /// This is the failure-containment path every call termination
    /// routes through: it never fails, is safe to call repeatedly and
    /// from any state, and bumps the session epoch so in-flight results
    /// land in the void instead of a stale session.
    pub async fn cleanup(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let (local, pc) = {
            let mut inner = self.inner.lock().await;
            let local = inner.local.take();
            let pc = inner.pc.take();
            *inner = SessionInner::empty();
            (local, pc)
        };

        if let Some(local) = local {
            local.stop();
        }
        if let Some(pc) = pc {
            if let Err(e) = pc.close().await {
                debug!("error closing peer connection during cleanup: {}", e);
            }
        }

        *self.remote.lock().await = None;
        self.capture.release().await;
        *self.listeners.write().await = MediaSessionListeners::default();

        debug!("media session cleaned up");
    }

    /// The current local stream, if one is initialized.
    pub async fn local_stream(&self) -> Option<Arc<LocalMediaStream>> {
        self.inner.lock().await.local.clone()
    }

    /// The remote stream, once at least one remote track has arrived.
    pub async fn remote_stream(&self) -> Option<Arc<RemoteMediaStream>> {
        self.remote.lock().await.clone()
    }

    /// Whether the front camera is selected.
    pub async fn is_front_camera(&self) -> bool {
        self.inner.lock().await.is_front_camera
    }

    /// Whether the loudspeaker route is requested.
    pub async fn is_speaker_enabled(&self) -> bool {
        self.inner.lock().await.is_speaker_enabled
    }

    /// Whether a peer connection currently exists.
    pub async fn has_peer_connection(&self) -> bool {
        self.inner.lock().await.pc.is_some()
    }

    async fn require_pc(&self) -> MediaResult<Arc<RTCPeerConnection>> {
        self.inner
            .lock()
            .await
            .pc
            .clone()
            .ok_or_else(|| MediaError::invalid_state("no peer connection"))
    }
}

impl std::fmt::Debug for MediaSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionManager")
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish()
    }
}

fn build_api() -> MediaResult<API> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

fn from_rtc_description(desc: &RTCSessionDescription) -> SessionDescription {
    SessionDescription {
        sdp_type: desc.sdp_type.to_string(),
        sdp: desc.sdp.clone(),
    }
}

fn to_rtc_description(desc: &SessionDescription) -> MediaResult<RTCSessionDescription> {
    let result = match desc.sdp_type.as_str() {
        "offer" => RTCSessionDescription::offer(desc.sdp.clone()),
        "answer" => RTCSessionDescription::answer(desc.sdp.clone()),
        "pranswer" => RTCSessionDescription::pranswer(desc.sdp.clone()),
        other => {
            return Err(MediaError::negotiation(format!(
                "unsupported SDP type: {other}"
            )))
        }
    };
    result.map_err(|e| MediaError::negotiation(format!("malformed SDP: {e}")))
}

fn to_rtc_candidate(init: IceCandidateInit) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidateInit {
    IceCandidateInit {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeniedCapture, SyntheticCapture};

    fn manager() -> MediaSessionManager {
        MediaSessionManager::new(MediaConfig::default(), SyntheticCapture::new())
    }

    #[tokio::test]
    async fn toggle_mute_without_stream_is_noop() {
        let manager = manager();
        assert!(!manager.toggle_mute().await);
    }

    #[tokio::test]
    async fn toggle_mute_flips_audio_track_enabled() {
        let manager = manager();
        let stream = manager.initialize_media_stream(false).await.unwrap();

        assert!(stream.audio().unwrap().is_enabled());
        assert!(manager.toggle_mute().await);
        assert!(!stream.audio().unwrap().is_enabled());
        assert!(!manager.toggle_mute().await);
        assert!(stream.audio().unwrap().is_enabled());
    }

    #[tokio::test]
    async fn create_offer_without_media_is_a_negotiation_error() {
        let manager = manager();
        let result = manager.create_offer().await;
        assert!(matches!(result, Err(MediaError::Negotiation { .. })));
    }

    #[tokio::test]
    async fn switch_camera_without_video_fails() {
        let manager = manager();
        manager.initialize_media_stream(false).await.unwrap();
        let result = manager.switch_camera().await;
        assert!(matches!(result, Err(MediaError::CameraSwitch { .. })));
    }

    #[tokio::test]
    async fn switch_camera_flips_facing_flag() {
        let manager = manager();
        manager.initialize_media_stream(true).await.unwrap();

        assert!(manager.is_front_camera().await);
        assert!(!manager.switch_camera().await.unwrap());
        assert!(manager.switch_camera().await.unwrap());
    }

    #[tokio::test]
    async fn access_denied_propagates_from_capture() {
        let manager = MediaSessionManager::new(MediaConfig::default(), DeniedCapture::new());
        let result = manager.initialize_media_stream(false).await;
        assert!(matches!(result, Err(MediaError::AccessDenied { .. })));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_from_any_state() {
        let manager = manager();
        // Before anything exists.
        manager.cleanup().await;
        manager.cleanup().await;

        manager.initialize_media_stream(true).await.unwrap();
        manager.create_peer_connection().await.unwrap();

        manager.cleanup().await;
        manager.cleanup().await;

        assert!(manager.local_stream().await.is_none());
        assert!(manager.remote_stream().await.is_none());
        assert!(!manager.has_peer_connection().await);
    }

    #[tokio::test]
    async fn cleanup_stops_local_tracks() {
        let manager = manager();
        let stream = manager.initialize_media_stream(false).await.unwrap();
        assert!(!stream.audio().unwrap().is_stopped());

        manager.cleanup().await;
        assert!(stream.audio().unwrap().is_stopped());
    }

    #[tokio::test]
    async fn add_ice_candidate_without_connection_is_tolerated() {
        let manager = manager();
        manager.add_ice_candidate(None).await;
        manager
            .add_ice_candidate(Some(IceCandidateInit {
                candidate: "candidate:1 1 UDP 2122260223 192.0.2.1 54321 typ host".to_string(),
                ..Default::default()
            }))
            .await;
    }

    #[tokio::test]
    async fn create_peer_connection_is_idempotent() {
        let manager = manager();
        manager.initialize_media_stream(false).await.unwrap();
        manager.create_peer_connection().await.unwrap();
        manager.create_peer_connection().await.unwrap();
        assert!(manager.has_peer_connection().await);
    }

    #[tokio::test]
    async fn offer_answer_exchange_between_two_managers() {
        let caller = manager();
        let callee = manager();

        caller.initialize_media_stream(false).await.unwrap();
        callee.initialize_media_stream(false).await.unwrap();

        let offer = caller.create_offer().await.unwrap();
        assert_eq!(offer.sdp_type, "offer");
        assert!(offer.sdp.contains("v=0"));

        let answer = callee.create_answer(offer).await.unwrap();
        assert_eq!(answer.sdp_type, "answer");

        caller.set_remote_description(answer).await.unwrap();

        caller.cleanup().await;
        callee.cleanup().await;
    }

    #[tokio::test]
    async fn set_remote_description_before_offer_is_invalid_state() {
        let manager = manager();
        let result = manager
            .set_remote_description(SessionDescription::answer("v=0\r\n"))
            .await;
        assert!(matches!(result, Err(MediaError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn media_acquired_after_cleanup_is_discarded() {
        use crate::capture::MediaCapture;
        use crate::config::MediaConstraints;
        use async_trait::async_trait;

        struct SlowCapture(Arc<SyntheticCapture>);

        #[async_trait]
        impl MediaCapture for SlowCapture {
            async fn acquire(
                &self,
                constraints: MediaConstraints,
            ) -> MediaResult<LocalMediaStream> {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                self.0.acquire(constraints).await
            }

            async fn switch_camera(&self, facing: CameraFacing) -> MediaResult<()> {
                self.0.switch_camera(facing).await
            }
        }

        let manager = Arc::new(MediaSessionManager::new(
            MediaConfig::default(),
            Arc::new(SlowCapture(SyntheticCapture::new())),
        ));

        let init = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize_media_stream(false).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        manager.cleanup().await;

        let result = init.await.unwrap();
        assert!(matches!(result, Err(MediaError::InvalidState { .. })));
        assert!(manager.local_stream().await.is_none());
    }

    #[tokio::test]
    async fn enable_speaker_never_fails() {
        let manager = manager();
        assert!(manager.enable_speaker(true).await);
        assert!(manager.is_speaker_enabled().await);
        assert!(!manager.enable_speaker(false).await);
        assert!(!manager.is_speaker_enabled().await);
    }
}
