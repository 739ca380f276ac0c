//! Local and remote media stream handles
//!
//! A stream is a bundle of tracks plus the per-track enabled/stopped
//! flags the call controls flip. Local tracks wrap
//! [`TrackLocalStaticSample`] so any capture source can push encoded
//! samples into them; remote tracks are handed over verbatim from the
//! peer connection as they arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One locally produced track and its control flags.
///
/// `enabled` is the mute/video-off switch: sample sources must stop
/// pushing while it is false. `stopped` is terminal and set by
/// [`LocalMediaStream::stop`]; sources must exit once they observe it.
pub struct LocalTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            track,
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// The underlying track, for attaching to a peer connection or
    /// writing samples.
    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Shared enabled flag for sample-pump tasks.
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    /// Shared stop flag for sample-pump tasks.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// The set of locally captured tracks for one call.
#[derive(Debug, Default)]
pub struct LocalMediaStream {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
}

impl LocalMediaStream {
    pub fn new(audio: Option<LocalTrack>, video: Option<LocalTrack>) -> Self {
        Self { audio, video }
    }

    pub fn audio(&self) -> Option<&LocalTrack> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&LocalTrack> {
        self.video.as_ref()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        self.audio.iter().chain(self.video.iter())
    }

    /// Stop every track. Idempotent.
    pub fn stop(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }
}

/// Remote tracks received from the peer, accumulated as they arrive.
#[derive(Default)]
pub struct RemoteMediaStream {
    tracks: Mutex<Vec<Arc<TrackRemote>>>,
}

impl RemoteMediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, track: Arc<TrackRemote>) {
        self.tracks.lock().expect("remote track list poisoned").push(track);
    }

    pub fn tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.tracks.lock().expect("remote track list poisoned").clone()
    }

    pub fn audio(&self) -> Option<Arc<TrackRemote>> {
        self.tracks()
            .into_iter()
            .find(|t| t.kind() == RTPCodecType::Audio)
    }

    pub fn video(&self) -> Option<Arc<TrackRemote>> {
        self.tracks()
            .into_iter()
            .find(|t| t.kind() == RTPCodecType::Video)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.lock().expect("remote track list poisoned").is_empty()
    }
}

impl std::fmt::Debug for RemoteMediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMediaStream")
            .field("track_count", &self.tracks().len())
            .finish()
    }
}
