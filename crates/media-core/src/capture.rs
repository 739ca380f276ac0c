//! Device capture seam
//!
//! OS-level capture (microphone/camera access, audio routing) is
//! platform glue that lives outside this crate, so it is injected
//! behind the [`MediaCapture`] trait. The crate ships
//! [`SyntheticCapture`], a source that produces silence/black-frame
//! tracks; it backs the test suite, the examples, and headless
//! deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::interval;
use tracing::trace;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::config::{CameraFacing, MediaConstraints};
use crate::error::{MediaError, MediaResult};
use crate::stream::{LocalMediaStream, LocalTrack, TrackKind};

/// Source of local media tracks and sink for device-level hints.
///
/// Implementations own the actual devices. `acquire` is where
/// [`MediaError::AccessDenied`] originates when the platform refuses
/// camera/microphone access or no device exists.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Open capture devices per the constraints and return the local
    /// track set.
    async fn acquire(&self, constraints: MediaConstraints) -> MediaResult<LocalMediaStream>;

    /// Swap the physical camera feeding the existing video track.
    async fn switch_camera(&self, facing: CameraFacing) -> MediaResult<()>;

    /// Route audio output to the loudspeaker (or back). Best-effort:
    /// platforms that auto-route may treat this as a no-op.
    async fn set_speaker_route(&self, _speaker: bool) -> MediaResult<()> {
        Ok(())
    }

    /// Release any devices still held. Called during teardown; must not
    /// fail.
    async fn release(&self) {}
}

/// Capture source producing synthetic media: Opus-framed silence and
/// VP8-framed black frames, pushed into the tracks on their nominal
/// frame cadence. Sample pumps respect the per-track enabled flag and
/// exit when the track is stopped.
pub struct SyntheticCapture;

impl SyntheticCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }

    fn audio_track() -> LocalTrack {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_string(),
            "membercall".to_string(),
        ));
        LocalTrack::new(TrackKind::Audio, track)
    }

    fn video_track() -> LocalTrack {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                ..Default::default()
            },
            "video".to_string(),
            "membercall".to_string(),
        ));
        LocalTrack::new(TrackKind::Video, track)
    }

    fn spawn_pump(track: &LocalTrack, payload: Vec<u8>, frame: Duration) {
        let rtc_track = track.rtc_track();
        let stopped = track.stop_flag();
        let enabled_flag = track.enabled_flag();

        tokio::spawn(async move {
            let mut ticker = interval(frame);
            let data = Bytes::from(payload);
            loop {
                ticker.tick().await;
                if stopped.load(std::sync::atomic::Ordering::SeqCst) {
                    trace!("sample pump exiting, track stopped");
                    break;
                }
                if !enabled_flag.load(std::sync::atomic::Ordering::SeqCst) {
                    continue;
                }
                // Writes before the track is bound to a connection are
                // no-ops; errors after teardown are expected and ignored.
                let _ = rtc_track
                    .write_sample(&Sample {
                        data: data.clone(),
                        duration: frame,
                        ..Default::default()
                    })
                    .await;
            }
        });
    }
}

#[async_trait]
impl MediaCapture for SyntheticCapture {
    async fn acquire(&self, constraints: MediaConstraints) -> MediaResult<LocalMediaStream> {
        let audio = Self::audio_track();
        Self::spawn_pump(&audio, vec![0u8; 120], Duration::from_millis(20));

        let video = if let Some(video_constraints) = constraints.video {
            let track = Self::video_track();
            let frame_ms = (1000 / u64::from(video_constraints.frame_rate.max(1))).max(1);
            Self::spawn_pump(&track, vec![0u8; 256], Duration::from_millis(frame_ms));
            Some(track)
        } else {
            None
        };

        Ok(LocalMediaStream::new(Some(audio), video))
    }

    async fn switch_camera(&self, facing: CameraFacing) -> MediaResult<()> {
        // Synthetic frames look the same from either "camera".
        trace!(?facing, "synthetic capture camera switch");
        Ok(())
    }
}

/// Capture source that always refuses access, for exercising the
/// permission-denied paths.
pub struct DeniedCapture;

impl DeniedCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl MediaCapture for DeniedCapture {
    async fn acquire(&self, _constraints: MediaConstraints) -> MediaResult<LocalMediaStream> {
        Err(MediaError::access_denied("capture device unavailable"))
    }

    async fn switch_camera(&self, _facing: CameraFacing) -> MediaResult<()> {
        Err(MediaError::camera_switch("no capture device"))
    }
}
