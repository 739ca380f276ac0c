//! Media session configuration

use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;

/// Which physical camera a video track should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

/// Audio capture processing requested from the device layer.
#[derive(Debug, Clone, Copy)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Target resolution, frame rate and facing for video capture.
#[derive(Debug, Clone, Copy)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: CameraFacing,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
            facing: CameraFacing::Front,
        }
    }
}

/// What to request from the capture layer for one call.
#[derive(Debug, Clone, Copy)]
pub struct MediaConstraints {
    pub audio: AudioConstraints,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    pub fn audio_only(audio: AudioConstraints) -> Self {
        Self { audio, video: None }
    }

    pub fn audio_video(audio: AudioConstraints, video: VideoConstraints) -> Self {
        Self {
            audio,
            video: Some(video),
        }
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

/// One ICE server entry (STUN; TURN credentials optional).
#[derive(Debug, Clone)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Configuration for a [`MediaSessionManager`](crate::MediaSessionManager).
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// ICE servers used for candidate gathering. Defaults to a fixed
    /// set of public STUN servers; no TURN fallback is configured, so
    /// calls across symmetric NATs may fail to connect.
    pub ice_servers: Vec<IceServerConfig>,
    /// Default audio processing constraints.
    pub audio: AudioConstraints,
    /// Default video constraints for video calls.
    pub video: VideoConstraints,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![
                    "stun:stun.l.google.com:19302".to_string(),
                    "stun:stun1.l.google.com:19302".to_string(),
                ],
                username: None,
                credential: None,
            }],
            audio: AudioConstraints::default(),
            video: VideoConstraints::default(),
        }
    }
}

impl MediaConfig {
    /// Replace the ICE server list.
    pub fn with_ice_servers(mut self, servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = servers;
        self
    }

    /// Replace the default video constraints.
    pub fn with_video(mut self, video: VideoConstraints) -> Self {
        self.video = video;
        self
    }

    /// The constraint set for a call, honoring the current camera
    /// facing.
    pub fn constraints_for(&self, video_call: bool, facing: CameraFacing) -> MediaConstraints {
        if video_call {
            MediaConstraints::audio_video(self.audio, VideoConstraints { facing, ..self.video })
        } else {
            MediaConstraints::audio_only(self.audio)
        }
    }

    pub(crate) fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}
