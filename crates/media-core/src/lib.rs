//! # membercall-media-core
//!
//! WebRTC media session management: local/remote stream lifecycle, the
//! peer connection, SDP offer/answer generation, ICE application, and
//! the in-call media controls (mute, video toggle, camera switch,
//! speaker hint).
//!
//! [`MediaSessionManager`] is the single owner of capture devices and
//! the peer connection; no other component holds a reference that
//! outlives its [`cleanup`](MediaSessionManager::cleanup). Device
//! access itself is injected behind the [`MediaCapture`] trait so the
//! platform capture stack (or a synthetic source, for tests and
//! headless use) is swappable.

pub mod capture;
pub mod config;
pub mod error;
pub mod session;
pub mod stream;

pub use capture::{DeniedCapture, MediaCapture, SyntheticCapture};
pub use config::{
    AudioConstraints, CameraFacing, IceServerConfig, MediaConfig, MediaConstraints,
    VideoConstraints,
};
pub use error::{MediaError, MediaResult};
pub use session::{ConnectionState, MediaSessionListeners, MediaSessionManager};
pub use stream::{LocalMediaStream, LocalTrack, RemoteMediaStream, TrackKind};
