//! OS permission gate
//!
//! Camera/microphone capability checks are platform glue, modeled as a
//! single async request the coordinator calls before any media
//! acquisition. A refusal aborts call setup before devices or signaling
//! are touched.

use async_trait::async_trait;
use std::sync::Arc;

/// Capability check/request for camera + microphone access.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Request the permissions a call of this kind needs. Returns
    /// whether they were granted.
    async fn request_permissions(&self, video: bool) -> bool;
}

/// Gate that always grants. Suits platforms where permissions are
/// handled before the coordinator is constructed, and tests.
pub struct AlwaysGranted;

impl AlwaysGranted {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_permissions(&self, _video: bool) -> bool {
        true
    }
}

/// Gate that always refuses, for exercising denial paths.
pub struct DenyAll;

impl DenyAll {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl PermissionGate for DenyAll {
    async fn request_permissions(&self, _video: bool) -> bool {
        false
    }
}
