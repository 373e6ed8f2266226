use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PlayerResult;

/// One key system the embedder is willing to use.
#[derive(Clone, Debug)]
pub struct KeySystemConfig {
    /// Key system identifier, e.g. `com.widevine.alpha`.
    pub key_system: String,
    pub license_server_url: Option<String>,
}

/// Status updates for content keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    Usable,
    Expired,
    /// Unrecoverable: the session reported the key unusable.
    InternalError(String),
}

/// An active DRM session, owned by the controller, lifetime = content.
///
/// Replaces any module-scoped key-system state: the controller creates one
/// session per load and drops it on stop.
pub trait DrmSession: Send + Sync {
    /// Stream of key status updates. Fatal statuses propagate to the
    /// controller as key errors.
    fn key_statuses(&mut self) -> mpsc::UnboundedReceiver<KeyStatus>;
}

/// Creates DRM sessions. Implemented by the DRM collaborator.
#[async_trait]
pub trait DrmProvider: Send + Sync {
    async fn init(&self, key_systems: &[KeySystemConfig]) -> PlayerResult<Box<dyn DrmSession>>;
}

/// Provider for unencrypted content: yields sessions that never report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDrmProvider;

struct NoopSession;

impl DrmSession for NoopSession {
    fn key_statuses(&mut self) -> mpsc::UnboundedReceiver<KeyStatus> {
        // Sender dropped: the receiver stays silent forever.
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

#[async_trait]
impl DrmProvider for NoopDrmProvider {
    async fn init(&self, _key_systems: &[KeySystemConfig]) -> PlayerResult<Box<dyn DrmSession>> {
        Ok(Box::new(NoopSession))
    }
}
