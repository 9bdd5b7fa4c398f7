//! Cloud AI consent flag

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Whether the user has opted in to sending breakdown requests to the cloud
pub trait ConsentStore: Send + Sync {
    fn is_cloud_ai_enabled(&self) -> bool;
    fn set_cloud_ai_enabled(&self, enabled: bool);
}

#[derive(Debug, Default)]
pub struct InMemoryConsentStore {
    enabled: AtomicBool,
}

impl InMemoryConsentStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl ConsentStore for InMemoryConsentStore {
    fn is_cloud_ai_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_cloud_ai_enabled(&self, enabled: bool) {
        debug!(%enabled, "InMemoryConsentStore::set_cloud_ai_enabled: called");
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}
