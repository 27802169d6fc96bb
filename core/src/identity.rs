//! Stable per-install and per-session identifiers.

use crate::state::DEVICE_ID_KEY;
use crate::state::StateStore;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Produces the persisted device identifier and fresh session identifiers.
///
/// The device identifier is analytics-grade: storage writes are
/// fire-and-forget and a lost write simply means a new identifier on the
/// next run.
pub struct IdentityProvider {
    store: Arc<dyn StateStore>,
    // Guards the read-create-write cycle against concurrent first calls.
    create_lock: Mutex<()>,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    /// Returns the persisted device identifier, generating and persisting a
    /// lowercase v4 UUID on first call.
    pub fn get_or_create_device_id(&self) -> String {
        let _guard = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.store.get(DEVICE_ID_KEY) {
            return existing;
        }
        let id = Uuid::new_v4().to_string();
        self.store.set(DEVICE_ID_KEY, &id);
        debug!(device_id = %id, "generated device identifier");
        id
    }

    /// Fresh lowercase v4 UUID on every call, never persisted.
    pub fn new_session_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn device_id_is_stable_across_calls() {
        let provider = IdentityProvider::new(Arc::new(MemoryStateStore::new()));
        let first = provider.get_or_create_device_id();
        let second = provider.get_or_create_device_id();
        assert_eq!(first, second);
        assert_eq!(first, first.to_lowercase());
    }

    #[test]
    fn device_id_survives_provider_recreation() {
        let store = Arc::new(MemoryStateStore::new());
        let first = IdentityProvider::new(store.clone()).get_or_create_device_id();
        let second = IdentityProvider::new(store).get_or_create_device_id();
        assert_eq!(first, second);
    }

    #[test]
    fn session_ids_are_fresh() {
        let provider = IdentityProvider::new(Arc::new(MemoryStateStore::new()));
        let a = provider.new_session_id();
        let b = provider.new_session_id();
        assert_ne!(a, b);
        assert_eq!(a, a.to_lowercase());
    }
}
