use crate::error::CredentialError;
use crate::interfaces::CredentialStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Key-presence cache in front of a [`CredentialStore`].
///
/// Only presence is cached, never the secret. Writes through the cache drop
/// the entry so the next lookup goes back to the store.
pub struct CredentialCache {
    store: Arc<dyn CredentialStore>,
    presence: Mutex<HashMap<String, bool>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            presence: Mutex::new(HashMap::new()),
        }
    }

    pub fn has_key(&self, provider_id: &str) -> Result<bool, CredentialError> {
        if let Some(present) = self.presence.lock().get(provider_id) {
            return Ok(*present);
        }
        let present = self.store.read_key(provider_id)?.is_some();
        self.presence
            .lock()
            .insert(provider_id.to_string(), present);
        Ok(present)
    }

    /// Read the secret itself. Always consults the store.
    pub fn read_key(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
        let key = self
            .store
            .read_key(provider_id)?
            .filter(|k| !k.trim().is_empty());
        self.presence
            .lock()
            .insert(provider_id.to_string(), key.is_some());
        Ok(key)
    }

    pub fn write_key(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
        self.store.write_key(provider_id, secret)?;
        self.invalidate(provider_id);
        Ok(())
    }

    pub fn invalidate(&self, provider_id: &str) {
        debug!("Invalidating credential presence for {}", provider_id);
        self.presence.lock().remove(provider_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        keys: Mutex<HashMap<String, String>>,
        reads: AtomicUsize,
    }

    impl CredentialStore for CountingStore {
        fn read_key(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.keys.lock().get(provider_id).cloned())
        }

        fn write_key(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
            self.keys
                .lock()
                .insert(provider_id.to_string(), secret.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_presence_cached_until_write() {
        let store = Arc::new(CountingStore::default());
        let cache = CredentialCache::new(store.clone());

        assert!(!cache.has_key("anthropic").unwrap());
        assert!(!cache.has_key("anthropic").unwrap());
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);

        cache.write_key("anthropic", "sk-test").unwrap();
        assert!(cache.has_key("anthropic").unwrap());
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blank_key_is_absent() {
        let store = Arc::new(CountingStore::default());
        store.write_key("openai", "  ").unwrap();
        let cache = CredentialCache::new(store);
        assert!(cache.read_key("openai").unwrap().is_none());
        assert!(!cache.has_key("openai").unwrap());
    }
}
