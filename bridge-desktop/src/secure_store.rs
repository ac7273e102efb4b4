//! Secure Credential Storage

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::SecureStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local secure store.
///
/// Values live only as long as the store. Used for headless hosts, CI and
/// tests where no OS keychain is reachable.
#[derive(Default)]
pub struct MemorySecureStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        debug!(key, "Stored secret in memory");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(feature = "secure-store")]
pub use keyring_store::KeyringSecureStore;

#[cfg(feature = "secure-store")]
mod keyring_store {
    use super::*;
    use bridge_traits::error::BridgeError;
    use keyring::Entry;

    /// Keyring-based secure storage implementation
    ///
    /// Uses platform-specific secure storage:
    /// - macOS: Keychain
    /// - Windows: Credential Manager (DPAPI)
    /// - Linux: Secret Service (libsecret)
    pub struct KeyringSecureStore {
        service_name: String,
    }

    impl KeyringSecureStore {
        pub fn new() -> Self {
            Self::with_service_name("opacity-core")
        }

        pub fn with_service_name(service_name: impl Into<String>) -> Self {
            Self {
                service_name: service_name.into(),
            }
        }

        pub fn service_name(&self) -> &str {
            &self.service_name
        }

        fn get_entry(&self, key: &str) -> std::result::Result<Entry, keyring::Error> {
            Entry::new(&self.service_name, key)
        }

        fn map_keyring_error(e: keyring::Error) -> BridgeError {
            BridgeError::OperationFailed(format!("Keyring error: {}", e))
        }
    }

    impl Default for KeyringSecureStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl SecureStore for KeyringSecureStore {
        async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
            let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;
            entry.set_password(value).map_err(Self::map_keyring_error)?;

            debug!(key, "Stored secret in keyring");
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> Result<Option<String>> {
            let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;

            match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => {
                    debug!(key, "Secret not found in keyring");
                    Ok(None)
                }
                Err(e) => Err(Self::map_keyring_error(e)),
            }
        }

        async fn delete_secret(&self, key: &str) -> Result<()> {
            let entry = self.get_entry(key).map_err(Self::map_keyring_error)?;

            match entry.delete_credential() {
                Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(Self::map_keyring_error(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySecureStore::new();

        assert_eq!(store.get_secret("k").await.unwrap(), None);
        store.set_secret("k", "v1").await.unwrap();
        assert_eq!(store.get_secret("k").await.unwrap(), Some("v1".to_string()));

        store.set_secret("k", "v2").await.unwrap();
        assert_eq!(store.get_secret("k").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.len().await, 1);

        store.delete_secret("k").await.unwrap();
        store.delete_secret("k").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[cfg(feature = "secure-store")]
    #[tokio::test]
    async fn test_keyring_roundtrip_when_available() {
        let store = KeyringSecureStore::with_service_name("opacity-core-test");
        assert_eq!(store.service_name(), "opacity-core-test");
        let key = "roundtrip-key";

        let _ = store.delete_secret(key).await;

        match store.set_secret(key, "value").await {
            Ok(_) => {
                if let Ok(Some(found)) = store.get_secret(key).await {
                    assert_eq!(found, "value");
                }
                let _ = store.delete_secret(key).await;
            }
            Err(e) => {
                // Headless CI has no secret service
                println!("Keyring not available ({}), skipping test", e);
            }
        }
    }
}
