//! Secure Storage Abstraction
//!
//! Host-backed key/value secret storage. Keys and values are plain strings;
//! the engine layers its own JSON encoding on top where it needs structure.

use async_trait::async_trait;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts secure storage mechanisms:
/// - Android: EncryptedSharedPreferences / Keystore
/// - iOS/macOS: Keychain
/// - Linux: Secret Service / libsecret
/// - Tests: an in-memory map
///
/// # Consistency
///
/// A `set_secret` followed by `get_secret` for the same key within one host
/// session must observe the written value.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Encrypt data at rest
/// - Never log or expose stored values
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn remember(store: &dyn SecureStore, cookies: &str) -> Result<()> {
///     store.set_secret("opacity.session.github.production", cookies).await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`.
    async fn set_secret(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist. A missing key is never an error.
    async fn get_secret(&self, key: &str) -> Result<Option<String>>;

    /// Delete a secret. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
