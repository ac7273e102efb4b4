//! Captured Browser Sessions
//!
//! Cookies captured by an interactive flow are kept in the host's secure
//! store so the next request in the same namespace can skip the login.
//!
//! - One entry per `(namespace, environment)`
//! - Entries older than the configured TTL are treated as absent and removed
//! - Entries that no longer parse are removed
//! - Cookie values are never logged
//!
//! The cache is an optimization: storage failures are logged and the caller
//! proceeds as if nothing was cached.

use bridge_traits::{BrowserCookies, Clock, SecureStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::state::Environment;

const KEY_PREFIX: &str = "opacity.session";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    cookies: BrowserCookies,
    captured_at: DateTime<Utc>,
}

/// Session cache over a [`SecureStore`].
#[derive(Clone)]
pub struct SessionStore {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    enabled: bool,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, enabled: bool) -> Self {
        Self {
            clock,
            ttl,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn storage_key(namespace: &str, environment: Environment) -> String {
        format!("{}.{}.{}", KEY_PREFIX, namespace, environment.as_str())
    }

    /// Cached cookies for `namespace`, if present and fresh.
    pub async fn load<S>(
        &self,
        store: &S,
        namespace: &str,
        environment: Environment,
    ) -> Option<BrowserCookies>
    where
        S: SecureStore + ?Sized,
    {
        if !self.enabled {
            return None;
        }

        let key = Self::storage_key(namespace, environment);
        let raw = match store.get_secret(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(namespace, error = %e, "Session cache unavailable");
                return None;
            }
        };

        let stored: StoredSession = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(namespace, error = %e, "Cached session is corrupted, deleting");
                self.remove(store, &key).await;
                return None;
            }
        };

        // A capture time in the future means the clock moved back; distrust it.
        let fresh = (self.clock.now() - stored.captured_at)
            .to_std()
            .map(|age| age < self.ttl)
            .unwrap_or(false);
        if !fresh {
            debug!(namespace, captured_at = %stored.captured_at, "Cached session expired");
            self.remove(store, &key).await;
            return None;
        }

        debug!(namespace, cookie_count = stored.cookies.len(), "Using cached session");
        Some(stored.cookies)
    }

    pub async fn save<S>(
        &self,
        store: &S,
        namespace: &str,
        environment: Environment,
        cookies: &BrowserCookies,
    ) where
        S: SecureStore + ?Sized,
    {
        if !self.enabled || cookies.is_empty() {
            return;
        }

        let stored = StoredSession {
            cookies: cookies.clone(),
            captured_at: self.clock.now(),
        };
        let json = match serde_json::to_string(&stored) {
            Ok(json) => json,
            Err(e) => {
                warn!(namespace, error = %e, "Failed to serialize session");
                return;
            }
        };

        let key = Self::storage_key(namespace, environment);
        match store.set_secret(&key, &json).await {
            Ok(()) => info!(namespace, cookie_count = cookies.len(), "Session cached"),
            Err(e) => warn!(namespace, error = %e, "Failed to cache session"),
        }
    }

    /// Forget the cached session, e.g. after upstream rejected it.
    pub async fn invalidate<S>(&self, store: &S, namespace: &str, environment: Environment)
    where
        S: SecureStore + ?Sized,
    {
        let key = Self::storage_key(namespace, environment);
        self.remove(store, &key).await;
        info!(namespace, "Cached session invalidated");
    }

    async fn remove<S>(&self, store: &S, key: &str)
    where
        S: SecureStore + ?Sized,
    {
        if let Err(e) = store.delete_secret(key).await {
            warn!(error = %e, "Failed to delete cached session");
        }
    }
}
