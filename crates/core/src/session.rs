//! Authenticated session tokens shared across searches and dispatches.
//!
//! Each key (a provider or backend id) holds at most one live token. Tokens
//! are established lazily and establishment for one key is serialized, so
//! concurrent callers never log in twice.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

type Slot = Arc<Mutex<Option<String>>>;

#[derive(Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return the cached token for `key`, running `login` if there is none.
    pub async fn get_or_login<F, Fut, E>(&self, key: &str, login: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let slot = self.slot(key).await;
        let mut token = slot.lock().await;

        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }

        debug!(session = %key, "Establishing session");
        let fresh = login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the token for `key` if it is still `stale`. A token another caller
    /// already refreshed is kept.
    pub async fn invalidate(&self, key: &str, stale: &str) {
        let slot = self.slot(key).await;
        let mut token = slot.lock().await;
        if token.as_deref() == Some(stale) {
            debug!(session = %key, "Invalidating session");
            *token = None;
        }
    }

    /// Store a token handed out by the remote side mid-request (e.g. a
    /// Transmission session id returned with a 409).
    pub async fn replace(&self, key: &str, token: String) {
        let slot = self.slot(key).await;
        *slot.lock().await = Some(token);
    }

    pub async fn current(&self, key: &str) -> Option<String> {
        let slot = self.slot(key).await;
        let token = slot.lock().await;
        token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_login_runs_once() {
        let cache = Arc::new(SessionCache::new());
        let logins = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let logins = Arc::clone(&logins);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_login("qbittorrent", || async move {
                        logins.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>("sid-1".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "sid-1");
        }
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_then_relogin() {
        let cache = SessionCache::new();
        let first = cache
            .get_or_login("deluge", || async { Ok::<_, String>("a".to_string()) })
            .await
            .unwrap();

        cache.invalidate("deluge", "stale-other").await;
        assert_eq!(cache.current("deluge").await.as_deref(), Some("a"));

        cache.invalidate("deluge", &first).await;
        assert!(cache.current("deluge").await.is_none());

        let second = cache
            .get_or_login("deluge", || async { Ok::<_, String>("b".to_string()) })
            .await
            .unwrap();
        assert_eq!(second, "b");
    }

    #[tokio::test]
    async fn test_failed_login_leaves_slot_empty() {
        let cache = SessionCache::new();
        let err = cache
            .get_or_login("transmission", || async { Err::<String, _>("refused") })
            .await
            .unwrap_err();
        assert_eq!(err, "refused");
        assert!(cache.current("transmission").await.is_none());

        cache.replace("transmission", "csrf-1".to_string()).await;
        assert_eq!(cache.current("transmission").await.as_deref(), Some("csrf-1"));
    }
}
