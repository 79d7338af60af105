//! TTL-bounded cache of serialized prompt snapshots.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache key for one `(tag, version)` pair.
pub fn cache_key(tag: &str, version: u32) -> String {
    format!("prompt:{}:{}", tag, version)
}

/// Key/value cache addressed by `(tag, version)`.
///
/// Each operation is atomic on its own; expiry is the cache's concern.
#[async_trait]
pub trait PromptCache: Send + Sync {
    async fn get(&self, tag: &str, version: u32) -> Option<String>;
    async fn set(&self, tag: &str, version: u32, payload: String, ttl: Duration);
    async fn delete(&self, tag: &str, version: u32);
}

struct Entry {
    payload: String,
    /// `None` when the TTL is too large to represent; never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// In-process cache with lazy expiry on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PromptCache for MemoryCache {
    async fn get(&self, tag: &str, version: u32) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let key = cache_key(tag, version);
        match entries.get(&key) {
            Some(entry) if entry.is_live() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, tag: &str, version: u32, payload: String, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                cache_key(tag, version),
                Entry {
                    payload,
                    expires_at: Instant::now().checked_add(ttl),
                },
            );
        }
    }

    async fn delete(&self, tag: &str, version: u32) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&cache_key(tag, version));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert_eq!(cache_key("support", 3), "prompt:support:3");
    }

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        assert!(cache.get("a", 1).await.is_none());

        cache.set("a", 1, "{}".into(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("a", 1).await.as_deref(), Some("{}"));
        assert!(cache.get("a", 2).await.is_none());

        cache.delete("a", 1).await;
        assert!(cache.get("a", 1).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let cache = MemoryCache::new();
        cache.set("a", 1, "{}".into(), Duration::ZERO).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a", 1).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn oversized_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("a", 1, "{}".into(), Duration::from_secs(u64::MAX)).await;
        assert_eq!(cache.get("a", 1).await.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn delete_touches_only_its_key() {
        let cache = MemoryCache::new();
        cache.set("a", 1, "one".into(), Duration::from_secs(60)).await;
        cache.set("a", 2, "two".into(), Duration::from_secs(60)).await;
        cache.delete("a", 1).await;
        assert_eq!(cache.get("a", 2).await.as_deref(), Some("two"));
    }
}
