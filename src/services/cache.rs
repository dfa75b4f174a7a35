use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::CacheEntry;

/// TTL cache of serialized responses. Freshness is judged on read and an
/// expired entry is removed by the read that finds it; there is no sweeper.
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if self.is_fresh(entry, now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another task may have stored a fresh entry between the two locks.
        if let Some(entry) = entries.get(key) {
            if self.is_fresh(entry, now) {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Unconditional last-writer-wins insert.
    pub async fn store(&self, key: &str, value: Bytes) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(entry.key.clone(), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.stored_at) <= self.ttl
    }
}
