use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use super::Cache;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// 进程内的 [`Cache`] 实现，过期项在读取时清除
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = {
            let entry = self.entries.get(key)?;
            match entry.expires_at {
                Some(at) if at <= now => true,
                _ => return Some(entry.value.clone()),
            }
        };

        if expired {
            self.entries
                .remove_if(key, |_, e| e.expires_at.is_some_and(|at| at <= now));
        }
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: u64) {
        let expires_at = (ttl > 0).then(|| Instant::now() + Duration::from_secs(ttl));
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").await.is_none());

        cache.set("k", json!({ "a": 1 }), 0).await;
        assert_eq!(cache.get("k").await, Some(json!({ "a": 1 })));

        cache.delete("k").await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expires() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), 60).await;
        cache.set("forever", json!(2), 0).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("short").await, Some(json!(1)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.get("forever").await, Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }
}
