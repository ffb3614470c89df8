//! 缓存策略
//!
//! 缓存只是加速手段，数据库才是准确来源。只有两类读取会走缓存：
//! 列表的版本分类，以及最新已发布版本的文章。

mod memory;

use std::future::Future;

use serde_json::Value;

pub use self::memory::MemoryCache;

/// 未来文章存在时，最新文章缓存的有效期（秒）
pub const FUTURE_POSTS_TTL: u64 = 60;

/// 键值缓存，`ttl` 为 `0` 表示不过期
///
/// 缓存失败不影响业务，因此接口不返回错误。
pub trait Cache: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Option<Value>> + Send;

    fn set(&self, key: &str, value: Value, ttl: u64) -> impl Future<Output = ()> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = ()> + Send;
}

/// 列表版本分类的缓存键
pub fn versions_key(list_id: i64) -> String {
    format!("versions_{list_id}")
}

/// 列表最新已发布文章的缓存键
pub fn latest_articles_key(list_id: i64) -> String {
    format!("latest_articles{list_id}")
}

/// 最新文章缓存的有效期：含未来文章时内容会随时间变化，不能永久缓存
pub fn latest_articles_ttl(future_posts: usize) -> u64 {
    if future_posts > 0 { FUTURE_POSTS_TTL } else { 0 }
}

/// 一次组合操作中累积的缓存失效
///
/// 嵌套的删除操作只登记键，整个操作成功后再统一 [`Invalidations::flush`]，
/// 同一个键只删除一次。操作失败时直接丢弃，不触碰缓存。
#[derive(Debug, Default)]
pub struct Invalidations {
    keys: Vec<String>,
}

impl Invalidations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions(&mut self, list_id: i64) -> &mut Self {
        self.push(versions_key(list_id))
    }

    pub fn latest_articles(&mut self, list_id: i64) -> &mut Self {
        self.push(latest_articles_key(list_id))
    }

    fn push(&mut self, key: String) -> &mut Self {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub async fn flush<C: Cache>(self, cache: &C) {
        for key in self.keys {
            tracing::debug!(%key, "cache invalidated");
            cache.delete(&key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(versions_key(7), "versions_7");
        assert_eq!(latest_articles_key(7), "latest_articles7");
    }

    #[test]
    fn test_ttl() {
        assert_eq!(latest_articles_ttl(0), 0);
        assert_eq!(latest_articles_ttl(3), FUTURE_POSTS_TTL);
    }

    #[test]
    fn test_invalidations_dedup() {
        let mut inv = Invalidations::new();
        inv.versions(1).latest_articles(1).versions(1).versions(2);

        assert_eq!(inv.keys(), ["versions_1", "latest_articles1", "versions_2"]);
    }

    #[tokio::test]
    async fn test_flush_deletes_each_key() {
        let cache = MemoryCache::new();
        cache.set("versions_1", Value::from(1), 0).await;
        cache.set("latest_articles1", Value::from(2), 0).await;
        cache.set("versions_2", Value::from(3), 0).await;

        let mut inv = Invalidations::new();
        inv.versions(1).latest_articles(1);
        inv.flush(&cache).await;

        assert!(cache.get("versions_1").await.is_none());
        assert!(cache.get("latest_articles1").await.is_none());
        assert_eq!(cache.get("versions_2").await, Some(Value::from(3)));
    }
}
