//! 用户权限集合缓存

use super::{CacheError, CacheStore, MemoryCacheStore};
use crate::{config::CacheConfig, models::UserPermissionSet};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// `Ok(None)` 表示未命中
    async fn get(&self, user_id: Uuid) -> Result<Option<UserPermissionSet>, CacheError>;
    async fn set(&self, user_id: Uuid, set: &UserPermissionSet) -> Result<(), CacheError>;
    async fn delete(&self, user_id: Uuid) -> Result<(), CacheError>;
    /// 清空所有用户的缓存条目
    async fn invalidate_all(&self) -> Result<(), CacheError>;
}

/// 基于 `CacheStore` 的实现
pub struct StorePermissionCache {
    store: Arc<dyn CacheStore>,
    key_prefix: String,
    ttl: Duration,
    op_timeout: Duration,
}

impl StorePermissionCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        key_prefix: impl Into<String>,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            ttl,
            op_timeout,
        }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self::new(store, config.key_prefix.clone(), config.ttl(), config.op_timeout())
    }

    fn key(&self, user_id: Uuid) -> String {
        format!("{}:user:{}", self.key_prefix, user_id)
    }

    /// 每次存储调用都有超时上限
    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>> + Send,
    {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout)?
    }
}

#[async_trait]
impl PermissionCache for StorePermissionCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserPermissionSet>, CacheError> {
        let key = self.key(user_id);
        let Some(bytes) = self.bounded(self.store.get(&key)).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<UserPermissionSet>(&bytes) {
            Ok(set) if set.user_id == user_id => Ok(Some(set)),
            Ok(_) | Err(_) => {
                tracing::warn!(user_id = %user_id, key = %key, "Corrupt permission cache entry, deleting");
                if let Err(e) = self.bounded(self.store.delete(&key)).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Failed to delete corrupt cache entry");
                }
                Ok(None)
            }
        }
    }

    async fn set(&self, user_id: Uuid, set: &UserPermissionSet) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(set)?;
        self.bounded(self.store.set(&self.key(user_id), bytes, self.ttl))
            .await
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), CacheError> {
        self.bounded(self.store.delete(&self.key(user_id))).await
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let prefix = format!("{}:", self.key_prefix);
        let removed = self.bounded(self.store.delete_prefix(&prefix)).await?;
        tracing::debug!(removed, "Permission cache flushed");
        Ok(())
    }
}

/// 未配置缓存时使用：永远未命中，写入和删除都直接成功
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPermissionCache;

#[async_trait]
impl PermissionCache for NoopPermissionCache {
    async fn get(&self, _user_id: Uuid) -> Result<Option<UserPermissionSet>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _user_id: Uuid, _set: &UserPermissionSet) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _user_id: Uuid) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// 根据配置选择缓存实现
pub fn build_permission_cache(config: &CacheConfig) -> Arc<dyn PermissionCache> {
    if !config.enabled {
        tracing::info!("Permission cache disabled, using no-op cache");
        return Arc::new(NoopPermissionCache);
    }

    let store = Arc::new(MemoryCacheStore::new(config.max_capacity));
    Arc::new(StorePermissionCache::from_config(store, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_over(store: Arc<dyn CacheStore>) -> StorePermissionCache {
        StorePermissionCache::new(
            store,
            "rbac:perms",
            Duration::from_secs(60),
            Duration::from_millis(200),
        )
    }

    fn sample(user_id: Uuid) -> UserPermissionSet {
        let mut set = UserPermissionSet::new(user_id);
        set.add_role("Supervisor", 10, false);
        set.add_permission("procurement.purchase_order.approve");
        set
    }

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let cache = cache_over(Arc::new(MemoryCacheStore::new(100)));
        let user_id = Uuid::new_v4();

        assert!(cache.get(user_id).await.unwrap().is_none());
        cache.set(user_id, &sample(user_id)).await.unwrap();
        assert_eq!(cache.get(user_id).await.unwrap(), Some(sample(user_id)));

        cache.delete(user_id).await.unwrap();
        assert!(cache.get(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss_and_removed() {
        let store = Arc::new(MemoryCacheStore::new(100));
        let cache = cache_over(store.clone());
        let user_id = Uuid::new_v4();
        let key = format!("rbac:perms:user:{}", user_id);

        store
            .set(&key, b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get(user_id).await.unwrap().is_none());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_keeps_foreign_keys() {
        let store = Arc::new(MemoryCacheStore::new(100));
        let cache = cache_over(store.clone());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.set(a, &sample(a)).await.unwrap();
        cache.set(b, &sample(b)).await.unwrap();
        store
            .set("reports:monthly", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        cache.invalidate_all().await.unwrap();

        assert!(cache.get(a).await.unwrap().is_none());
        assert!(cache.get(b).await.unwrap().is_none());
        assert!(store.get("reports:monthly").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_noop_cache_never_hits() {
        let cache = NoopPermissionCache;
        let user_id = Uuid::new_v4();
        cache.set(user_id, &sample(user_id)).await.unwrap();
        assert!(cache.get(user_id).await.unwrap().is_none());
        cache.delete(user_id).await.unwrap();
        cache.invalidate_all().await.unwrap();
    }
}
