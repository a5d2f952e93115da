//! Permission cache
//!
//! `CacheStore` 是对底层键值存储的最小要求（get / set / delete / 按前缀删除），
//! `PermissionCache` 在其上存取序列化后的 `UserPermissionSet`。
//! 缓存错误只在本模块内部流转，调用方一律按未命中处理。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod permission_cache;

pub use memory::MemoryCacheStore;
pub use permission_cache::{
    build_permission_cache, NoopPermissionCache, PermissionCache, StorePermissionCache,
};

/// 缓存降级原因
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation timed out")]
    Timeout,

    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 底层键值存储边界
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// 扫描并删除所有以 `prefix` 开头的键，返回删除数量
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}
