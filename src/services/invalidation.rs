//! 缓存回写与失效的顺序控制
//!
//! 解析前领取一个 `WriteTicket`，记录当时的全局纪元和用户所在分片的代数。
//! 失效操作在持锁状态下递增计数并删除缓存；回写在持锁状态下核对计数，
//! 计数变化说明期间发生过失效，放弃写入。失效返回之后，任何旧票据都无法再写入。
//!
//! 删除失败时旧条目仍留在缓存中：该用户被标记为不可信，读取绕过缓存，
//! 直到删除成功或新值回写覆盖。清空失败时所有命中都不可信，直到重试清空成功。
//!
//! 仅在单进程内有效。

use crate::{
    cache::{CacheError, PermissionCache},
    models::UserPermissionSet,
};
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const STRIPES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    user_id: Uuid,
    epoch: u64,
    generation: u64,
}

#[derive(Debug, Default)]
struct Epoch {
    value: u64,
    flush_pending: bool,
}

#[derive(Debug, Default)]
struct Stripe {
    generation: u64,
    /// 删除失败、缓存中可能仍有旧条目的用户
    untrusted: HashSet<Uuid>,
}

pub struct InvalidationGate {
    epoch: RwLock<Epoch>,
    stripes: Vec<Mutex<Stripe>>,
}

impl Default for InvalidationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationGate {
    pub fn new() -> Self {
        Self {
            epoch: RwLock::new(Epoch::default()),
            stripes: (0..STRIPES).map(|_| Mutex::new(Stripe::default())).collect(),
        }
    }

    fn stripe(&self, user_id: Uuid) -> &Mutex<Stripe> {
        &self.stripes[(user_id.as_u128() % STRIPES as u128) as usize]
    }

    pub async fn ticket(&self, user_id: Uuid) -> WriteTicket {
        let epoch = self.epoch.read().await;
        let stripe = self.stripe(user_id).lock().await;
        WriteTicket {
            user_id,
            epoch: epoch.value,
            generation: stripe.generation,
        }
    }

    /// 缓存中该用户的条目是否可以直接返回
    ///
    /// 有未完成的清空时先重试一次。
    pub async fn cache_trusted(&self, cache: &dyn PermissionCache, user_id: Uuid) -> bool {
        if self.epoch.read().await.flush_pending {
            let mut epoch = self.epoch.write().await;
            if epoch.flush_pending {
                match cache.invalidate_all().await {
                    Ok(()) => self.clear_untrusted(&mut epoch).await,
                    Err(e) => {
                        tracing::debug!(error = %e, "Pending permission cache flush still failing");
                        return false;
                    }
                }
            }
        }

        let _epoch = self.epoch.read().await;
        let stripe = self.stripe(user_id).lock().await;
        !stripe.untrusted.contains(&user_id)
    }

    /// 票据仍然有效时写入缓存；返回是否写入
    pub async fn write_back(
        &self,
        ticket: WriteTicket,
        cache: &dyn PermissionCache,
        set: &UserPermissionSet,
    ) -> Result<bool, CacheError> {
        let epoch = self.epoch.read().await;
        if epoch.value != ticket.epoch {
            return Ok(false);
        }
        let mut stripe = self.stripe(ticket.user_id).lock().await;
        if stripe.generation != ticket.generation {
            return Ok(false);
        }

        cache.set(ticket.user_id, set).await?;
        stripe.untrusted.remove(&ticket.user_id);
        Ok(true)
    }

    /// 使单个用户的缓存失效
    pub async fn invalidate_user(
        &self,
        cache: &dyn PermissionCache,
        user_id: Uuid,
    ) -> Result<(), CacheError> {
        let _epoch = self.epoch.read().await;
        let mut stripe = self.stripe(user_id).lock().await;
        stripe.generation = stripe.generation.wrapping_add(1);
        match cache.delete(user_id).await {
            Ok(()) => {
                stripe.untrusted.remove(&user_id);
                Ok(())
            }
            Err(e) => {
                stripe.untrusted.insert(user_id);
                Err(e)
            }
        }
    }

    /// 使所有用户的缓存失效
    pub async fn invalidate_all(&self, cache: &dyn PermissionCache) -> Result<(), CacheError> {
        let mut epoch = self.epoch.write().await;
        epoch.value = epoch.value.wrapping_add(1);
        match cache.invalidate_all().await {
            Ok(()) => {
                self.clear_untrusted(&mut epoch).await;
                Ok(())
            }
            Err(e) => {
                epoch.flush_pending = true;
                Err(e)
            }
        }
    }

    /// 清空成功后，所有旧条目都已不在缓存中
    async fn clear_untrusted(&self, epoch: &mut Epoch) {
        epoch.flush_pending = false;
        for stripe in &self.stripes {
            stripe.lock().await.untrusted.clear();
        }
    }
}
