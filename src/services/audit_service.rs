//! 审计日志服务

use super::clock::Clock;
use crate::{
    error::AppError,
    events::EventRegistry,
    models::audit::{AuditEntry, AuditQuery, NewAuditEntry},
    repository::AuditStore,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct AuditService {
    store: Arc<dyn AuditStore>,
    events: Arc<EventRegistry>,
    clock: Arc<dyn Clock>,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>, events: Arc<EventRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { store, events, clock }
    }

    /// 记录审计日志条目
    ///
    /// 在权威写入提交之后调用；写入失败只记录错误，不影响已完成的变更。
    pub async fn record(&self, entry: NewAuditEntry) -> Option<AuditEntry> {
        let action = entry.action;
        match self.store.append(entry, self.clock.now()).await {
            Ok(saved) => {
                self.events.dispatch(&saved);
                Some(saved)
            }
            Err(e) => {
                tracing::error!(action = %action, error = %e, "Failed to write audit entry");
                None
            }
        }
    }

    /// 查询审计日志
    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AppError> {
        self.store.list(query).await
    }

    /// 查询与某用户相关的日志（作为操作者或目标）
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, AppError> {
        let query = AuditQuery {
            involving_user: Some(user_id),
            ..query.clone()
        };
        self.store.list(&query).await
    }
}
