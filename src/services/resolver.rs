//! 权限解析器
//!
//! 从权限数据存储读取用户的有效角色、角色权限与直接授权，合并成一个
//! `UserPermissionSet`。任一查询失败时返回空集合与错误，调用方默认拒绝。

use super::clock::Clock;
use crate::{
    error::ResolveError, models::UserPermissionSet, repository::AssignmentStore,
    telemetry::metric_names,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct PermissionResolver {
    store: Arc<dyn AssignmentStore>,
    clock: Arc<dyn Clock>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn AssignmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 以当前时刻解析
    pub async fn resolve(&self, user_id: Uuid) -> Result<UserPermissionSet, ResolveError> {
        self.resolve_at(user_id, self.clock.now()).await
    }

    pub async fn resolve_at(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserPermissionSet, ResolveError> {
        let fail = |e| ResolveError::new(user_id, e);
        let mut set = UserPermissionSet::new(user_id);

        let roles = self.store.held_roles(user_id, at).await.map_err(fail)?;
        for role in &roles {
            set.add_role(&role.name, role.level, role.is_superadmin_granting);
        }

        metrics::counter!(metric_names::RESOLUTIONS).increment(1);

        // 超级管理员不依赖权限表内容
        if set.is_superadmin {
            tracing::debug!(user_id = %user_id, roles = ?set.roles, "Resolved superadmin");
            return Ok(set);
        }

        for code in self.store.role_permission_codes(user_id, at).await.map_err(fail)? {
            set.add_permission(&code);
        }
        for code in self.store.direct_permission_codes(user_id, at).await.map_err(fail)? {
            set.add_permission(&code);
        }

        tracing::debug!(
            user_id = %user_id,
            roles = set.roles.len(),
            permissions = set.permissions.len(),
            max_level = set.max_level,
            "Resolved permissions"
        );

        Ok(set)
    }
}
