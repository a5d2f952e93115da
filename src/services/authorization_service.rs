//! 授权服务
//!
//! 读：缓存旁路。命中直接返回；未命中时解析、后台回写缓存、返回结果。
//! 写：先写权限数据存储，再记录审计，最后使缓存失效。

use super::{
    audit_service::AuditService, clock::Clock, invalidation::InvalidationGate,
    resolver::PermissionResolver,
};
use crate::{
    cache::PermissionCache,
    catalog::PermissionCatalog,
    error::{AppError, ResolveError, Result},
    models::{
        audit::{AuditAction, NewAuditEntry},
        permission::{Permission, PermissionQuery},
        role::{CreateRoleRequest, Role, RolePermission, UpdateRoleRequest, UserPermission, UserRole},
        UserPermissionSet,
    },
    repository::{AssignmentStore, Grant},
    telemetry::metric_names,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// 发起变更的主体（系统操作没有 user_id）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    fn entry(&self, action: AuditAction) -> NewAuditEntry {
        NewAuditEntry::new(action, self.user_id).ip_address(self.ip_address.clone())
    }
}

/// 角色及其权限
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<RolePermission>,
}

pub struct AuthorizationService {
    store: Arc<dyn AssignmentStore>,
    cache: Arc<dyn PermissionCache>,
    resolver: PermissionResolver,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    gate: Arc<InvalidationGate>,
    write_timeout: Duration,
}

impl AuthorizationService {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        cache: Arc<dyn PermissionCache>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone(), clock.clone()),
            store,
            cache,
            audit,
            clock,
            gate: Arc::new(InvalidationGate::new()),
            write_timeout,
        }
    }

    // ==================== Reads ====================

    /// 获取用户权限集合
    ///
    /// 解析失败时错误中携带空集合（非超级管理员），调用方默认据此拒绝。
    pub async fn get_user_permissions(
        &self,
        user_id: Uuid,
    ) -> std::result::Result<UserPermissionSet, ResolveError> {
        let lookup = if self.gate.cache_trusted(self.cache.as_ref(), user_id).await {
            self.cache.get(user_id).await
        } else {
            tracing::debug!(user_id = %user_id, "Permission cache entry untrusted after failed invalidation, bypassing");
            Ok(None)
        };

        match lookup {
            Ok(Some(set)) => {
                metrics::counter!(metric_names::CACHE_HITS).increment(1);
                tracing::debug!(user_id = %user_id, "Permission cache hit");
                return Ok(set);
            }
            Ok(None) => {
                metrics::counter!(metric_names::CACHE_MISSES).increment(1);
                tracing::debug!(user_id = %user_id, "Permission cache miss");
            }
            Err(e) => {
                metrics::counter!(metric_names::CACHE_ERRORS).increment(1);
                tracing::warn!(user_id = %user_id, error = %e, "Permission cache read degraded, treating as miss");
            }
        }

        let ticket = self.gate.ticket(user_id).await;
        let set = self.resolver.resolve(user_id).await?;

        let cache = self.cache.clone();
        let gate = self.gate.clone();
        let write_timeout = self.write_timeout;
        let value = set.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(write_timeout, gate.write_back(ticket, cache.as_ref(), &value))
                .await
            {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    tracing::debug!(user_id = %user_id, "Skipped stale permission cache write");
                }
                Ok(Err(e)) => {
                    metrics::counter!(metric_names::CACHE_ERRORS).increment(1);
                    tracing::warn!(user_id = %user_id, error = %e, "Permission cache write failed");
                }
                Err(_) => {
                    metrics::counter!(metric_names::CACHE_ERRORS).increment(1);
                    tracing::warn!(user_id = %user_id, "Permission cache write timed out");
                }
            }
        });

        Ok(set)
    }

    /// 单个权限检查；解析失败时拒绝
    pub async fn has_permission(&self, user_id: Uuid, code: &str) -> bool {
        match self.get_user_permissions(user_id).await {
            Ok(set) => set.has_permission(code),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Permission check failed closed");
                e.into_fallback().has_permission(code)
            }
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<RoleDetail> {
        let role = self.require_role(role_id).await?;
        let permissions = self.store.role_permissions(role_id).await?;
        Ok(RoleDetail { role, permissions })
    }

    pub async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<RolePermission>> {
        self.require_role(role_id).await?;
        self.store.role_permissions(role_id).await
    }

    pub async fn list_permissions(&self, query: &PermissionQuery) -> Result<Vec<Permission>> {
        self.store.list_permissions(query).await
    }

    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>> {
        self.store.user_roles(user_id).await
    }

    pub async fn get_user_direct_permissions(&self, user_id: Uuid) -> Result<Vec<UserPermission>> {
        self.store.user_permissions(user_id).await
    }

    // ==================== User mutations ====================

    /// 为用户分配角色（已持有且未过期时为空操作）
    pub async fn assign_role_to_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<bool> {
        let now = self.clock.now();
        check_expiry(expires_at, now)?;
        let role = self.require_role(role_id).await?;

        let changed = self
            .store
            .assign_role(Grant {
                user_id,
                target_id: role_id,
                granted_by: actor.user_id,
                expires_at,
                at: now,
            })
            .await?;

        if changed {
            let mut entry = actor
                .entry(AuditAction::RoleAssignedToUser)
                .user(user_id)
                .role(role_id);
            if let Some(exp) = expires_at {
                entry = entry.details(format!("{} until {}", role.name, exp.to_rfc3339()));
            } else {
                entry = entry.details(role.name.clone());
            }
            self.audit.record(entry).await;

            tracing::info!(user_id = %user_id, role_id = %role_id, "Role assigned to user");
        }

        self.invalidate_user_permissions(user_id).await;
        Ok(changed)
    }

    /// 撤销用户角色（未持有时为空操作）
    pub async fn revoke_role_from_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        actor: &Actor,
    ) -> Result<bool> {
        let changed = self.store.revoke_role(user_id, role_id).await?;

        if changed {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::RoleRevokedFromUser)
                        .user(user_id)
                        .role(role_id),
                )
                .await;
            tracing::info!(user_id = %user_id, role_id = %role_id, "Role revoked from user");
        }

        self.invalidate_user_permissions(user_id).await;
        Ok(changed)
    }

    /// 直接授予用户权限
    pub async fn grant_permission_to_user(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<bool> {
        let now = self.clock.now();
        check_expiry(expires_at, now)?;
        let permission = self.require_permission(permission_id).await?;

        let changed = self
            .store
            .grant_user_permission(Grant {
                user_id,
                target_id: permission_id,
                granted_by: actor.user_id,
                expires_at,
                at: now,
            })
            .await?;

        if changed {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::UserPermissionGranted)
                        .user(user_id)
                        .permission(permission_id)
                        .details(permission.code.clone()),
                )
                .await;
            tracing::info!(user_id = %user_id, code = %permission.code, "Permission granted to user");
        }

        self.invalidate_user_permissions(user_id).await;
        Ok(changed)
    }

    pub async fn revoke_permission_from_user(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        actor: &Actor,
    ) -> Result<bool> {
        let changed = self.store.revoke_user_permission(user_id, permission_id).await?;

        if changed {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::UserPermissionRevoked)
                        .user(user_id)
                        .permission(permission_id),
                )
                .await;
            tracing::info!(user_id = %user_id, permission_id = %permission_id, "Permission revoked from user");
        }

        self.invalidate_user_permissions(user_id).await;
        Ok(changed)
    }

    // ==================== Role mutations ====================

    pub async fn create_role(&self, req: &CreateRoleRequest, actor: &Actor) -> Result<Role> {
        req.validate()?;
        let role = self.store.create_role(req, self.clock.now()).await?;

        self.audit
            .record(
                actor
                    .entry(AuditAction::RoleCreated)
                    .role(role.id)
                    .details(format!("{} (level {})", role.name, role.level)),
            )
            .await;
        tracing::info!(role_id = %role.id, name = %role.name, "Role created");

        Ok(role)
    }

    /// 更新角色；系统角色不能改名、停用或改变超级管理员能力
    pub async fn update_role(
        &self,
        role_id: Uuid,
        req: &UpdateRoleRequest,
        actor: &Actor,
    ) -> Result<Role> {
        req.validate()?;
        let current = self.require_role(role_id).await?;
        if current.is_system && req.touches_protected_fields(&current) {
            return Err(AppError::protected("system role name, status and superadmin flag are fixed"));
        }

        let role = self
            .store
            .update_role(role_id, req, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("role"))?;

        self.audit
            .record(actor.entry(AuditAction::RoleUpdated).role(role_id).details(role.name.clone()))
            .await;
        tracing::info!(role_id = %role_id, "Role updated");

        // 等级、状态或超级管理员标记的变化影响所有持有者
        self.invalidate_all_permissions().await;
        Ok(role)
    }

    pub async fn delete_role(&self, role_id: Uuid, actor: &Actor) -> Result<()> {
        let role = self.require_role(role_id).await?;
        if role.is_system {
            return Err(AppError::protected("system role cannot be deleted"));
        }

        if !self.store.delete_role(role_id).await? {
            return Err(AppError::not_found("role"));
        }

        self.audit
            .record(actor.entry(AuditAction::RoleDeleted).role(role_id).details(role.name.clone()))
            .await;
        tracing::info!(role_id = %role_id, name = %role.name, "Role deleted");

        self.invalidate_all_permissions().await;
        Ok(())
    }

    /// 整体替换角色的权限列表（事务性），之后清空所有缓存
    pub async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
        actor: &Actor,
    ) -> Result<()> {
        self.require_role(role_id).await?;

        let previous: BTreeSet<Uuid> = self
            .store
            .role_permissions(role_id)
            .await?
            .into_iter()
            .map(|rp| rp.permission_id)
            .collect();
        let requested: BTreeSet<Uuid> = permission_ids.iter().copied().collect();
        let requested_list: Vec<Uuid> = requested.iter().copied().collect();

        self.store
            .set_role_permissions(role_id, &requested_list, actor.user_id, self.clock.now())
            .await?;

        for added in requested.difference(&previous) {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::PermissionGrantedToRole)
                        .role(role_id)
                        .permission(*added),
                )
                .await;
        }
        for removed in previous.difference(&requested) {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::PermissionRevokedFromRole)
                        .role(role_id)
                        .permission(*removed),
                )
                .await;
        }
        tracing::info!(role_id = %role_id, count = requested.len(), "Role permissions replaced");

        self.invalidate_all_permissions().await;
        Ok(())
    }

    pub async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        actor: &Actor,
    ) -> Result<bool> {
        self.require_role(role_id).await?;
        let permission = self.require_permission(permission_id).await?;

        let changed = self
            .store
            .grant_permission_to_role(role_id, permission_id, actor.user_id, self.clock.now())
            .await?;

        if changed {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::PermissionGrantedToRole)
                        .role(role_id)
                        .permission(permission_id)
                        .details(permission.code.clone()),
                )
                .await;
            self.invalidate_all_permissions().await;
        }
        Ok(changed)
    }

    pub async fn revoke_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        actor: &Actor,
    ) -> Result<bool> {
        let changed = self
            .store
            .revoke_permission_from_role(role_id, permission_id)
            .await?;

        if changed {
            self.audit
                .record(
                    actor
                        .entry(AuditAction::PermissionRevokedFromRole)
                        .role(role_id)
                        .permission(permission_id),
                )
                .await;
            self.invalidate_all_permissions().await;
        }
        Ok(changed)
    }

    // ==================== Catalog ====================

    /// 将权限目录写入存储（只增改不删，id 保持稳定）
    pub async fn seed_catalog(&self, catalog: &PermissionCatalog) -> Result<u64> {
        let changed = self.store.upsert_permissions(&catalog.definitions()).await?;
        if changed > 0 {
            tracing::info!(changed, total = catalog.len(), "Permission catalog seeded");
            self.invalidate_all_permissions().await;
        }
        Ok(changed)
    }

    // ==================== Invalidation ====================

    /// 使单个用户的缓存失效；缓存故障只记录日志
    pub async fn invalidate_user_permissions(&self, user_id: Uuid) {
        if let Err(e) = self.gate.invalidate_user(self.cache.as_ref(), user_id).await {
            metrics::counter!(metric_names::CACHE_ERRORS).increment(1);
            tracing::error!(user_id = %user_id, error = %e, "Failed to invalidate permission cache entry");
        }
    }

    pub async fn invalidate_all_permissions(&self) {
        if let Err(e) = self.gate.invalidate_all(self.cache.as_ref()).await {
            metrics::counter!(metric_names::CACHE_ERRORS).increment(1);
            tracing::error!(error = %e, "Failed to flush permission cache");
        }
    }

    // ==================== Helpers ====================

    async fn require_role(&self, role_id: Uuid) -> Result<Role> {
        self.store
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::not_found("role"))
    }

    async fn require_permission(&self, permission_id: Uuid) -> Result<Permission> {
        self.store
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::not_found("permission"))
    }
}

fn check_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
    match expires_at {
        Some(exp) if exp <= now => Err(AppError::BadRequest(
            "expires_at must be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}
