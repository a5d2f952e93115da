//! Assignment store and audit store
//!
//! 权限数据的唯一可信来源。解析查询接受显式的评估时刻 `at`，
//! 过期判断在解析时进行，而不是预先清理。

use crate::{
    error::{AppError, Result},
    models::{
        audit::{AuditEntry, AuditQuery, NewAuditEntry},
        permission::{Permission, PermissionDefinition, PermissionQuery},
        role::{CreateRoleRequest, HeldRole, Role, RolePermission, UpdateRoleRequest, UserPermission, UserRole},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod audit_repo;
pub mod memory;
pub mod rbac_repo;

pub use audit_repo::PgAuditStore;
pub use memory::{MemoryAssignmentStore, MemoryAuditStore};
pub use rbac_repo::PgAssignmentStore;

/// 一次分配或授权（角色分配与直接授权共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub user_id: Uuid,
    /// role_id 或 permission_id
    pub target_id: Uuid,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    // ==================== Resolution ====================

    /// 有效角色：角色启用且分配未过期，按等级降序、名称升序
    async fn held_roles(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<HeldRole>>;

    /// 通过有效角色可达的启用权限编码
    async fn role_permission_codes(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<String>>;

    /// 未过期的直接授权中的启用权限编码
    async fn direct_permission_codes(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    // ==================== Catalog & roles ====================

    async fn list_roles(&self) -> Result<Vec<Role>>;
    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>>;
    async fn list_permissions(&self, query: &PermissionQuery) -> Result<Vec<Permission>>;
    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>>;
    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>>;
    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<RolePermission>>;
    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>>;
    async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<UserPermission>>;

    // ==================== Mutations ====================

    async fn create_role(&self, req: &CreateRoleRequest, at: DateTime<Utc>) -> Result<Role>;
    async fn update_role(
        &self,
        role_id: Uuid,
        req: &UpdateRoleRequest,
        at: DateTime<Utc>,
    ) -> Result<Option<Role>>;
    /// 删除角色，级联删除其权限与分配
    async fn delete_role(&self, role_id: Uuid) -> Result<bool>;

    /// 按编码写入目录；已存在的权限保持 ID 不变，从不删除
    async fn upsert_permissions(&self, definitions: &[PermissionDefinition]) -> Result<u64>;

    /// 整体替换角色权限列表（全部成功或全部回滚）
    async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    async fn revoke_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool>;

    /// 幂等：已持有且未过期时不做修改；已过期的记录会被续期
    async fn assign_role(&self, grant: Grant) -> Result<bool>;
    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;
    /// 与 `assign_role` 相同的幂等与续期语义
    async fn grant_user_permission(&self, grant: Grant) -> Result<bool>;
    async fn revoke_user_permission(&self, user_id: Uuid, permission_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: NewAuditEntry, at: DateTime<Utc>) -> Result<AuditEntry>;
    /// 按时间倒序
    async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>>;
}

/// 写操作的数据库错误映射：外键冲突视为引用对象不存在，唯一约束冲突视为重复
pub(crate) fn map_write_error(err: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound(what.to_string());
        }
        if db_err.is_unique_violation() {
            return AppError::Conflict(format!("{} already exists", what));
        }
    }
    AppError::StoreUnavailable(err)
}
