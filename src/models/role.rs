//! Role and assignment domain models

use super::permission_set::SUPERADMIN_LEVEL;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 系统内置超级管理员角色（迁移脚本以固定 ID 写入）
pub const SUPERADMIN_ROLE_ID: Uuid = Uuid::from_u128(1);
pub const SUPERADMIN_ROLE_NAME: &str = "Superadmin";

/// Role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub level: i32,
    pub tenant_tag: Option<String>,
    pub is_superadmin_granting: bool,
    pub is_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// 是否授予超级管理员能力（显式标记或等级达到阈值）
    pub fn grants_superadmin(&self) -> bool {
        self.is_superadmin_granting || self.level >= SUPERADMIN_LEVEL
    }
}

/// 用户当前有效持有的角色（解析查询结果）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HeldRole {
    pub role_id: Uuid,
    pub name: String,
    pub level: i32,
    pub is_superadmin_granting: bool,
}

/// Role <-> permission join row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub permission_code: String,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
}

/// User <-> role join row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub role_level: i32,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Direct user permission grant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPermission {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub permission_code: String,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 过期判断：`expires_at` 为空表示永久有效
pub fn is_unexpired(expires_at: Option<DateTime<Utc>>, at: DateTime<Utc>) -> bool {
    expires_at.map_or(true, |exp| exp > at)
}

/// Create role request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub level: i32,
    #[validate(length(min = 1, max = 100))]
    pub tenant_tag: Option<String>,
    /// 未指定时按等级推断
    pub is_superadmin_granting: Option<bool>,
}

impl CreateRoleRequest {
    pub fn superadmin_granting(&self) -> bool {
        self.is_superadmin_granting
            .unwrap_or(self.level >= SUPERADMIN_LEVEL)
    }
}

/// Update role request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub level: Option<i32>,
    pub is_active: Option<bool>,
    pub is_superadmin_granting: Option<bool>,
}

impl UpdateRoleRequest {
    /// 系统角色只允许修改描述和等级
    pub fn touches_protected_fields(&self, role: &Role) -> bool {
        self.name.as_ref().is_some_and(|n| n != &role.name)
            || self.is_active.is_some_and(|a| a != role.is_active)
            || self
                .is_superadmin_granting
                .is_some_and(|s| s != role.is_superadmin_granting)
    }
}

/// Assign role request
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}
