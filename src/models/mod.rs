//! 数据模型模块
//! 权限目录、角色、分配关系、审计条目与派生的用户权限集合

pub mod audit;
pub mod permission;
pub mod permission_set;
pub mod role;

pub use audit::{AuditAction, AuditEntry, AuditQuery, NewAuditEntry};
pub use permission::{Permission, PermissionCode, PermissionDefinition, PermissionQuery};
pub use permission_set::{PermissionRequirement, UserPermissionSet, SUPERADMIN_LEVEL};
pub use role::{HeldRole, Role, RolePermission, UserPermission, UserRole};
