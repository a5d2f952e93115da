//! In-memory assignment and audit stores.
//!
//! Same semantics as the Postgres stores, with all state held in `BTreeMap`s behind a
//! `tokio::sync::RwLock`. Used by tests and by local runs without a database.
//!
//! Multi-row writes stage their changes on a copy of the affected state and swap it in
//! only when every step succeeded, so a failed `set_role_permissions` leaves the previous
//! list in place.

use super::{AssignmentStore, AuditStore, Grant};
use crate::{
    error::{AppError, Result},
    models::{
        audit::{AuditEntry, AuditQuery, NewAuditEntry},
        permission::{Permission, PermissionDefinition, PermissionQuery},
        permission_set::SUPERADMIN_LEVEL,
        role::{
            is_unexpired, CreateRoleRequest, HeldRole, Role, RolePermission, UpdateRoleRequest,
            UserPermission, UserRole, SUPERADMIN_ROLE_ID, SUPERADMIN_ROLE_NAME,
        },
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct GrantRow {
    granted_at: DateTime<Utc>,
    granted_by: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct State {
    permissions: BTreeMap<Uuid, Permission>,
    roles: BTreeMap<Uuid, Role>,
    /// (role_id, permission_id)
    role_permissions: BTreeMap<(Uuid, Uuid), GrantRow>,
    /// (user_id, role_id)
    user_roles: BTreeMap<(Uuid, Uuid), GrantRow>,
    /// (user_id, permission_id)
    user_permissions: BTreeMap<(Uuid, Uuid), GrantRow>,
}

impl State {
    fn active_held_roles(&self, user_id: Uuid, at: DateTime<Utc>) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self
            .user_roles
            .range((user_id, Uuid::nil())..=(user_id, Uuid::max()))
            .filter(|(_, row)| is_unexpired(row.expires_at, at))
            .filter_map(|((_, role_id), _)| self.roles.get(role_id))
            .filter(|role| role.is_active)
            .collect();
        roles.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        roles
    }

    fn active_code(&self, permission_id: &Uuid) -> Option<&str> {
        self.permissions
            .get(permission_id)
            .filter(|p| p.is_active)
            .map(|p| p.code.as_str())
    }

    fn name_taken(&self, name: &str, tenant_tag: Option<&str>, except: Option<Uuid>) -> bool {
        self.roles.values().any(|r| {
            Some(r.id) != except && r.name == name && r.tenant_tag.as_deref() == tenant_tag
        })
    }

    /// 幂等写入授权行；已过期的行被续期
    fn upsert_grant(map: &mut BTreeMap<(Uuid, Uuid), GrantRow>, grant: Grant) -> bool {
        let key = (grant.user_id, grant.target_id);
        if let Some(existing) = map.get(&key) {
            if is_unexpired(existing.expires_at, grant.at) {
                return false;
            }
        }
        map.insert(
            key,
            GrantRow {
                granted_at: grant.at,
                granted_by: grant.granted_by,
                expires_at: grant.expires_at,
            },
        );
        true
    }
}

/// 内存版权限数据存储
pub struct MemoryAssignmentStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl Default for MemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssignmentStore {
    /// 创建存储，并写入系统超级管理员角色
    pub fn new() -> Self {
        let now = Utc::now();
        let mut state = State::default();
        state.roles.insert(
            SUPERADMIN_ROLE_ID,
            Role {
                id: SUPERADMIN_ROLE_ID,
                name: SUPERADMIN_ROLE_NAME.to_string(),
                description: Some("Built-in role with unrestricted access".to_string()),
                level: SUPERADMIN_LEVEL,
                tenant_tag: None,
                is_superadmin_granting: true,
                is_system: true,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );

        Self {
            state: RwLock::new(state),
            unavailable: AtomicBool::new(false),
        }
    }

    /// 模拟存储不可用：之后的所有调用返回 `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for MemoryAssignmentStore {
    async fn held_roles(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<HeldRole>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .active_held_roles(user_id, at)
            .into_iter()
            .map(|r| HeldRole {
                role_id: r.id,
                name: r.name.clone(),
                level: r.level,
                is_superadmin_granting: r.is_superadmin_granting,
            })
            .collect())
    }

    async fn role_permission_codes(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<String>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut codes = BTreeSet::new();
        for role in state.active_held_roles(user_id, at) {
            for (_, permission_id) in state
                .role_permissions
                .range((role.id, Uuid::nil())..=(role.id, Uuid::max()))
                .map(|(key, _)| key)
            {
                if let Some(code) = state.active_code(permission_id) {
                    codes.insert(code.to_string());
                }
            }
        }

        Ok(codes.into_iter().collect())
    }

    async fn direct_permission_codes(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.check_available()?;
        let state = self.state.read().await;

        let codes: BTreeSet<String> = state
            .user_permissions
            .range((user_id, Uuid::nil())..=(user_id, Uuid::max()))
            .filter(|(_, row)| is_unexpired(row.expires_at, at))
            .filter_map(|((_, permission_id), _)| state.active_code(permission_id))
            .map(str::to_string)
            .collect();

        Ok(codes.into_iter().collect())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(roles)
    }

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>> {
        self.check_available()?;
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn list_permissions(&self, query: &PermissionQuery) -> Result<Vec<Permission>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut permissions: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>> {
        self.check_available()?;
        Ok(self.state.read().await.permissions.get(&permission_id).cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.code == code).cloned())
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<RolePermission>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut rows: Vec<RolePermission> = state
            .role_permissions
            .range((role_id, Uuid::nil())..=(role_id, Uuid::max()))
            .filter_map(|((role_id, permission_id), row)| {
                state.permissions.get(permission_id).map(|p| RolePermission {
                    role_id: *role_id,
                    permission_id: *permission_id,
                    permission_code: p.code.clone(),
                    granted_at: row.granted_at,
                    granted_by: row.granted_by,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.permission_code.cmp(&b.permission_code));
        Ok(rows)
    }

    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut rows: Vec<UserRole> = state
            .user_roles
            .range((user_id, Uuid::nil())..=(user_id, Uuid::max()))
            .filter_map(|((user_id, role_id), row)| {
                state.roles.get(role_id).map(|r| UserRole {
                    user_id: *user_id,
                    role_id: *role_id,
                    role_name: r.name.clone(),
                    role_level: r.level,
                    assigned_at: row.granted_at,
                    assigned_by: row.granted_by,
                    expires_at: row.expires_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.role_level
                .cmp(&a.role_level)
                .then_with(|| a.role_name.cmp(&b.role_name))
                .then_with(|| a.role_id.cmp(&b.role_id))
        });
        Ok(rows)
    }

    async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<UserPermission>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut rows: Vec<UserPermission> = state
            .user_permissions
            .range((user_id, Uuid::nil())..=(user_id, Uuid::max()))
            .filter_map(|((user_id, permission_id), row)| {
                state.permissions.get(permission_id).map(|p| UserPermission {
                    user_id: *user_id,
                    permission_id: *permission_id,
                    permission_code: p.code.clone(),
                    granted_at: row.granted_at,
                    granted_by: row.granted_by,
                    expires_at: row.expires_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.permission_code.cmp(&b.permission_code));
        Ok(rows)
    }

    async fn create_role(&self, req: &CreateRoleRequest, at: DateTime<Utc>) -> Result<Role> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.name_taken(&req.name, req.tenant_tag.as_deref(), None) {
            return Err(AppError::Conflict("role already exists".to_string()));
        }

        let role = Role {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            description: req.description.clone(),
            level: req.level,
            tenant_tag: req.tenant_tag.clone(),
            is_superadmin_granting: req.superadmin_granting(),
            is_system: false,
            is_active: true,
            created_at: at,
            updated_at: at,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: Uuid,
        req: &UpdateRoleRequest,
        at: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let Some(current) = state.roles.get(&role_id).cloned() else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            if state.name_taken(name, current.tenant_tag.as_deref(), Some(role_id)) {
                return Err(AppError::Conflict("role already exists".to_string()));
            }
        }

        let mut role = current;
        if let Some(name) = &req.name {
            role.name = name.clone();
        }
        if let Some(description) = &req.description {
            role.description = Some(description.clone());
        }
        if let Some(level) = req.level {
            role.level = level;
        }
        if let Some(is_active) = req.is_active {
            role.is_active = is_active;
        }
        if let Some(flag) = req.is_superadmin_granting {
            role.is_superadmin_granting = flag;
        }
        role.updated_at = at;

        state.roles.insert(role_id, role.clone());
        Ok(Some(role))
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.roles.remove(&role_id).is_none() {
            return Ok(false);
        }
        state.role_permissions.retain(|(r, _), _| *r != role_id);
        state.user_roles.retain(|(_, r), _| *r != role_id);
        Ok(true)
    }

    async fn upsert_permissions(&self, definitions: &[PermissionDefinition]) -> Result<u64> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut affected = 0;

        for def in definitions {
            if let Some(existing) = state.permissions.values_mut().find(|p| p.code == def.code) {
                if existing.description.as_deref() != Some(def.description.as_str()) {
                    existing.description = Some(def.description.clone());
                    affected += 1;
                }
                continue;
            }

            let permission = Permission {
                id: Uuid::new_v4(),
                code: def.code.clone(),
                module: def.module.clone(),
                resource: def.resource.clone(),
                action: def.action.clone(),
                description: Some(def.description.clone()),
                is_active: true,
                created_at: now,
            };
            state.permissions.insert(permission.id, permission);
            affected += 1;
        }

        Ok(affected)
    }

    async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.roles.contains_key(&role_id) {
            return Err(AppError::NotFound("role".to_string()));
        }

        let mut staged = state.role_permissions.clone();
        staged.retain(|(r, _), _| *r != role_id);

        for permission_id in permission_ids {
            if !state.permissions.contains_key(permission_id) {
                // staged 被丢弃，原列表保持不变
                return Err(AppError::NotFound("permission".to_string()));
            }
            staged.entry((role_id, *permission_id)).or_insert(GrantRow {
                granted_at: at,
                granted_by,
                expires_at: None,
            });
        }

        state.role_permissions = staged;
        Ok(())
    }

    async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.roles.contains_key(&role_id) || !state.permissions.contains_key(&permission_id) {
            return Err(AppError::NotFound("role or permission".to_string()));
        }
        if state.role_permissions.contains_key(&(role_id, permission_id)) {
            return Ok(false);
        }
        state.role_permissions.insert(
            (role_id, permission_id),
            GrantRow {
                granted_at: at,
                granted_by,
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn revoke_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        Ok(state.role_permissions.remove(&(role_id, permission_id)).is_some())
    }

    async fn assign_role(&self, grant: Grant) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.roles.contains_key(&grant.target_id) {
            return Err(AppError::NotFound("role".to_string()));
        }
        Ok(State::upsert_grant(&mut state.user_roles, grant))
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        Ok(state.user_roles.remove(&(user_id, role_id)).is_some())
    }

    async fn grant_user_permission(&self, grant: Grant) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.permissions.contains_key(&grant.target_id) {
            return Err(AppError::NotFound("permission".to_string()));
        }
        Ok(State::upsert_grant(&mut state.user_permissions, grant))
    }

    async fn revoke_user_permission(&self, user_id: Uuid, permission_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        Ok(state.user_permissions.remove(&(user_id, permission_id)).is_some())
    }
}

/// 内存版审计日志
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    unavailable: AtomicBool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: NewAuditEntry, at: DateTime<Utc>) -> Result<AuditEntry> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(sqlx::Error::PoolTimedOut));
        }

        let row = AuditEntry {
            id: Uuid::new_v4(),
            action: entry.action,
            actor_id: entry.actor_id,
            target_user_id: entry.target_user_id,
            target_role_id: entry.target_role_id,
            target_permission_id: entry.target_permission_id,
            details: entry.details,
            ip_address: entry.ip_address,
            created_at: at,
        };
        self.entries.write().await.push(row.clone());
        Ok(row)
    }

    async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;

        // 追加顺序即时间顺序；倒序遍历得到最新在前
        let mut rows: Vec<&AuditEntry> = entries.iter().rev().filter(|e| query.matches(e)).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditAction;
    use chrono::Duration;

    async fn seeded() -> (MemoryAssignmentStore, Uuid, Uuid) {
        let store = MemoryAssignmentStore::new();
        store
            .upsert_permissions(&[
                PermissionDefinition::new("procurement.purchase_order.approve", "approve").unwrap(),
                PermissionDefinition::new("procurement.purchase_order.delete", "delete").unwrap(),
            ])
            .await
            .unwrap();
        let approve = store
            .find_permission_by_code("procurement.purchase_order.approve")
            .await
            .unwrap()
            .unwrap()
            .id;
        let delete = store
            .find_permission_by_code("procurement.purchase_order.delete")
            .await
            .unwrap()
            .unwrap()
            .id;
        (store, approve, delete)
    }

    fn create_req(name: &str, level: i32) -> CreateRoleRequest {
        CreateRoleRequest {
            name: name.to_string(),
            description: None,
            level,
            tenant_tag: None,
            is_superadmin_granting: None,
        }
    }

    #[tokio::test]
    async fn test_new_store_has_system_superadmin() {
        let store = MemoryAssignmentStore::new();
        let role = store.find_role(SUPERADMIN_ROLE_ID).await.unwrap().unwrap();
        assert!(role.is_system);
        assert!(role.grants_superadmin());
    }

    #[tokio::test]
    async fn test_upsert_keeps_ids_stable() {
        let (store, approve, _) = seeded().await;
        let changed = store
            .upsert_permissions(&[PermissionDefinition::new(
                "procurement.purchase_order.approve",
                "approve",
            )
            .unwrap()])
            .await
            .unwrap();
        assert_eq!(changed, 0);
        let again = store
            .find_permission_by_code("procurement.purchase_order.approve")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, approve);
    }

    #[tokio::test]
    async fn test_duplicate_role_name_conflicts_within_tenant() {
        let store = MemoryAssignmentStore::new();
        let now = Utc::now();
        store.create_role(&create_req("Clerk", 5), now).await.unwrap();

        let err = store.create_role(&create_req("Clerk", 5), now).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut other_tenant = create_req("Clerk", 5);
        other_tenant.tenant_tag = Some("branch-a".to_string());
        assert!(store.create_role(&other_tenant, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent_and_renews_expired() {
        let (store, _, _) = seeded().await;
        let now = Utc::now();
        let role = store.create_role(&create_req("Supervisor", 10), now).await.unwrap();
        let user = Uuid::new_v4();

        let grant = Grant {
            user_id: user,
            target_id: role.id,
            granted_by: None,
            expires_at: Some(now + Duration::hours(1)),
            at: now,
        };
        assert!(store.assign_role(grant).await.unwrap());
        assert!(!store.assign_role(grant).await.unwrap());

        let later = now + Duration::hours(2);
        assert!(store.held_roles(user, later).await.unwrap().is_empty());

        let renewed = Grant {
            expires_at: None,
            at: later,
            ..grant
        };
        assert!(store.assign_role(renewed).await.unwrap());
        assert_eq!(store.held_roles(user, later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_role_and_permission_are_excluded() {
        let (store, approve, delete) = seeded().await;
        let now = Utc::now();
        let role = store.create_role(&create_req("Supervisor", 10), now).await.unwrap();
        let user = Uuid::new_v4();
        store
            .set_role_permissions(role.id, &[approve, delete], None, now)
            .await
            .unwrap();
        store
            .assign_role(Grant {
                user_id: user,
                target_id: role.id,
                granted_by: None,
                expires_at: None,
                at: now,
            })
            .await
            .unwrap();

        assert_eq!(store.role_permission_codes(user, now).await.unwrap().len(), 2);

        store
            .update_role(
                role.id,
                &UpdateRoleRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert!(store.held_roles(user, now).await.unwrap().is_empty());
        assert!(store.role_permission_codes(user, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_role_permissions_rolls_back_on_unknown_permission() {
        let (store, approve, delete) = seeded().await;
        let now = Utc::now();
        let role = store.create_role(&create_req("Supervisor", 10), now).await.unwrap();
        store.set_role_permissions(role.id, &[approve], None, now).await.unwrap();

        let err = store
            .set_role_permissions(role.id, &[delete, Uuid::new_v4()], None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let codes: Vec<String> = store
            .role_permissions(role.id)
            .await
            .unwrap()
            .into_iter()
            .map(|rp| rp.permission_code)
            .collect();
        assert_eq!(codes, vec!["procurement.purchase_order.approve"]);
    }

    #[tokio::test]
    async fn test_delete_role_cascades() {
        let (store, approve, _) = seeded().await;
        let now = Utc::now();
        let role = store.create_role(&create_req("Temp", 1), now).await.unwrap();
        let user = Uuid::new_v4();
        store.grant_permission_to_role(role.id, approve, None, now).await.unwrap();
        store
            .assign_role(Grant {
                user_id: user,
                target_id: role.id,
                granted_by: None,
                expires_at: None,
                at: now,
            })
            .await
            .unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(store.user_roles(user).await.unwrap().is_empty());
        assert!(store.role_permissions(role.id).await.unwrap().is_empty());
        assert!(!store.delete_role(role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryAssignmentStore::new();
        store.set_unavailable(true);
        let err = store.held_roles(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_audit_list_newest_first_with_paging() {
        let audit = MemoryAuditStore::new();
        let start = Utc::now();
        for i in 0..5 {
            audit
                .append(
                    NewAuditEntry::new(AuditAction::RoleCreated, None).details(format!("#{}", i)),
                    start + Duration::seconds(i),
                )
                .await
                .unwrap();
        }

        let page = audit
            .list(&AuditQuery {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let details: Vec<_> = page.iter().filter_map(|e| e.details.as_deref()).collect();
        assert_eq!(details, vec!["#3", "#2"]);
    }
}
