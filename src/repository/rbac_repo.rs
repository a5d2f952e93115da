//! RBAC repository (PostgreSQL 权限数据访问)

use super::{map_write_error, AssignmentStore, Grant};
use crate::{
    error::Result,
    models::{
        permission::{Permission, PermissionDefinition, PermissionQuery},
        role::{
            CreateRoleRequest, HeldRole, Role, RolePermission, UpdateRoleRequest, UserPermission,
            UserRole,
        },
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgAssignmentStore {
    db: PgPool,
}

impl PgAssignmentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssignmentStore for PgAssignmentStore {
    // ==================== Resolution ====================

    async fn held_roles(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<HeldRole>> {
        let roles = sqlx::query_as::<_, HeldRole>(
            r#"
            SELECT r.id AS role_id, r.name, r.level, r.is_superadmin_granting
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
              AND r.is_active = TRUE
              AND (ur.expires_at IS NULL OR ur.expires_at > $2)
            ORDER BY r.level DESC, r.name, r.id
            "#,
        )
        .bind(user_id)
        .bind(at)
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    async fn role_permission_codes(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.code
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            JOIN role_permissions rp ON rp.role_id = r.id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
              AND r.is_active = TRUE
              AND p.is_active = TRUE
              AND (ur.expires_at IS NULL OR ur.expires_at > $2)
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .bind(at)
        .fetch_all(&self.db)
        .await?;

        Ok(codes)
    }

    async fn direct_permission_codes(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.code
            FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE up.user_id = $1
              AND p.is_active = TRUE
              AND (up.expires_at IS NULL OR up.expires_at > $2)
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .bind(at)
        .fetch_all(&self.db)
        .await?;

        Ok(codes)
    }

    // ==================== Catalog & roles ====================

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY level DESC, name, id")
            .fetch_all(&self.db)
            .await?;

        Ok(roles)
    }

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    async fn list_permissions(&self, query: &PermissionQuery) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT *
            FROM permissions
            WHERE ($1::text IS NULL OR module = $1)
              AND ($2::text IS NULL OR resource = $2)
              AND ($3 OR is_active = TRUE)
            ORDER BY code
            "#,
        )
        .bind(query.module.as_deref())
        .bind(query.resource.as_deref())
        .bind(query.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn find_permission(&self, permission_id: Uuid) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
            .bind(permission_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(permission)
    }

    async fn find_permission_by_code(&self, code: &str) -> Result<Option<Permission>> {
        let permission =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.db)
                .await?;

        Ok(permission)
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<RolePermission>> {
        let rows = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.role_id, rp.permission_id, p.code AS permission_code,
                   rp.granted_at, rp.granted_by
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn user_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>> {
        let rows = sqlx::query_as::<_, UserRole>(
            r#"
            SELECT ur.user_id, ur.role_id, r.name AS role_name, r.level AS role_level,
                   ur.assigned_at, ur.assigned_by, ur.expires_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.level DESC, r.name, r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<UserPermission>> {
        let rows = sqlx::query_as::<_, UserPermission>(
            r#"
            SELECT up.user_id, up.permission_id, p.code AS permission_code,
                   up.granted_at, up.granted_by, up.expires_at
            FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE up.user_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    // ==================== Mutations ====================

    async fn create_role(&self, req: &CreateRoleRequest, at: DateTime<Utc>) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (
                id, name, description, level, tenant_tag, is_superadmin_granting,
                is_system, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, TRUE, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.level)
        .bind(&req.tenant_tag)
        .bind(req.superadmin_granting())
        .bind(at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "role"))?;

        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: Uuid,
        req: &UpdateRoleRequest,
        at: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                level = COALESCE($4, level),
                is_active = COALESCE($5, is_active),
                is_superadmin_granting = COALESCE($6, is_superadmin_granting),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(role_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.level)
        .bind(req.is_active)
        .bind(req.is_superadmin_granting)
        .bind(at)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "role"))?;

        Ok(role)
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<bool> {
        // role_permissions / user_roles 通过 ON DELETE CASCADE 清理
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_permissions(&self, definitions: &[PermissionDefinition]) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        let mut affected = 0;

        for def in definitions {
            let result = sqlx::query(
                r#"
                INSERT INTO permissions (id, code, module, resource, action, description)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (code) DO UPDATE
                SET description = EXCLUDED.description
                WHERE permissions.description IS DISTINCT FROM EXCLUDED.description
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&def.code)
            .bind(&def.module)
            .bind(&def.resource)
            .bind(&def.action)
            .bind(&def.description)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        // 任一步失败时 tx 被丢弃，自动回滚到原列表
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for permission_id in permission_ids {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id, granted_at, granted_by)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (role_id, permission_id) DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_id)
            .bind(at)
            .bind(granted_by)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "permission"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, granted_at, granted_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(at)
        .bind(granted_by)
        .execute(&self.db)
        .await
        .map_err(|e| map_write_error(e, "role or permission"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_role(&self, grant: Grant) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, assigned_at, assigned_by, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, role_id) DO UPDATE
            SET assigned_at = EXCLUDED.assigned_at,
                assigned_by = EXCLUDED.assigned_by,
                expires_at = EXCLUDED.expires_at
            WHERE user_roles.expires_at IS NOT NULL
              AND user_roles.expires_at <= EXCLUDED.assigned_at
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.target_id)
        .bind(grant.at)
        .bind(grant.granted_by)
        .bind(grant.expires_at)
        .execute(&self.db)
        .await
        .map_err(|e| map_write_error(e, "role"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn grant_user_permission(&self, grant: Grant) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permission_id, granted_at, granted_by, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, permission_id) DO UPDATE
            SET granted_at = EXCLUDED.granted_at,
                granted_by = EXCLUDED.granted_by,
                expires_at = EXCLUDED.expires_at
            WHERE user_permissions.expires_at IS NOT NULL
              AND user_permissions.expires_at <= EXCLUDED.granted_at
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.target_id)
        .bind(grant.at)
        .bind(grant.granted_by)
        .bind(grant.expires_at)
        .execute(&self.db)
        .await
        .map_err(|e| map_write_error(e, "permission"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_user_permission(&self, user_id: Uuid, permission_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2")
                .bind(user_id)
                .bind(permission_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
