//! Audit repository (审计数据访问)

use super::AuditStore;
use crate::{
    error::Result,
    models::audit::{AuditEntry, AuditQuery, NewAuditEntry},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgAuditStore {
    db: PgPool,
}

impl PgAuditStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    /// 插入审计日志（只追加）
    async fn append(&self, entry: NewAuditEntry, at: DateTime<Utc>) -> Result<AuditEntry> {
        let row = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO rbac_audit_log (
                id, action, actor_id, target_user_id, target_role_id,
                target_permission_id, details, ip_address, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.action.as_str())
        .bind(entry.actor_id)
        .bind(entry.target_user_id)
        .bind(entry.target_role_id)
        .bind(entry.target_permission_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(at)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    /// 查询审计日志
    async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT *
            FROM rbac_audit_log
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::uuid IS NULL OR target_user_id = $2)
              AND ($3::uuid IS NULL OR target_role_id = $3)
              AND ($4::uuid IS NULL OR actor_id = $4 OR target_user_id = $4)
              AND ($5::text IS NULL OR action = $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at <= $7)
            ORDER BY created_at DESC, seq DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(query.actor_id)
        .bind(query.target_user_id)
        .bind(query.target_role_id)
        .bind(query.involving_user)
        .bind(query.action.map(|a| a.as_str()))
        .bind(query.since)
        .bind(query.until)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
