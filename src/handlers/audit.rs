//! 审计日志查询

use super::bad_query;
use crate::{error::AppError, middleware::AppState, models::AuditQuery};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出审计日志（按时间倒序分页）
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(bad_query)?;
    let entries = state.audit_service.list(&query).await?;

    Ok(Json(json!({
        "entries": entries,
        "count": entries.len(),
        "limit": query.limit(),
        "offset": query.offset(),
    })))
}

/// 与某个用户相关的审计日志（作为操作人或目标）
pub async fn list_user_audit_logs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(bad_query)?;
    let entries = state.audit_service.list_for_user(user_id, &query).await?;

    Ok(Json(json!({
        "user_id": user_id,
        "entries": entries,
        "count": entries.len(),
        "limit": query.limit(),
        "offset": query.offset(),
    })))
}
