//! 权限目录查询

use super::bad_query;
use crate::{error::AppError, middleware::AppState, models::PermissionQuery};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 列出权限（可按 module / resource 过滤，未知参数返回 400）
pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PermissionQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(bad_query)?;
    let permissions = state.authorization_service.list_permissions(&query).await?;

    Ok(Json(json!({
        "count": permissions.len(),
        "permissions": permissions,
    })))
}
