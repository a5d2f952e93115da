//! 用户角色与直接授权的 HTTP 处理器

use super::bad_json;
use crate::{
    error::AppError,
    middleware::{AppState, RequestActor},
    models::{permission::GrantPermissionRequest, role::AssignRoleRequest},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出用户的角色分配（含已过期的行）
pub async fn list_user_roles(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.authorization_service.get_user_roles(user_id).await?;

    Ok(Json(json!({
        "user_id": user_id,
        "count": roles.len(),
        "roles": roles,
    })))
}

pub async fn assign_user_role(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(user_id): Path<Uuid>,
    req: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let changed = state
        .authorization_service
        .assign_role_to_user(user_id, req.role_id, req.expires_at, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}

pub async fn revoke_user_role(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state
        .authorization_service
        .revoke_role_from_user(user_id, role_id, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}

/// 列出用户的直接授权
pub async fn list_user_permissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state
        .authorization_service
        .get_user_direct_permissions(user_id)
        .await?;

    Ok(Json(json!({
        "user_id": user_id,
        "count": permissions.len(),
        "permissions": permissions,
    })))
}

pub async fn grant_user_permission(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(user_id): Path<Uuid>,
    req: Result<Json<GrantPermissionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let changed = state
        .authorization_service
        .grant_permission_to_user(user_id, req.permission_id, req.expires_at, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}

pub async fn revoke_user_permission(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path((user_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state
        .authorization_service
        .revoke_permission_from_user(user_id, permission_id, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}

/// 用户的有效权限（解析失败时返回错误，而不是空集合）
pub async fn effective_permissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let set = state
        .authorization_service
        .get_user_permissions(user_id)
        .await?;

    Ok(Json(set))
}
