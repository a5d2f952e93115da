//! 角色管理的 HTTP 处理器

use super::bad_json;
use crate::{
    error::AppError,
    middleware::{AppState, RequestActor},
    models::{
        permission::SetRolePermissionsRequest,
        role::{CreateRoleRequest, UpdateRoleRequest},
    },
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出角色
pub async fn list_roles(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let roles = state.authorization_service.list_roles().await?;

    Ok(Json(json!({
        "count": roles.len(),
        "roles": roles,
    })))
}

/// 获取角色详情（含权限）
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.authorization_service.get_role(id).await?))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    req: Result<Json<CreateRoleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let role = state.authorization_service.create_role(&req, &actor).await?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// 更新角色
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
    req: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let role = state.authorization_service.update_role(id, &req, &actor).await?;

    Ok(Json(role))
}

/// 删除角色（系统角色受保护）
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.authorization_service.delete_role(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_role_permissions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.authorization_service.get_role_permissions(id).await?;

    Ok(Json(json!({
        "role_id": id,
        "count": permissions.len(),
        "permissions": permissions,
    })))
}

/// 整体替换角色权限列表
pub async fn set_role_permissions(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
    req: Result<Json<SetRolePermissionsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    state
        .authorization_service
        .set_role_permissions(id, &req.permission_ids, &actor)
        .await?;

    let permissions = state.authorization_service.get_role_permissions(id).await?;
    Ok(Json(json!({
        "role_id": id,
        "count": permissions.len(),
        "permissions": permissions,
    })))
}

pub async fn grant_role_permission(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state
        .authorization_service
        .grant_permission_to_role(id, permission_id, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}

pub async fn revoke_role_permission(
    State(state): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state
        .authorization_service
        .revoke_permission_from_role(id, permission_id, &actor)
        .await?;

    Ok(Json(json!({ "changed": changed })))
}
