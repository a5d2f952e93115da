//! 当前用户的权限视图

use crate::{
    middleware::{AppState, Permissions},
    models::UserPermissionSet,
};
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct MyPermissionsResponse {
    #[serde(flatten)]
    pub permissions: UserPermissionSet,
    /// 可访问的业务模块
    pub modules: Vec<String>,
}

pub async fn my_permissions(
    State(state): State<Arc<AppState>>,
    Permissions(set): Permissions,
) -> Json<MyPermissionsResponse> {
    let modules = state
        .catalog
        .modules()
        .into_iter()
        .filter(|module| set.has_module_access(module))
        .map(str::to_string)
        .collect();

    Json(MyPermissionsResponse {
        permissions: set.as_ref().clone(),
        modules,
    })
}
