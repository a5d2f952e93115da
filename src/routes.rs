//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state, Next},
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    auth::middleware::jwt_auth_middleware,
    handlers,
    middleware::{enforce, load_permissions_middleware, request_tracking_middleware, AppState},
    models::PermissionRequirement,
};

const MAX_BODY_BYTES: usize = 64 * 1024;

/// 为单个方法路由挂上权限检查
fn guard<S>(route: MethodRouter<S>, requirement: PermissionRequirement) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(from_fn(move |req: Request, next: Next| {
        let requirement = requirement.clone();
        async move { enforce(requirement, req, next).await }
    }))
}

fn requires<S>(route: MethodRouter<S>, code: &str) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    guard(route, PermissionRequirement::permission(code))
}

/// RBAC 管理路由（挂载于 /api/v1/rbac）
fn rbac_routes() -> Router<Arc<AppState>> {
    use handlers::{audit, permissions, roles, users};

    Router::new()
        // 角色
        .route(
            "/roles",
            requires(get(roles::list_roles), "rbac.role.read")
                .merge(requires(post(roles::create_role), "rbac.role.create")),
        )
        .route(
            "/roles/{id}",
            requires(get(roles::get_role), "rbac.role.read")
                .merge(requires(put(roles::update_role), "rbac.role.update"))
                .merge(requires(delete(roles::delete_role), "rbac.role.delete")),
        )
        .route(
            "/roles/{id}/permissions",
            requires(get(roles::list_role_permissions), "rbac.role.read")
                .merge(requires(put(roles::set_role_permissions), "rbac.role.update")),
        )
        .route(
            "/roles/{id}/permissions/{permission_id}",
            requires(post(roles::grant_role_permission), "rbac.role.update")
                .merge(requires(delete(roles::revoke_role_permission), "rbac.role.update")),
        )
        // 权限目录
        .route(
            "/permissions",
            requires(get(permissions::list_permissions), "rbac.permission.read"),
        )
        // 用户角色
        .route(
            "/users/{id}/roles",
            requires(get(users::list_user_roles), "rbac.user_role.read")
                .merge(requires(post(users::assign_user_role), "rbac.user_role.assign")),
        )
        .route(
            "/users/{id}/roles/{role_id}",
            requires(delete(users::revoke_user_role), "rbac.user_role.revoke"),
        )
        // 用户直接授权
        .route(
            "/users/{id}/permissions",
            requires(get(users::list_user_permissions), "rbac.user_permission.read")
                .merge(requires(post(users::grant_user_permission), "rbac.user_permission.grant")),
        )
        .route(
            "/users/{id}/permissions/{permission_id}",
            requires(delete(users::revoke_user_permission), "rbac.user_permission.revoke"),
        )
        .route(
            "/users/{id}/effective-permissions",
            guard(
                get(users::effective_permissions),
                PermissionRequirement::any_of(&["rbac.user_role.read", "rbac.user_permission.read"]),
            ),
        )
        // 审计
        .route("/audit", requires(get(audit::list_audit_logs), "rbac.audit.read"))
        .route(
            "/users/{id}/audit",
            requires(get(audit::list_user_audit_logs), "rbac.audit.read"),
        )
        // 整个管理面需要 rbac 模块访问权
        .route_layer(from_fn(|req: Request, next: Next| {
            enforce(PermissionRequirement::module("rbac"), req, next)
        }))
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 需要认证的路由：先校验令牌，再加载一次权限集合
    let authenticated_routes = Router::new()
        .route("/api/v1/me/permissions", get(handlers::me::my_permissions))
        .nest("/api/v1/rbac", rbac_routes())
        .layer(from_fn_with_state(state.clone(), load_permissions_middleware))
        .layer(from_fn_with_state(state.jwt_service.clone(), jwt_auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}
