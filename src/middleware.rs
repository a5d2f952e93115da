//! HTTP 中间件
//! 请求追踪、权限加载与路由级权限检查

use crate::{
    auth::{jwt::JwtService, middleware::AuthContext},
    catalog::PermissionCatalog,
    config::AppConfig,
    error::AppError,
    models::{PermissionRequirement, UserPermissionSet},
    services::{Actor, AuditService, AuthorizationService},
    telemetry::metric_names,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// 内存存储模式下为 None
    pub db: Option<sqlx::PgPool>,
    pub catalog: Arc<PermissionCatalog>,
    pub jwt_service: Arc<JwtService>,
    pub authorization_service: Arc<AuthorizationService>,
    pub audit_service: Arc<AuditService>,
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_class = match status {
            200..=299 => "2xx",
            401 => "401",
            403 => "403",
            404 => "404",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            headers.insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 获取客户端 IP（仅在信任代理时读取转发头）
pub fn client_ip(headers: &HeaderMap, trust_proxy: bool) -> Option<String> {
    if !trust_proxy {
        return None;
    }

    // X-Forwarded-For 可能包含多个 IP，取第一个
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.to_string())
}

/// 权限加载中间件（第一阶段）
///
/// 为已认证用户解析一次权限集合并放入请求扩展。
/// 解析失败时放入空集合，后续检查一律拒绝。
pub async fn load_permissions_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(auth) = req.extensions().get::<AuthContext>().copied() {
        let set = match state
            .authorization_service
            .get_user_permissions(auth.user_id)
            .await
        {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    user_id = %e.user_id,
                    error = %e.source,
                    "Permission resolution failed, continuing with empty permission set"
                );
                e.into_fallback()
            }
        };
        req.extensions_mut().insert(Arc::new(set));
    }

    next.run(req).await
}

/// 路由级权限检查（第二阶段）
///
/// 请求扩展中没有权限集合时视为拒绝。
pub async fn enforce(
    requirement: PermissionRequirement,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let set = req.extensions().get::<Arc<UserPermissionSet>>();
    let allowed = set.is_some_and(|set| set.satisfies(&requirement));

    if !allowed {
        metrics::counter!(metric_names::DENIED).increment(1);
        tracing::warn!(
            user_id = ?set.map(|s| s.user_id),
            required = ?requirement,
            path = %req.uri().path(),
            "Permission denied"
        );
        return Err(AppError::PermissionDenied(requirement));
    }

    Ok(next.run(req).await)
}

/// 当前请求的权限集合
#[derive(Debug, Clone)]
pub struct Permissions(pub Arc<UserPermissionSet>);

impl<S> FromRequestParts<S> for Permissions
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<UserPermissionSet>>()
            .cloned()
            .map(Permissions)
            .ok_or(AppError::Unauthorized)
    }
}

/// 发起本次变更的操作人（用户 ID 与客户端 IP）
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl FromRequestParts<Arc<AppState>> for RequestActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AppError::Unauthorized)?;
        let ip = client_ip(&parts.headers, state.config.security.trust_proxy);

        Ok(RequestActor(Actor::user(auth.user_id).with_ip(ip)))
    }
}
