//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use crate::models::{PermissionRequirement, UserPermissionSet};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Assignment store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Permission denied: requires {0}")]
    PermissionDenied(PermissionRequirement),

    #[error("Protected resource: {0}")]
    ProtectedResource(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) | AppError::ProtectedResource(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::PermissionDenied(_) => "Permission denied".to_string(),
            AppError::ProtectedResource(msg) => format!("Protected resource: {}", msg),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::Conflict(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::StoreUnavailable(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn protected(msg: &str) -> Self {
        AppError::ProtectedResource(msg.to_string())
    }
}

/// 权限解析失败
///
/// 携带一个空的、非超级管理员的权限集合，调用方默认应据此拒绝访问。
#[derive(Debug, Error)]
#[error("failed to resolve permissions for user {user_id}: {source}")]
pub struct ResolveError {
    pub user_id: Uuid,
    pub fallback: UserPermissionSet,
    #[source]
    pub source: AppError,
}

impl ResolveError {
    pub fn new(user_id: Uuid, source: AppError) -> Self {
        Self {
            user_id,
            fallback: UserPermissionSet::new(user_id),
            source,
        }
    }

    /// 取出安全默认值（空集合）
    pub fn into_fallback(self) -> UserPermissionSet {
        self.fallback
    }
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        e.source
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
    /// 拒绝时所需的权限（不包含用户已有的权限）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<PermissionRequirement>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        let required = match &self {
            AppError::PermissionDenied(requirement) => Some(requirement.clone()),
            _ => None,
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
                required,
            },
        };

        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
