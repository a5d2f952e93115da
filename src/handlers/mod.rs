//! HTTP 处理器模块

pub mod audit;
pub mod health;
pub mod me;
pub mod permissions;
pub mod roles;
pub mod users;

use crate::error::AppError;
use axum::extract::rejection::{JsonRejection, QueryRejection};

/// 查询参数解析失败时统一返回 JSON 错误体
pub(crate) fn bad_query(rejection: QueryRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

pub(crate) fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}
