//! 健康检查处理器
//! 提供 /health 与 /ready 端点

use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::{db, middleware::AppState};

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 记录启动时刻（main 中尽早调用）
pub fn set_start_time() {
    Lazy::force(&STARTED_AT);
}

pub fn get_uptime() -> u64 {
    STARTED_AT.elapsed().as_secs()
}

/// 存活探针，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let mut checks = Vec::new();

    if let Some(pool) = &state.db {
        let (status, message) = match db::health_check(pool).await {
            db::HealthStatus::Healthy => ("healthy", None),
            db::HealthStatus::Unhealthy(msg) => ("unhealthy", Some(msg)),
        };
        checks.push(HealthCheck {
            name: "database".to_string(),
            status: status.to_string(),
            message,
        });
    }

    let ready = checks.iter().all(|c| c.status == "healthy");
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(ReadinessResponse { ready, checks }))
}
