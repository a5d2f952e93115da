//! 日志与追踪系统
//! 初始化结构化日志

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统（RUST_LOG 优先于配置）
pub fn init_telemetry(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );
}

/// 指标名称
pub mod metric_names {
    pub const CACHE_HITS: &str = "rbac_permission_cache_hits_total";
    pub const CACHE_MISSES: &str = "rbac_permission_cache_misses_total";
    pub const CACHE_ERRORS: &str = "rbac_permission_cache_errors_total";
    pub const RESOLUTIONS: &str = "rbac_permission_resolutions_total";
    pub const DENIED: &str = "rbac_authorization_denied_total";
}
