//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 签发访问令牌的有效期（秒）
    pub access_token_exp_secs: u64,
    /// 是否信任 X-Forwarded-For 头（审计记录客户端 IP）
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// false 时使用 no-op 缓存
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_capacity: u64,
    /// 单次缓存调用的超时（毫秒），超时按未命中处理
    pub op_timeout_ms: u64,
    /// 后台回写的超时（秒）
    pub write_timeout_secs: u64,
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 900,
            max_capacity: 100_000,
            op_timeout_ms: 200,
            write_timeout_secs: 3,
            key_prefix: "rbac:perms".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    /// 启动时写入内置权限目录
    pub seed_catalog: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub rbac: RbacConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 900)?
            .set_default("security.trust_proxy", true)?
            .set_default("cache.enabled", true)?
            .set_default("cache.ttl_secs", 900)?
            .set_default("cache.max_capacity", 100_000)?
            .set_default("cache.op_timeout_ms", 200)?
            .set_default("cache.write_timeout_secs", 3)?
            .set_default("cache.key_prefix", "rbac:perms")?
            .set_default("rbac.seed_catalog", true)?
            // 前缀为 RBAC_，层级分隔符为 __，例如 RBAC_CACHE__TTL_SECS
            .add_source(
                Environment::with_prefix("RBAC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = settings.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > 86400 {
            return Err(ConfigError::Message(
                "cache.ttl_secs must be between 1 and 86400".to_string(),
            ));
        }

        if self.cache.op_timeout_ms == 0 || self.cache.op_timeout_ms > 10_000 {
            return Err(ConfigError::Message(
                "cache.op_timeout_ms must be between 1 and 10000".to_string(),
            ));
        }

        if self.cache.write_timeout_secs == 0 || self.cache.write_timeout_secs > 30 {
            return Err(ConfigError::Message(
                "cache.write_timeout_secs must be between 1 and 30".to_string(),
            ));
        }

        Ok(())
    }
}
