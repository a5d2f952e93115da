//! ERP 授权服务主入口

use erp_rbac::{
    auth::JwtService,
    cache::build_permission_cache,
    catalog::PermissionCatalog,
    config::AppConfig,
    db,
    events::default_registry,
    handlers::health,
    middleware::AppState,
    repository::{PgAssignmentStore, PgAuditStore},
    routes,
    services::{AuditService, AuthorizationService, Clock, SystemClock},
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("erp-rbac {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("未知参数: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）；生产环境直接设置环境变量
    if let Ok(env) = std::env::var("RBAC_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 日志
    telemetry::init_telemetry(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ERP RBAC service starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Assignment store initialized");

    // 4. 组装服务
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let audit_service = Arc::new(AuditService::new(
        Arc::new(PgAuditStore::new(db_pool.clone())),
        Arc::new(default_registry()),
        clock.clone(),
    ));
    let authorization_service = Arc::new(AuthorizationService::new(
        Arc::new(PgAssignmentStore::new(db_pool.clone())),
        build_permission_cache(&config.cache),
        audit_service.clone(),
        clock,
        config.cache.write_timeout(),
    ));

    let catalog = Arc::new(PermissionCatalog::builtin()?);
    if config.rbac.seed_catalog {
        authorization_service.seed_catalog(&catalog).await?;
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db: Some(db_pool),
        catalog,
        jwt_service: Arc::new(JwtService::from_config(&config)?),
        authorization_service,
        audit_service,
    });

    // 5. 路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理；收到信号后超时仍未退出则强制结束
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

fn print_help() {
    println!("erp-rbac {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: erp-rbac [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 RBAC_ 前缀的环境变量完成，例如 RBAC_DATABASE__URL");
    println!("  可用选项请参考 .env.example");
}
