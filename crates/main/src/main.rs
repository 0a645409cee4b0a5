//! 主应用程序入口
//!
//! 加载配置、装配存储与应用层，执行初始化数据后启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{ChatApplication, Clock, DatabaseSeeder, SystemClock};
use config::AppConfig;
use infrastructure::Infrastructure;
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(config = ?config.sanitized(), "configuration loaded");

    let infrastructure = Infrastructure::connect(&config)
        .await
        .context("failed to initialize storage")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let seeder = DatabaseSeeder::new(
        infrastructure.user_repository.clone(),
        infrastructure.chat_repository.clone(),
        infrastructure.password_hasher.clone(),
        clock.clone(),
    );
    let report = seeder
        .seed(&config.seed)
        .await
        .context("failed to seed database")?;
    tracing::info!(
        users_created = report.users_created,
        default_chat_created = report.default_chat_created,
        "seeding finished"
    );

    let application = ChatApplication::new(infrastructure.application_dependencies(clock));
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let state = AppState::new(application, infrastructure.hub.clone(), jwt_service);

    let app = router(state).layer(cors_layer(&config.server.cors_origins));
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(%address, "family chat server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = &infrastructure.pool {
        pool.close().await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
