// ==========================================
// 新品工单表单配置 - 服务主入口
// ==========================================
// 流程: 日志 -> 运行配置 -> AppState -> 默认配置初始化 -> HTTP 服务
// ==========================================

use anyhow::Context;
use tokio::net::TcpListener;

use ticket_form_config::app::{build_router, AppState};
use ticket_form_config::config::AppConfig;
use ticket_form_config::domain::types::CallerContext;
use ticket_form_config::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", ticket_form_config::APP_NAME);
    tracing::info!("系统版本: {}", ticket_form_config::VERSION);
    tracing::info!("==================================================");

    let config = AppConfig::from_env().context("加载运行配置失败")?;
    tracing::info!(
        "运行配置: db={}, bind={}, cache_ttl={}s, cache_max_entries={}, seed_default={}",
        config.db_path,
        config.bind_addr,
        config.cache_ttl.as_secs(),
        config.cache_max_entries,
        config.seed_default
    );

    let state = AppState::new(&config)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    if config.seed_default {
        let api = state.form_config_api.clone();
        let seeded = tokio::task::spawn_blocking(move || api.seed_default_if_empty(&CallerContext::system()))
            .await
            .context("默认配置初始化任务失败")?
            .context("默认配置初始化失败")?;
        if let Some(seeded) = seeded {
            tracing::info!("已创建默认表单配置: id={}, name={}", seeded.config_id, seeded.name);
        }
    }

    let app = build_router(state);
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("监听地址绑定失败: {}", config.bind_addr))?;
    tracing::info!("服务已启动: http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM 监听注册失败，仅监听 Ctrl-C: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("收到停止信号，正在关闭服务");
}
