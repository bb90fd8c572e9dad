//! 自行启动浏览器
//!
//! 无头模式、窗口大小和可执行文件路径都取自 [`Config`]。

use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use tracing::{debug, error, info};

use super::spawn_event_loop;
use crate::config::Config;

/// 启动参数（与模式无关的部分）
pub fn launch_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    // 容器内以 root 运行时没有沙箱可用
    if config.headless {
        args.push("--no-sandbox".to_string());
    }
    args
}

fn browser_config(config: &Config) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.window_width, config.window_height)
        .args(launch_args(config));
    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = &config.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow!("配置浏览器失败: {}", e)
    })
}

/// 启动浏览器并打开起始地址
pub async fn launch_browser(config: &Config) -> Result<(Browser, Page)> {
    info!(
        "🚀 启动浏览器 ({}, {}x{})...",
        if config.headless { "无头" } else { "有界面" },
        config.window_width,
        config.window_height
    );
    if let Some(path) = &config.chrome_executable {
        debug!("浏览器路径: {}", path.display());
    }

    let (browser, handler) = Browser::launch(browser_config(config)?)
        .await
        .map_err(|e| {
            error!("启动浏览器失败: {}", e);
            anyhow!("启动浏览器失败: {}", e)
        })?;
    spawn_event_loop(handler).await;

    let page = browser
        .new_page(config.start_url.as_str())
        .await
        .with_context(|| format!("创建页面失败: {}", config.start_url))?;
    info!("✅ 浏览器已导航到: {}", config.start_url);

    Ok((browser, page))
}
