use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use tracing::{debug, error, info};

use super::spawn_event_loop;
use crate::services::navigator::site_root;

/// 连接到已运行的浏览器并打开工作页面
///
/// 优先复用地址以 `start_url` 的站点开头的已有标签页，否则新建一个。
pub async fn connect_to_browser_and_page(port: u16, start_url: &str) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    spawn_event_loop(handler).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    let site = site_root(start_url);
    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            if url.starts_with(&site) {
                info!("✓ 复用已打开的页面: {}", url);
                return Ok((browser, p.clone()));
            }
        }
    }

    debug!("未找到匹配的页面，创建新页面并导航到: {}", start_url);
    let page = browser
        .new_page(start_url)
        .await
        .with_context(|| format!("创建页面失败: {}", start_url))?;
    info!("已导航到: {}", start_url);

    Ok((browser, page))
}
