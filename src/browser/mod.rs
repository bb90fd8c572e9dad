pub mod connection;
pub mod launch;

use chromiumoxide::Handler;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::sleep;

pub use connection::connect_to_browser_and_page;
pub use launch::launch_browser;

/// 在后台驱动浏览器事件循环，并等待浏览器状态同步
pub(crate) async fn spawn_event_loop(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    sleep(Duration::from_millis(300)).await;
}
