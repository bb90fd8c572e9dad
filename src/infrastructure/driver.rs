//! UI 驱动抽象 - 基础设施层
//!
//! 工作流只通过这个 trait 接触浏览器。
//! 会话由 WorkflowEngine 独占，按顺序 await，不存在并发访问。

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::time::sleep;

use crate::config::PollPolicy;
use crate::error::DriverResult;
use crate::models::{ControlDescriptor, ControlHandle};

/// 控件定位方式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS 选择器
    Css(String),
    /// name 属性
    Name(String),
    /// 按可见文字查找（忽略大小写的包含匹配）
    Text { tag: String, needle: String },
}

impl Locator {
    pub fn css(query: impl Into<String>) -> Self {
        Locator::Css(query.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    pub fn text(tag: impl Into<String>, needle: impl Into<String>) -> Self {
        Locator::Text {
            tag: tag.into(),
            needle: needle.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(query) => write!(f, "css={}", query),
            Locator::Name(name) => write!(f, "name={}", name),
            Locator::Text { tag, needle } => write!(f, "{}[text~='{}']", tag, needle),
        }
    }
}

/// UI 自动化驱动
///
/// 失败以 `DriverError` 返回，调用方决定是否降级。
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    async fn title(&self) -> DriverResult<String>;

    /// 查找控件，找不到时返回空列表
    async fn locate(&self, locator: &Locator) -> DriverResult<Vec<ControlHandle>>;

    /// 读取控件的当前结构描述
    async fn describe(&self, handle: &ControlHandle) -> DriverResult<ControlDescriptor>;

    /// 原生点击
    async fn click(&self, handle: &ControlHandle) -> DriverResult<()>;

    /// 先移动指针到控件上，再点击
    async fn pointer_click(&self, handle: &ControlHandle) -> DriverResult<()>;

    async fn clear(&self, handle: &ControlHandle) -> DriverResult<()>;

    async fn type_text(&self, handle: &ControlHandle, text: &str) -> DriverResult<()>;

    /// 按 value 选中下拉框选项
    async fn select_option(&self, handle: &ControlHandle, value: &str) -> DriverResult<()>;

    async fn upload_file(&self, handle: &ControlHandle, path: &Path) -> DriverResult<()>;

    /// 执行脚本；`script` 是一个以控件为参数的函数表达式
    async fn execute_script(
        &self,
        script: &str,
        target: Option<&ControlHandle>,
    ) -> DriverResult<JsonValue>;

    /// 诊断截图（PNG）
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    fn set_implicit_wait(&self, wait: Duration);

    /// 等待定位结果至少有 `at_least` 个，返回最后一次看到的数量
    async fn wait_for_count(&self, locator: &Locator, at_least: usize, policy: PollPolicy) -> usize {
        let attempts = policy.max_attempts();
        let mut last = 0;
        for attempt in 0..attempts {
            last = self.locate(locator).await.map(|h| h.len()).unwrap_or(0);
            if last >= at_least {
                break;
            }
            if attempt + 1 < attempts {
                sleep(policy.interval).await;
            }
        }
        last
    }
}

/// 轮询条件直到成立或次数耗尽
pub async fn poll_until<F, Fut>(policy: PollPolicy, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = policy.max_attempts();
    for attempt in 0..attempts {
        if check().await {
            return true;
        }
        if attempt + 1 < attempts {
            sleep(policy.interval).await;
        }
    }
    false
}

/// 等待地址离开 `before`
pub async fn wait_for_url_change(driver: &dyn UiDriver, before: &str, policy: PollPolicy) -> bool {
    poll_until(policy, || async {
        driver
            .current_url()
            .await
            .map(|url| url != before)
            .unwrap_or(false)
    })
    .await
}

/// 查找并描述控件，驱动错误一律视为"没有"
pub async fn inspect(
    driver: &dyn UiDriver,
    locator: &Locator,
) -> Vec<(ControlHandle, ControlDescriptor)> {
    let handles = match driver.locate(locator).await {
        Ok(handles) => handles,
        Err(e) => {
            tracing::debug!("定位 {} 失败: {}", locator, e);
            return Vec::new();
        }
    };

    let mut found = Vec::with_capacity(handles.len());
    for handle in handles {
        match driver.describe(&handle).await {
            Ok(descriptor) => found.push((handle, descriptor)),
            Err(e) => tracing::debug!("读取控件 {} 失败: {}", handle.as_str(), e),
        }
    }
    found
}

/// 依次尝试多个定位方式，返回第一个非空结果中的第一个控件
pub async fn first_match(driver: &dyn UiDriver, locators: &[Locator]) -> Option<ControlHandle> {
    for locator in locators {
        if let Ok(handles) = driver.locate(locator).await {
            if let Some(handle) = handles.into_iter().next() {
                tracing::debug!("通过 {} 找到控件", locator);
                return Some(handle);
            }
        }
    }
    None
}

/// 注入页面的脚本片段，统一写成 `(el) => ...` 形式
pub mod scripts {
    /// 程序化点击，绕过指针事件
    pub const CLICK: &str = "(el) => { el.click(); return true; }";

    /// 把元素滚动到视口中央
    pub const SCROLL_INTO_VIEW: &str =
        "(el) => { el.scrollIntoView({block: 'center'}); return true; }";

    /// 直接写 value 并派发 input / change 事件；`literal` 必须是 JSON 字符串字面量
    pub fn set_value(literal: &str) -> String {
        format!(
            "(el) => {{ el.value = {}; el.dispatchEvent(new Event('input', {{ bubbles: true }})); el.dispatchEvent(new Event('change', {{ bubbles: true }})); return el.value; }}",
            literal
        )
    }
}
