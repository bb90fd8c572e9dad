//! Chrome 驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，把 `UiDriver` 的各项操作翻译成 CDP 调用和注入脚本。
//! 元素句柄是注入脚本写在元素上的 `data-wf-handle` 标记，后续调用靠它重新定位同一个元素。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::driver::{Locator, UiDriver};
use crate::models::{ControlDescriptor, ControlHandle, ControlKind, OptionCandidate};

const HANDLE_ATTR: &str = "data-wf-handle";
const IMPLICIT_WAIT_STEP: Duration = Duration::from_millis(100);

/// 给匹配到的元素打上句柄标记，返回句柄列表
const TAG_ELEMENTS_JS: &str = r#"(els) => {
    window.__wfHandleSeq = window.__wfHandleSeq || 0;
    return els.map((e) => {
        if (!e.dataset.wfHandle) {
            window.__wfHandleSeq += 1;
            e.dataset.wfHandle = String(window.__wfHandleSeq);
        }
        return e.dataset.wfHandle;
    });
}"#;

const DESCRIBE_JS: &str = r#"(el) => {
    const labelOf = (e) => {
        if (e.labels && e.labels.length) return e.labels[0].innerText || '';
        const wrap = e.closest('label');
        return wrap ? (wrap.innerText || '') : '';
    };
    return {
        tag: el.tagName.toLowerCase(),
        type: el.getAttribute('type'),
        name: el.getAttribute('name') || '',
        id: el.id || '',
        placeholder: el.getAttribute('placeholder') || '',
        label: labelOf(el).trim(),
        text: (el.innerText || el.value || '').trim(),
        visible: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length),
        enabled: !el.disabled,
        value: el.value === undefined ? '' : String(el.value),
        selected: !!el.checked,
        options: el.tagName === 'SELECT'
            ? Array.from(el.options).map((o) => ({ label: (o.text || '').trim(), value: o.value, selected: o.selected }))
            : [],
    };
}"#;

const CLEAR_JS: &str = r#"(el) => {
    el.value = '';
    el.dispatchEvent(new Event('input', { bubbles: true }));
    return true;
}"#;

#[derive(Debug, Deserialize)]
struct RawControl {
    tag: String,
    #[serde(rename = "type")]
    input_type: Option<String>,
    name: String,
    id: String,
    placeholder: String,
    label: String,
    text: String,
    visible: bool,
    enabled: bool,
    value: String,
    selected: bool,
    options: Vec<OptionCandidate>,
}

impl From<RawControl> for ControlDescriptor {
    fn from(raw: RawControl) -> Self {
        ControlDescriptor {
            kind: ControlKind::from_tag(&raw.tag, raw.input_type.as_deref()),
            name: raw.name,
            id: raw.id,
            placeholder: raw.placeholder,
            label: raw.label,
            text: raw.text,
            visible: raw.visible,
            enabled: raw.enabled,
            value: raw.value,
            selected: raw.selected,
            options: raw.options,
        }
    }
}

/// Chrome 驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 实现 `UiDriver`
/// - 不认识页面状态 / 记录字段
pub struct ChromeDriver {
    page: Page,
    implicit_wait_ms: AtomicU64,
}

impl ChromeDriver {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            implicit_wait_ms: AtomicU64::new(0),
        }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 表达式并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> DriverResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    /// 执行 JS 表达式并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> DriverResult<T> {
        let json_value = self.eval(js_code).await?;
        Ok(serde_json::from_value(json_value)?)
    }

    fn selector_of(handle: &ControlHandle) -> String {
        format!("[{}=\"{}\"]", HANDLE_ATTR, handle.as_str())
    }

    fn target_expr(handle: &ControlHandle) -> DriverResult<String> {
        Ok(format!(
            "document.querySelector({})",
            serde_json::to_string(&Self::selector_of(handle))?
        ))
    }

    /// 对句柄指向的元素调用 `(el) => ...` 形式的脚本
    async fn call_on(&self, script: &str, handle: &ControlHandle) -> DriverResult<JsonValue> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return {{ __stale: true }}; const r = ({})(el); return r === undefined ? null : r; }})()",
            Self::target_expr(handle)?,
            script
        );
        let value = self.eval(js).await?;
        if value.get("__stale").is_some() {
            return Err(DriverError::StaleHandle(handle.as_str().to_string()));
        }
        Ok(value)
    }

    async fn element(&self, handle: &ControlHandle) -> DriverResult<Element> {
        self.page
            .find_element(Self::selector_of(handle))
            .await
            .map_err(|_| DriverError::StaleHandle(handle.as_str().to_string()))
    }

    async fn locate_once(&self, locator: &Locator) -> DriverResult<Vec<ControlHandle>> {
        let collect = match locator {
            Locator::Css(query) => format!(
                "(() => {{ try {{ return Array.from(document.querySelectorAll({})); }} catch (e) {{ return []; }} }})()",
                serde_json::to_string(query)?
            ),
            Locator::Name(name) => format!(
                "Array.from(document.getElementsByName({}))",
                serde_json::to_string(name)?
            ),
            Locator::Text { tag, needle } => format!(
                "Array.from(document.querySelectorAll({})).filter((e) => (e.innerText || e.value || '').toLowerCase().includes({}))",
                serde_json::to_string(tag)?,
                serde_json::to_string(&needle.to_lowercase())?
            ),
        };
        let js = format!("({})({})", TAG_ELEMENTS_JS, collect);
        let ids: Vec<String> = self.eval_as(js).await?;
        Ok(ids.into_iter().map(ControlHandle::new).collect())
    }
}

#[async_trait]
impl UiDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn locate(&self, locator: &Locator) -> DriverResult<Vec<ControlHandle>> {
        let wait = Duration::from_millis(self.implicit_wait_ms.load(Ordering::Relaxed));
        let deadline = Instant::now() + wait;
        loop {
            let handles = self.locate_once(locator).await?;
            if !handles.is_empty() || Instant::now() >= deadline {
                return Ok(handles);
            }
            sleep(IMPLICIT_WAIT_STEP).await;
        }
    }

    async fn describe(&self, handle: &ControlHandle) -> DriverResult<ControlDescriptor> {
        let value = self.call_on(DESCRIBE_JS, handle).await?;
        let raw: RawControl = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    async fn click(&self, handle: &ControlHandle) -> DriverResult<()> {
        self.element(handle).await?.click().await?;
        Ok(())
    }

    async fn pointer_click(&self, handle: &ControlHandle) -> DriverResult<()> {
        let element = self.element(handle).await?;
        element.scroll_into_view().await?;
        let point = element.clickable_point().await?;
        self.page.move_mouse(point).await?;
        self.page.click(point).await?;
        Ok(())
    }

    async fn clear(&self, handle: &ControlHandle) -> DriverResult<()> {
        self.call_on(CLEAR_JS, handle).await?;
        Ok(())
    }

    async fn type_text(&self, handle: &ControlHandle, text: &str) -> DriverResult<()> {
        self.element(handle).await?.focus().await?.type_str(text).await?;
        Ok(())
    }

    async fn select_option(&self, handle: &ControlHandle, value: &str) -> DriverResult<()> {
        let script = format!(
            "(el) => {{ el.value = {}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return el.value; }}",
            serde_json::to_string(value)?
        );
        let applied = self.call_on(&script, handle).await?;
        if applied.as_str() == Some(value) {
            Ok(())
        } else {
            Err(DriverError::Script(format!("下拉框没有值为 '{}' 的选项", value)))
        }
    }

    async fn upload_file(&self, handle: &ControlHandle, path: &Path) -> DriverResult<()> {
        let element = self.element(handle).await?;
        let absolute = absolute_path(path).await?;
        let params = SetFileInputFilesParams::builder()
            .file(absolute.to_string_lossy().to_string())
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(DriverError::Script)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        target: Option<&ControlHandle>,
    ) -> DriverResult<JsonValue> {
        match target {
            Some(handle) => self.call_on(script, handle).await,
            None => {
                let js = format!(
                    "(() => {{ const r = ({})(null); return r === undefined ? null : r; }})()",
                    script
                );
                self.eval(js).await
            }
        }
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let bytes = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        Ok(bytes)
    }

    fn set_implicit_wait(&self, wait: Duration) {
        self.implicit_wait_ms
            .store(wait.as_millis() as u64, Ordering::Relaxed);
    }
}

/// 上传控件需要绝对路径
async fn absolute_path(path: &Path) -> DriverResult<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| DriverError::Script(format!("附件路径无效 {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absolute_path_resolves_relative_file() {
        let dir = std::env::temp_dir().join(format!("wizard_upload_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file = dir.join("brochure.pdf");
        tokio::fs::write(&file, b"%PDF").await.unwrap();

        // 带 `..` 的路径也解析成规范的绝对路径
        let messy = dir.join("..").join(dir.file_name().unwrap()).join("brochure.pdf");
        let resolved = absolute_path(&messy).await.unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, tokio::fs::canonicalize(&file).await.unwrap());

        let missing = absolute_path(&dir.join("missing.pdf")).await;
        assert!(matches!(missing, Err(DriverError::Script(_))));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
