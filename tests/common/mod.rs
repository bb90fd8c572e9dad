//! 测试共用：脚本化的内存 UI 驱动 + 记录型审计 sink
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use wizard_autofill::config::PollPolicy;
use wizard_autofill::error::{DriverError, DriverResult};
use wizard_autofill::infrastructure::{scripts, Locator, UiDriver};
use wizard_autofill::models::{ControlDescriptor, ControlHandle, ControlKind, OptionCandidate, Record};
use wizard_autofill::services::{
    ActionExecutor, AuditEvent, AuditLog, AuditSink, FieldResolver, Navigator, OptionMatcher,
    PageClassifier,
};
use wizard_autofill::workflow::Toolkit;

pub const SITE: &str = "https://demo.test";
pub const ENTRY_URL: &str = "https://demo.test/membership/new?type=packaging-paper";

pub fn url(path: &str) -> String {
    format!("{}{}", SITE, path)
}

/// 测试用的短轮询
pub fn fast_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(30), Duration::from_millis(10))
}

pub fn toolkit() -> Toolkit {
    Toolkit {
        classifier: PageClassifier::new(),
        executor: ActionExecutor::new(),
        matcher: OptionMatcher::default(),
        resolver: FieldResolver::new(),
        navigator: Navigator::new(ENTRY_URL, SITE, fast_policy()),
        policy: fast_policy(),
    }
}

pub fn record(columns: &[(&str, &str)]) -> Record {
    Record::new(
        columns
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

// ========== 假页面元素 ==========

/// 点击后的效果
#[derive(Debug, Clone)]
pub enum Effect {
    /// 跳转到地址
    Navigate(String),
    /// 让带有该 key（或 `key_` 前缀）的元素出现
    Reveal(String),
    /// 同上，但元素要再错过 `locates` 次查找才出现
    RevealAfter { key: String, locates: usize },
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub handle: String,
    pub key: String,
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub label: String,
    pub visible: bool,
    pub enabled: bool,
    pub present: bool,
    /// 还要错过几次查找才出现
    pub reveal_in: Option<usize>,
    pub value: String,
    pub selected: bool,
    pub options: Vec<OptionCandidate>,
    pub on_click: Vec<Effect>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            handle: String::new(),
            key: String::new(),
            tag: tag.to_string(),
            attrs: Vec::new(),
            text: String::new(),
            label: String::new(),
            visible: true,
            enabled: true,
            present: true,
            reveal_in: None,
            value: String::new(),
            selected: false,
            options: Vec::new(),
            on_click: Vec::new(),
        }
    }

    pub fn input(input_type: &str, name: &str) -> Self {
        Self::new("input").attr("type", input_type).attr("name", name)
    }

    pub fn radio(name: &str, value: &str, label: &str) -> Self {
        let mut el = Self::input("radio", name).label(label);
        el.value = value.to_string();
        el.attr("value", value)
    }

    pub fn select(name: &str, options: &[(&str, &str)]) -> Self {
        let mut el = Self::new("select").attr("name", name);
        el.options = options
            .iter()
            .map(|(label, value)| OptionCandidate::new(*label, *value))
            .collect();
        el
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn submit(text: &str) -> Self {
        Self::new("button").attr("type", "submit").text(text)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn checked(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    /// 初始不在页面上，等待 Reveal
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn navigates_to(self, target: &str) -> Self {
        self.on_click(Effect::Navigate(target.to_string()))
    }

    fn in_group(&self, key: &str) -> bool {
        self.key == key || self.key.starts_with(&format!("{}_", key))
    }

    fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(query) => query.split(',').any(|simple| self.matches_simple(simple.trim())),
            Locator::Name(name) => self.attr_value("name") == Some(name.as_str()),
            Locator::Text { tag, needle } => {
                self.tag == *tag && self.text.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }

    /// 只支持 `tag`、`.class`、`[attr]`、`[attr="v"]`、`[attr*="v"]` 和 `:not(...)`
    fn matches_simple(&self, selector: &str) -> bool {
        let is_delim = |c: char| c == '.' || c == '[' || c == ':';
        let tag_end = selector.find(is_delim).unwrap_or(selector.len());
        let tag = &selector[..tag_end];
        if !tag.is_empty() && tag != self.tag {
            return false;
        }

        let mut rest = &selector[tag_end..];
        while !rest.is_empty() {
            if let Some(r) = rest.strip_prefix('.') {
                let end = r.find(is_delim).unwrap_or(r.len());
                let class = &r[..end];
                let classes = self.attr_value("class").unwrap_or_default();
                if !classes.split_whitespace().any(|c| c == class) {
                    return false;
                }
                rest = &r[end..];
            } else if let Some(r) = rest.strip_prefix('[') {
                let Some(end) = r.find(']') else {
                    return false;
                };
                let condition = &r[..end];
                rest = &r[end + 1..];
                let unquote = |v: &str| v.trim_matches('"').to_string();
                let ok = if let Some((name, value)) = condition.split_once("*=") {
                    self.attr_value(name)
                        .map_or(false, |v| v.contains(&unquote(value)))
                } else if let Some((name, value)) = condition.split_once('=') {
                    self.attr_value(name) == Some(unquote(value).as_str())
                } else {
                    self.attr_value(condition).is_some()
                };
                if !ok {
                    return false;
                }
            } else if let Some(r) = rest.strip_prefix(":not(") {
                let Some(end) = r.find(')') else {
                    return false;
                };
                if self.matches_simple(&r[..end]) {
                    return false;
                }
                rest = &r[end + 1..];
            } else {
                return false;
            }
        }
        true
    }

    fn describe(&self) -> ControlDescriptor {
        let mut d = ControlDescriptor::new(ControlKind::from_tag(&self.tag, self.attr_value("type")));
        d.name = self.attr_value("name").unwrap_or_default().to_string();
        d.id = self.attr_value("id").unwrap_or_default().to_string();
        d.placeholder = self.attr_value("placeholder").unwrap_or_default().to_string();
        d.label = self.label.clone();
        d.text = self.text.clone();
        d.visible = self.visible;
        d.enabled = self.enabled;
        d.value = self.value.clone();
        d.selected = self.selected;
        d.options = self
            .options
            .iter()
            .map(|o| OptionCandidate {
                selected: o.value == self.value,
                ..o.clone()
            })
            .collect();
        d
    }
}

#[derive(Debug, Clone, Default)]
struct FakePage {
    title: String,
    elements: Vec<FakeElement>,
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    pages: HashMap<String, FakePage>,
    failing: HashSet<String>,
    calls: Vec<String>,
    next_handle: usize,
}

impl FakeState {
    fn page(&self) -> Option<&FakePage> {
        self.pages.get(&self.url)
    }

    fn element(&self, handle: &ControlHandle) -> DriverResult<&FakeElement> {
        self.page()
            .and_then(|p| p.elements.iter().find(|e| e.present && e.handle == handle.0))
            .ok_or_else(|| DriverError::StaleHandle(handle.0.clone()))
    }

    fn element_mut(&mut self, handle: &ControlHandle) -> DriverResult<&mut FakeElement> {
        let url = self.url.clone();
        self.pages
            .get_mut(&url)
            .and_then(|p| p.elements.iter_mut().find(|e| e.present && e.handle == handle.0))
            .ok_or_else(|| DriverError::StaleHandle(handle.0.clone()))
    }

    fn check(&mut self, op: &str, detail: &str) -> DriverResult<()> {
        self.calls.push(format!("{}:{}", op, detail));
        if self.failing.contains(op) {
            return Err(DriverError::Script(format!("模拟失败: {}", op)));
        }
        Ok(())
    }

    /// 每次查找推进延迟出现的元素
    fn tick_reveals(&mut self) {
        let url = self.url.clone();
        let Some(page) = self.pages.get_mut(&url) else {
            return;
        };
        for el in page.elements.iter_mut() {
            match el.reveal_in {
                Some(0) => {
                    el.present = true;
                    el.reveal_in = None;
                }
                Some(n) => el.reveal_in = Some(n - 1),
                None => {}
            }
        }
    }

    /// 点击效果：单选互斥、复选切换、跳转、显示新元素
    fn apply_click(&mut self, handle: &ControlHandle) -> DriverResult<()> {
        let url = self.url.clone();
        let page = self
            .pages
            .get_mut(&url)
            .ok_or_else(|| DriverError::StaleHandle(handle.0.clone()))?;
        let index = page
            .elements
            .iter()
            .position(|e| e.present && e.handle == handle.0)
            .ok_or_else(|| DriverError::StaleHandle(handle.0.clone()))?;

        let clicked = page.elements[index].clone();
        match clicked.attr_value("type") {
            Some("radio") => {
                let group = clicked.attr_value("name").map(str::to_string);
                for el in page.elements.iter_mut() {
                    if el.attr_value("type") == Some("radio")
                        && el.attr_value("name").map(str::to_string) == group
                    {
                        el.selected = el.handle == clicked.handle;
                    }
                }
            }
            Some("checkbox") => page.elements[index].selected = !clicked.selected,
            _ => {}
        }

        let mut target = None;
        for effect in &clicked.on_click {
            match effect {
                Effect::Navigate(to) => target = Some(to.clone()),
                Effect::Reveal(key) => {
                    for el in page.elements.iter_mut().filter(|e| e.in_group(key)) {
                        el.present = true;
                    }
                }
                Effect::RevealAfter { key, locates } => {
                    for el in page.elements.iter_mut().filter(|e| e.in_group(key)) {
                        el.reveal_in = Some(*locates);
                    }
                }
            }
        }
        if let Some(to) = target {
            self.url = to;
        }
        Ok(())
    }
}

/// 脚本化的内存 UI 驱动
///
/// 可以让某类操作失败（`fail`），`"inert"` 表示原生点击返回成功但没有效果。
#[derive(Debug, Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new(start_url: &str) -> Self {
        let driver = Self::default();
        driver.lock().url = start_url.to_string();
        driver
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_page(self, page_url: &str, title: &str, elements: Vec<FakeElement>) -> Self {
        {
            let mut state = self.lock();
            let mut elements = elements;
            for el in elements.iter_mut() {
                state.next_handle += 1;
                el.handle = format!("h{}", state.next_handle);
            }
            state.pages.insert(
                page_url.to_string(),
                FakePage {
                    title: title.to_string(),
                    elements,
                },
            );
        }
        self
    }

    pub fn fail(&self, op: &str) {
        self.lock().failing.insert(op.to_string());
    }

    pub fn heal(&self, op: &str) {
        self.lock().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.lock().calls.iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn url_now(&self) -> String {
        self.lock().url.clone()
    }

    /// 按 key 在所有页面中查找元素的当前状态
    pub fn element(&self, key: &str) -> Option<FakeElement> {
        self.lock()
            .pages
            .values()
            .flat_map(|p| p.elements.iter())
            .find(|e| e.key == key)
            .cloned()
    }
}

#[async_trait]
impl UiDriver for FakeDriver {
    async fn navigate(&self, target: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("navigate", target)?;
        state.url = target.to_string();
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let state = self.lock();
        if state.failing.contains("url") {
            return Err(DriverError::Script("模拟失败: url".to_string()));
        }
        Ok(state.url.clone())
    }

    async fn title(&self) -> DriverResult<String> {
        let state = self.lock();
        Ok(state.page().map(|p| p.title.clone()).unwrap_or_default())
    }

    async fn locate(&self, locator: &Locator) -> DriverResult<Vec<ControlHandle>> {
        let mut state = self.lock();
        if state.failing.contains("locate") {
            return Err(DriverError::Script("模拟失败: locate".to_string()));
        }
        state.tick_reveals();
        Ok(state
            .page()
            .map(|p| {
                p.elements
                    .iter()
                    .filter(|e| e.present && e.matches(locator))
                    .map(|e| ControlHandle::new(e.handle.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn describe(&self, handle: &ControlHandle) -> DriverResult<ControlDescriptor> {
        let state = self.lock();
        state.element(handle).map(FakeElement::describe)
    }

    async fn click(&self, handle: &ControlHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("click", &handle.0)?;
        if !state.element(handle)?.visible {
            return Err(DriverError::Script("元素不可见".to_string()));
        }
        if state.failing.contains("inert") {
            return Ok(());
        }
        state.apply_click(handle)
    }

    async fn pointer_click(&self, handle: &ControlHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("pointer", &handle.0)?;
        state.apply_click(handle)
    }

    async fn clear(&self, handle: &ControlHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("type", &handle.0)?;
        state.element_mut(handle)?.value.clear();
        Ok(())
    }

    async fn type_text(&self, handle: &ControlHandle, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("type", &format!("{}:{}", handle.0, text))?;
        state.element_mut(handle)?.value.push_str(text);
        Ok(())
    }

    async fn select_option(&self, handle: &ControlHandle, value: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("select", &format!("{}:{}", handle.0, value))?;
        let el = state.element_mut(handle)?;
        if !el.options.iter().any(|o| o.value == value) {
            return Err(DriverError::Script(format!("没有选项 {}", value)));
        }
        el.value = value.to_string();
        Ok(())
    }

    async fn upload_file(&self, handle: &ControlHandle, path: &Path) -> DriverResult<()> {
        let mut state = self.lock();
        state.check("upload", &handle.0)?;
        state.element_mut(handle)?.value = path.display().to_string();
        Ok(())
    }

    async fn execute_script(
        &self,
        script: &str,
        target: Option<&ControlHandle>,
    ) -> DriverResult<JsonValue> {
        let mut state = self.lock();
        state.check("script", target.map(|h| h.0.as_str()).unwrap_or("-"))?;
        let Some(handle) = target else {
            return Ok(JsonValue::Null);
        };

        if script == scripts::CLICK {
            state.apply_click(handle)?;
            return Ok(json!(true));
        }
        if script.contains("data-sitekey") {
            let key = state.element(handle)?.attr_value("data-sitekey").unwrap_or_default();
            return Ok(json!(key));
        }
        if let Some(rest) = script.strip_prefix("(el) => { el.value = ") {
            let literal = rest.split("; el.dispatchEvent").next().unwrap_or_default();
            let value: String = serde_json::from_str(literal)?;
            state.element_mut(handle)?.value = value.clone();
            return Ok(json!(value));
        }
        Ok(json!(true))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(b"\x89PNG fake".to_vec())
    }

    fn set_implicit_wait(&self, _wait: Duration) {}
}

// ========== 审计 ==========

/// 把事件收集到内存
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}

/// 返回审计日志和可检查的 sink
pub fn recording_audit() -> (AuditLog, RecordingSink) {
    let sink = RecordingSink::default();
    let dir = std::env::temp_dir().join(format!("wizard_evidence_{}", std::process::id()));
    (AuditLog::new(Box::new(sink.clone()), dir), sink)
}
