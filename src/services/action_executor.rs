//! 交互执行服务 - 业务能力层
//!
//! 把一次已经决定好的操作（点击 / 选择 / 输入）应用到一个控件上，
//! 按策略列表依次尝试，每次尝试后读回控件状态验证，第一个验证通过的策略胜出。

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::infrastructure::{scripts, Locator, UiDriver};
use crate::models::{ControlHandle, ControlKind};

/// 要应用的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Click,
    /// 按 value 选中下拉选项
    Select(String),
    /// 清空后输入
    Fill(String),
}

impl UiAction {
    pub fn verb(&self) -> &'static str {
        match self {
            UiAction::Click => "点击",
            UiAction::Select(_) => "选择",
            UiAction::Fill(_) => "填写",
        }
    }
}

/// 一种交互策略，返回是否认为自己执行成功
#[async_trait]
pub trait InteractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, driver: &dyn UiDriver, target: &ControlHandle, action: &UiAction)
        -> bool;
}

/// 原生交互
pub struct NativeStrategy;

/// 脚本直接调用，绕过正常的交互语义
pub struct ScriptedStrategy;

/// 先移动指针，再点击
pub struct PointerStrategy;

/// 点击关联的 `<label for=...>`
pub struct LabelStrategy;

async fn fill_natively(driver: &dyn UiDriver, target: &ControlHandle, text: &str) -> bool {
    driver.clear(target).await.is_ok() && driver.type_text(target, text).await.is_ok()
}

#[async_trait]
impl InteractionStrategy for NativeStrategy {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn attempt(
        &self,
        driver: &dyn UiDriver,
        target: &ControlHandle,
        action: &UiAction,
    ) -> bool {
        match action {
            UiAction::Click => driver.click(target).await.is_ok(),
            UiAction::Select(value) => driver.select_option(target, value).await.is_ok(),
            UiAction::Fill(text) => fill_natively(driver, target, text).await,
        }
    }
}

#[async_trait]
impl InteractionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn attempt(
        &self,
        driver: &dyn UiDriver,
        target: &ControlHandle,
        action: &UiAction,
    ) -> bool {
        let script = match action {
            UiAction::Click => scripts::CLICK.to_string(),
            UiAction::Select(value) | UiAction::Fill(value) => {
                let Ok(literal) = serde_json::to_string(value) else {
                    return false;
                };
                scripts::set_value(&literal)
            }
        };
        driver.execute_script(&script, Some(target)).await.is_ok()
    }
}

#[async_trait]
impl InteractionStrategy for PointerStrategy {
    fn name(&self) -> &'static str {
        "pointer"
    }

    async fn attempt(
        &self,
        driver: &dyn UiDriver,
        target: &ControlHandle,
        action: &UiAction,
    ) -> bool {
        if driver.pointer_click(target).await.is_err() {
            return false;
        }
        match action {
            UiAction::Click => true,
            UiAction::Select(value) => driver.select_option(target, value).await.is_ok(),
            UiAction::Fill(text) => fill_natively(driver, target, text).await,
        }
    }
}

#[async_trait]
impl InteractionStrategy for LabelStrategy {
    fn name(&self) -> &'static str {
        "label"
    }

    async fn attempt(
        &self,
        driver: &dyn UiDriver,
        target: &ControlHandle,
        action: &UiAction,
    ) -> bool {
        if *action != UiAction::Click {
            return false;
        }
        let id = match driver.describe(target).await {
            Ok(descriptor) if !descriptor.id.is_empty() => descriptor.id,
            _ => return false,
        };
        let labels = driver
            .locate(&Locator::css(format!("label[for=\"{}\"]", id)))
            .await
            .unwrap_or_default();
        match labels.first() {
            Some(label) => driver.click(label).await.is_ok(),
            None => false,
        }
    }
}

/// 交互执行服务
///
/// 职责：
/// - 按顺序尝试交互策略
/// - 每次尝试后验证控件状态
/// - 全部失败时返回 false，不抛错
pub struct ActionExecutor {
    strategies: Vec<Box<dyn InteractionStrategy>>,
}

impl ActionExecutor {
    /// 默认策略顺序：原生 → 脚本 → 指针 → label
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(NativeStrategy),
            Box::new(ScriptedStrategy),
            Box::new(PointerStrategy),
            Box::new(LabelStrategy),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn InteractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// 应用操作并验证
    pub async fn apply(&self, driver: &dyn UiDriver, target: &ControlHandle, action: &UiAction) -> bool {
        for strategy in &self.strategies {
            if !strategy.attempt(driver, target, action).await {
                debug!("策略 {} 未能{}控件 {}", strategy.name(), action.verb(), target.as_str());
                continue;
            }
            if verify(driver, target, action).await {
                debug!("✓ 策略 {} {}成功", strategy.name(), action.verb());
                return true;
            }
            debug!("策略 {} 执行后验证未通过", strategy.name());
        }

        let err = AppError::action(action.verb(), target.as_str(), self.strategies.len());
        warn!("{}", err);
        false
    }

    pub async fn click(&self, driver: &dyn UiDriver, target: &ControlHandle) -> bool {
        self.apply(driver, target, &UiAction::Click).await
    }

    pub async fn select(&self, driver: &dyn UiDriver, target: &ControlHandle, value: &str) -> bool {
        self.apply(driver, target, &UiAction::Select(value.to_string()))
            .await
    }

    pub async fn fill(&self, driver: &dyn UiDriver, target: &ControlHandle, text: &str) -> bool {
        self.apply(driver, target, &UiAction::Fill(text.to_string()))
            .await
    }

    /// 上传附件（文件控件只有一种设置方式）
    pub async fn upload(&self, driver: &dyn UiDriver, target: &ControlHandle, path: &Path) -> bool {
        if let Err(e) = driver.upload_file(target, path).await {
            warn!("上传 {} 失败: {}", path.display(), e);
            return false;
        }
        match driver.describe(target).await {
            Ok(descriptor) => !descriptor.value.is_empty(),
            Err(_) => false,
        }
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// 读回控件状态检查操作是否生效
///
/// 按钮和链接的点击没有可读回的状态；点击后控件消失（页面跳转）也算生效。
async fn verify(driver: &dyn UiDriver, target: &ControlHandle, action: &UiAction) -> bool {
    let descriptor = match driver.describe(target).await {
        Ok(descriptor) => descriptor,
        Err(_) => return *action == UiAction::Click,
    };
    match action {
        UiAction::Click => match descriptor.kind {
            ControlKind::Radio | ControlKind::Checkbox => descriptor.selected,
            _ => true,
        },
        UiAction::Select(value) => descriptor.value == *value,
        UiAction::Fill(text) => descriptor.value.trim() == text.trim(),
    }
}
