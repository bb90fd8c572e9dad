//! 页面工作流引擎 - 流程层
//!
//! 核心职责：把一条记录从当前页面一路推进到终态
//!
//! 每一轮：
//! 1. 重新识别当前页面（不信任上一轮的结果）
//! 2. 已完成的页面只重新导航，否则分派给对应处理器
//! 3. 页面仍停留在原处时，导航到下一个页面
//!
//! 终止条件：成功页 / 最终提交 → DONE；连续 ERROR 或致命失败 → ABORTED；
//! 达到轮数上限时按已完成页数判定。

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ClassificationError;
use crate::infrastructure::{wait_for_url_change, UiDriver};
use crate::models::{CompletedPageSet, PageState, Record};
use crate::services::AuditLog;
use crate::workflow::page_handlers::{HandlerOutcome, PageHandlers};
use crate::workflow::run_ctx::RunCtx;
use crate::workflow::toolkit::{PageCtx, Toolkit};

/// 引擎终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Done => write!(f, "DONE"),
            RunStatus::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// 已完成的页面（按状态顺序）
    pub completed_pages: Vec<PageState>,
    /// 实际执行的轮数
    pub iterations: usize,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Done
    }
}

/// 循环上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_iterations: usize,
    pub min_completed_pages: usize,
    pub max_error_streak: usize,
}

impl EngineLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.max_iterations,
            min_completed_pages: config.min_completed_pages,
            max_error_streak: config.max_error_streak.max(1),
        }
    }
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            min_completed_pages: 3,
            max_error_streak: 3,
        }
    }
}

/// 单个页面的分派结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// 处理器已运行
    Handled(HandlerOutcome),
    /// 页面已完成过，只做了重新导航
    Renavigated,
}

/// 页面工作流引擎
///
/// - 独占借用 UI 会话，按顺序 await
/// - 每条记录一个新的 CompletedPageSet
/// - 只依赖业务能力（toolkit）和处理器
pub struct WorkflowEngine {
    tools: Toolkit,
    handlers: PageHandlers,
    limits: EngineLimits,
}

impl WorkflowEngine {
    pub fn new(tools: Toolkit, handlers: PageHandlers, limits: EngineLimits) -> Self {
        Self {
            tools,
            handlers,
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Toolkit::from_config(config),
            PageHandlers::from_config(config),
            EngineLimits::from_config(config),
        )
    }

    pub fn tools(&self) -> &Toolkit {
        &self.tools
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    pub async fn run(
        &self,
        driver: &dyn UiDriver,
        audit: &AuditLog,
        record: &Record,
        ctx: &RunCtx,
    ) -> RunOutcome {
        let page = PageCtx {
            driver,
            tools: &self.tools,
            audit,
            record,
            run: ctx,
        };
        let mut completed = CompletedPageSet::new();
        let mut error_streak = 0;

        for iteration in 1..=self.limits.max_iterations {
            let state = self.tools.classifier.classify(driver).await;
            info!("{} 🔄 第 {}/{} 轮: {}", ctx, iteration, self.limits.max_iterations, state);

            match state {
                s if s.is_terminal() => {
                    info!("{} 🎉 已到达成功页", ctx);
                    return self.finish(RunStatus::Done, &completed, iteration);
                }
                PageState::Error => {
                    error_streak += 1;
                    warn!(
                        "{} ⚠️ {} (连续 {}/{})",
                        ctx,
                        ClassificationError::InspectionFailed {
                            reason: "驱动检查失败".to_string()
                        },
                        error_streak,
                        self.limits.max_error_streak
                    );
                    if error_streak >= self.limits.max_error_streak {
                        error!("{} ❌ 页面检查持续失败，放弃本条记录", ctx);
                        return self.finish(RunStatus::Aborted, &completed, iteration);
                    }
                    tokio::time::sleep(self.tools.policy.interval).await;
                    continue;
                }
                PageState::Unknown => {
                    error_streak = 0;
                    warn!("{} ⚠️ {}", ctx, ClassificationError::NoHandler { state });
                    // 等页面自行变化（跳转 / 加载），有上限
                    let url = driver.current_url().await.unwrap_or_default();
                    wait_for_url_change(driver, &url, self.tools.policy).await;
                    continue;
                }
                _ => error_streak = 0,
            }

            match self.dispatch(state, &page, &mut completed).await {
                Dispatch::Handled(HandlerOutcome::Finished) => {
                    return self.finish(RunStatus::Done, &completed, iteration);
                }
                Dispatch::Handled(HandlerOutcome::Fatal) => {
                    error!("{} ❌ {} 处理失败，无法继续", ctx, state);
                    return self.finish(RunStatus::Aborted, &completed, iteration);
                }
                Dispatch::Handled(_) => self.advance(driver, state).await,
                Dispatch::Renavigated => {}
            }
        }

        let status = if completed.len() >= self.limits.min_completed_pages {
            RunStatus::Done
        } else {
            RunStatus::Aborted
        };
        warn!(
            "{} ⚠️ 达到轮数上限，已完成 {} 页 (需要 {}) → {}",
            ctx,
            completed.len(),
            self.limits.min_completed_pages,
            status
        );
        self.finish(status, &completed, self.limits.max_iterations)
    }

    /// 处理一个页面；已完成的页面只重新导航，不再填写
    pub async fn dispatch(
        &self,
        state: PageState,
        page: &PageCtx<'_>,
        completed: &mut CompletedPageSet,
    ) -> Dispatch {
        if completed.contains(state) {
            info!("{} ⏭️ {} 已完成，重新导航", page.run, state);
            let navigator = &self.tools.navigator;
            navigator
                .submit_current(page.driver, &self.tools.executor)
                .await;
            self.advance(page.driver, state).await;
            return Dispatch::Renavigated;
        }

        let outcome = self.handlers.handle(state, page).await;
        match outcome {
            HandlerOutcome::Completed | HandlerOutcome::Finished => {
                if completed.insert(state) {
                    info!("{} ✓ {} 已完成 (共 {} 页)", page.run, state, completed.len());
                }
            }
            HandlerOutcome::Incomplete => debug!("{} 未计入已完成", state),
            HandlerOutcome::Fatal => {}
        }
        Dispatch::Handled(outcome)
    }

    /// 页面仍停留在 `handled` 时导航到下一步
    async fn advance(&self, driver: &dyn UiDriver, handled: PageState) {
        let live = self.tools.classifier.classify(driver).await;
        if live != handled {
            debug!("页面已前进到 {}", live);
            return;
        }
        let Some(next) = handled.next() else {
            return;
        };
        let tools = &self.tools;
        if !tools
            .navigator
            .navigate(driver, &tools.classifier, &tools.executor, next)
            .await
        {
            debug!("导航到 {} 未成功，下一轮重新识别", next);
        }
    }

    fn finish(&self, status: RunStatus, completed: &CompletedPageSet, iterations: usize) -> RunOutcome {
        RunOutcome {
            status,
            completed_pages: completed.iter().collect(),
            iterations,
        }
    }
}
