//! 处理器共用的业务能力集合

use crate::config::{Config, PollPolicy};
use crate::infrastructure::UiDriver;
use crate::models::Record;
use crate::services::{
    ActionExecutor, AuditLog, FieldResolver, Navigator, OptionMatcher, PageClassifier,
};
use crate::workflow::run_ctx::RunCtx;

/// 一次运行用到的全部业务能力
///
/// 不持有页面资源，页面通过 `PageCtx` 借入。
pub struct Toolkit {
    pub classifier: PageClassifier,
    pub executor: ActionExecutor,
    pub matcher: OptionMatcher,
    pub resolver: FieldResolver,
    pub navigator: Navigator,
    /// 等待动态内容时的轮询策略
    pub policy: PollPolicy,
}

impl Toolkit {
    pub fn from_config(config: &Config) -> Self {
        Self {
            classifier: PageClassifier::new(),
            executor: ActionExecutor::new(),
            matcher: OptionMatcher::new(config.matcher.clone()),
            resolver: FieldResolver::new(),
            navigator: Navigator::from_config(config),
            policy: config.poll_policy(),
        }
    }
}

/// 处理单个页面时借入的一切
pub struct PageCtx<'a> {
    pub driver: &'a dyn UiDriver,
    pub tools: &'a Toolkit,
    pub audit: &'a AuditLog,
    pub record: &'a Record,
    pub run: &'a RunCtx,
}
