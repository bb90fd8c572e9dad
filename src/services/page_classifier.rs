//! 页面识别服务 - 业务能力层
//!
//! 从实时页面采集一份快照，再用有序规则表判断当前是哪一步。
//! 规则按优先级从上到下匹配：地址 → 标题 → 登录控件 → 仪表盘标记 → 结构兜底。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{ClassificationError, DriverResult};
use crate::infrastructure::{Locator, UiDriver};
use crate::models::PageState;

const STEP_PATTERN: &str = r"membership/form/(\d+)";

static STEP_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(STEP_PATTERN).ok());

const STEP_RULES: [&str; 4] = ["url:step1", "url:step2", "url:step3", "url:step4"];

/// 一次页面检查的结果，只在本轮循环内有效
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiSnapshot {
    /// 小写地址
    pub url: String,
    /// 小写标题
    pub title: String,
    pub has_username: bool,
    pub has_password: bool,
    pub has_dashboard_marker: bool,
    pub radio_count: usize,
    pub email_count: usize,
    pub file_count: usize,
    pub form_count: usize,
}

impl UiSnapshot {
    /// 从驱动采集快照，任何一次驱动调用失败都视为检查失败
    pub async fn capture(driver: &dyn UiDriver) -> DriverResult<Self> {
        let url = driver.current_url().await?.to_lowercase();
        let title = driver.title().await?.to_lowercase();
        let count = |query: &'static str| async move {
            driver.locate(&Locator::css(query)).await.map(|h| h.len())
        };

        Ok(Self {
            has_username: !driver.locate(&Locator::name("username")).await?.is_empty(),
            has_password: !driver.locate(&Locator::name("password")).await?.is_empty(),
            has_dashboard_marker: count("span.dropdown-arrow").await? > 0,
            radio_count: count("input[type=\"radio\"]").await?,
            email_count: count("input[type=\"email\"]").await?,
            file_count: count("input[type=\"file\"]").await?,
            form_count: count("form").await?,
            url,
            title,
        })
    }
}

/// 规则条件
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    /// 地址包含片段
    UrlContains(&'static str),
    /// 地址中的序号步骤 `membership/form/N`
    UrlStep(u32),
    /// 标题包含关键词，且不包含排除词
    TitleContains {
        keyword: &'static str,
        unless: Option<&'static str>,
    },
    /// 快照上的结构检查
    Check(fn(&UiSnapshot) -> bool),
}

impl Predicate {
    pub fn holds(&self, snapshot: &UiSnapshot) -> bool {
        match self {
            Predicate::UrlContains(fragment) => snapshot.url.contains(fragment),
            Predicate::UrlStep(step) => url_step(&snapshot.url) == Some(*step),
            Predicate::TitleContains { keyword, unless } => {
                snapshot.title.contains(keyword)
                    && unless.map_or(true, |word| !snapshot.title.contains(word))
            }
            Predicate::Check(check) => check(snapshot),
        }
    }
}

/// (条件, 页面状态) 对
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub state: PageState,
}

impl Rule {
    const fn new(name: &'static str, predicate: Predicate, state: PageState) -> Self {
        Self {
            name,
            predicate,
            state,
        }
    }
}

/// 从地址中提取序号步骤
pub fn url_step(url: &str) -> Option<u32> {
    STEP_RE.as_ref()?.captures(url)?.get(1)?.as_str().parse().ok()
}

/// 默认规则表
pub fn default_rules() -> Vec<Rule> {
    use PageState::*;
    use Predicate::*;

    // 1. 地址
    let mut rules = vec![
        Rule::new("url:login", UrlContains("login"), Login),
        Rule::new("url:dashboard", UrlContains("dashboard"), Dashboard),
    ];
    rules.extend(STEP_RULES.into_iter().zip(1..).filter_map(|(name, step)| {
        PageState::membership_step(step).map(|state| Rule::new(name, UrlStep(step), state))
    }));
    rules.extend([
        Rule::new("url:form", UrlContains("membership/form"), MembershipForm),
        Rule::new("url:success", UrlContains("membership/success"), Success),
        // 2. 标题
        Rule::new(
            "title:login",
            TitleContains { keyword: "login", unless: None },
            Login,
        ),
        Rule::new(
            "title:dashboard",
            TitleContains { keyword: "dashboard", unless: Some("new") },
            Dashboard,
        ),
        Rule::new(
            "title:thank-you",
            TitleContains { keyword: "thank you", unless: None },
            Success,
        ),
        Rule::new(
            "title:complete",
            TitleContains { keyword: "registration complete", unless: None },
            Success,
        ),
        // 3. 登录控件
        Rule::new("dom:login", Check(|s| s.has_username && s.has_password), Login),
        // 4. 仪表盘标记
        Rule::new("dom:dashboard", Check(|s| s.has_dashboard_marker), Dashboard),
        // 5. 结构兜底
        Rule::new("dom:radios", Check(|s| s.radio_count >= 2), PackagingChoice),
        Rule::new("dom:email", Check(|s| s.email_count > 0), CompanyDetails),
        Rule::new("dom:file", Check(|s| s.file_count > 0), Upload),
        Rule::new("dom:form", Check(|s| s.form_count > 0), AdditionalDetails),
    ]);
    rules
}

/// 页面识别服务
///
/// 纯观察，不修改页面。
pub struct PageClassifier {
    rules: Vec<Rule>,
}

impl PageClassifier {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 对快照应用规则表，没有规则命中时返回 UNKNOWN
    pub fn classify_snapshot(&self, snapshot: &UiSnapshot) -> PageState {
        self.rules
            .iter()
            .find(|rule| rule.predicate.holds(snapshot))
            .map(|rule| {
                debug!("页面识别命中规则 {} → {}", rule.name, rule.state);
                rule.state
            })
            .unwrap_or(PageState::Unknown)
    }

    /// 识别当前页面，检查失败时返回 ERROR
    pub async fn classify(&self, driver: &dyn UiDriver) -> PageState {
        match UiSnapshot::capture(driver).await {
            Ok(snapshot) => self.classify_snapshot(&snapshot),
            Err(e) => {
                let err = ClassificationError::InspectionFailed {
                    reason: e.to_string(),
                };
                warn!("❌ {}", err);
                PageState::Error
            }
        }
    }
}

impl Default for PageClassifier {
    fn default() -> Self {
        Self::new()
    }
}
