//! 导航服务 - 业务能力层
//!
//! 把页面从当前位置带到目标状态。失败不致命，只返回 false。

use tracing::{debug, info, warn};

use crate::config::{Config, PollPolicy};
use crate::error::AppError;
use crate::infrastructure::{inspect, wait_for_url_change, Locator, UiDriver};
use crate::models::{ControlHandle, PageState};
use crate::services::{ActionExecutor, PageClassifier};

/// 仪表盘上展开菜单的控件
fn disclosure_locators() -> Vec<Locator> {
    vec![
        Locator::css("span.dropdown-arrow"),
        Locator::css("span[class*=\"dropdown-arrow\"]"),
        Locator::css(".dropdown-toggle"),
        Locator::css("[data-toggle=\"dropdown\"]"),
        Locator::css("button[class*=\"dropdown\"]"),
    ]
}

/// 菜单中通往表单入口的链接
fn entry_link_locators() -> Vec<Locator> {
    vec![
        Locator::css("a[href=\"/membership/new?type=packaging-paper\"]"),
        Locator::css("a[href*=\"packaging-paper\"]"),
        Locator::text("a", "packaging & paper"),
        Locator::text("a", "packaging"),
    ]
}

/// 提交当前页的按钮，按优先级排列
pub fn submit_locators() -> Vec<Locator> {
    vec![
        Locator::css("button[type=\"submit\"]"),
        Locator::css("input[type=\"submit\"]"),
        Locator::css("button[class*=\"submit\"]"),
        Locator::css("button[id*=\"submit\"]"),
        Locator::text("button", "submit"),
        Locator::text("button", "weiter"),
        Locator::text("button", "next"),
        Locator::text("button", "continue"),
    ]
}

/// 按钮 / 链接文字关键词
fn keywords(target: PageState) -> &'static [&'static str] {
    match target {
        PageState::MembershipForm | PageState::PackagingChoice => {
            &["start", "begin", "packaging", "waste"]
        }
        PageState::CompanyDetails => &["next", "continue", "company", "details"],
        PageState::AdditionalDetails => &["next", "continue", "address", "location"],
        PageState::Upload => &["next", "continue", "upload", "final"],
        PageState::MembershipPage1
        | PageState::MembershipPage2
        | PageState::MembershipPage3
        | PageState::MembershipPage4 => &["next", "continue", "weiter"],
        _ => &[],
    }
}

/// 导航服务
pub struct Navigator {
    /// 表单入口的绝对地址
    entry_url: String,
    /// 站点根地址（不带结尾的 `/`）
    site_root: String,
    policy: PollPolicy,
}

impl Navigator {
    pub fn new(entry_url: impl Into<String>, site_root: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            entry_url: entry_url.into(),
            site_root: site_root.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.entry_url.clone(),
            site_root(&config.start_url),
            config.poll_policy(),
        )
    }

    /// 直接跳转用的候选地址
    pub fn candidate_urls(&self, target: PageState) -> Vec<String> {
        let root = &self.site_root;
        match target {
            PageState::Dashboard => vec![format!("{}/dashboard", root)],
            PageState::MembershipForm | PageState::PackagingChoice => vec![
                self.entry_url.clone(),
                format!("{}/form", root),
                format!("{}/start", root),
                format!("{}/packaging", root),
            ],
            PageState::MembershipPage1 => vec![format!("{}/membership/form/1", root)],
            PageState::MembershipPage2 => vec![format!("{}/membership/form/2", root)],
            PageState::MembershipPage3 => vec![format!("{}/membership/form/3", root)],
            PageState::MembershipPage4 => vec![format!("{}/membership/form/4", root)],
            _ => Vec::new(),
        }
    }

    /// 导航到目标状态，已在目标状态时直接成功
    pub async fn navigate(
        &self,
        driver: &dyn UiDriver,
        classifier: &PageClassifier,
        executor: &ActionExecutor,
        target: PageState,
    ) -> bool {
        let current = classifier.classify(driver).await;
        if current == target {
            debug!("已在目标页面: {}", target);
            return true;
        }
        info!("🧭 导航: {} → {}", current, target);

        if current.is_hub() && target.is_entry_point() {
            self.open_entry_from_hub(driver, executor).await;
            return self.check_arrival(driver, classifier, target).await;
        }

        for url in self.candidate_urls(target) {
            debug!("尝试直接跳转: {}", url);
            if let Err(e) = driver.navigate(&url).await {
                debug!("跳转 {} 失败: {}", url, e);
                continue;
            }
            if self.check_arrival(driver, classifier, target).await {
                return true;
            }
        }

        for keyword in keywords(target) {
            for tag in ["button", "a"] {
                for handle in visible(driver, &Locator::text(tag, *keyword)).await {
                    let before = driver.current_url().await.unwrap_or_default();
                    if !executor.click(driver, &handle).await {
                        continue;
                    }
                    wait_for_url_change(driver, &before, self.policy).await;
                    if self.check_arrival(driver, classifier, target).await {
                        info!("✓ 通过 {} '{}' 到达 {}", tag, keyword, target);
                        return true;
                    }
                }
            }
        }

        warn!("{}", AppError::navigation(current, target));
        false
    }

    /// 从仪表盘展开菜单并点击入口链接，都失败时直接跳转入口地址
    async fn open_entry_from_hub(&self, driver: &dyn UiDriver, executor: &ActionExecutor) {
        let mut opened = false;
        for locator in disclosure_locators() {
            for handle in visible(driver, &locator).await {
                if executor.click(driver, &handle).await {
                    debug!("✓ 菜单已展开 ({})", locator);
                    opened = true;
                    break;
                }
            }
            if opened {
                break;
            }
        }

        for locator in entry_link_locators() {
            if driver.wait_for_count(&locator, 1, self.policy).await == 0 {
                continue;
            }
            for handle in visible(driver, &locator).await {
                let before = driver.current_url().await.unwrap_or_default();
                if executor.click(driver, &handle).await {
                    info!("✓ 已点击表单入口链接 ({})", locator);
                    wait_for_url_change(driver, &before, self.policy).await;
                    return;
                }
            }
        }

        info!("🔗 菜单导航失败，直接跳转: {}", self.entry_url);
        if let Err(e) = driver.navigate(&self.entry_url).await {
            warn!("直接跳转失败: {}", e);
        }
    }

    /// 重新识别并判断是否到达
    async fn check_arrival(
        &self,
        driver: &dyn UiDriver,
        classifier: &PageClassifier,
        target: PageState,
    ) -> bool {
        let state = classifier.classify(driver).await;
        if state == target {
            return true;
        }
        if !target.is_entry_point() {
            return false;
        }
        let url = driver.current_url().await.unwrap_or_default().to_lowercase();
        url.contains("packaging") || url.contains("membership/form") || state.is_membership_page()
    }

    /// 点击当前页的提交按钮，返回是否点到了
    pub async fn submit_current(&self, driver: &dyn UiDriver, executor: &ActionExecutor) -> bool {
        let before = driver.current_url().await.unwrap_or_default();
        for locator in submit_locators() {
            for handle in visible(driver, &locator).await {
                if executor.click(driver, &handle).await {
                    debug!("✓ 已提交 ({})", locator);
                    if !wait_for_url_change(driver, &before, self.policy).await {
                        debug!("提交后地址未变化");
                    }
                    return true;
                }
            }
        }
        warn!("⚠️ 未找到可用的提交按钮");
        false
    }
}

/// 可见且可用的控件
async fn visible(driver: &dyn UiDriver, locator: &Locator) -> Vec<ControlHandle> {
    inspect(driver, locator)
        .await
        .into_iter()
        .filter(|(_, d)| d.is_interactable())
        .map(|(h, _)| h)
        .collect()
}

/// `https://host/path` → `https://host`
pub fn site_root(url: &str) -> String {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => url[..after_scheme + i].to_string(),
        None => url.trim_end_matches('/').to_string(),
    }
}
