//! 页面处理器 - 流程层
//!
//! 每个处理器填写当前页面后提交。至少成功写入一个字段或选项，页面才算完成。
//! 处理器内部的失败都降级为跳过，只有登录表单无法提交是致命的。

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::infrastructure::{first_match, inspect, poll_until, scripts, wait_for_url_change, Locator, UiDriver};
use crate::models::{flag_token, ControlDescriptor, ControlHandle, FieldKey, PageState};
use crate::services::field_resolver::select_matching;
use crate::services::navigator::submit_locators;
use crate::services::{CapSolverClient, CaptchaSolver, FieldResolver, FillReport, MatchOutcome};
use crate::workflow::toolkit::PageCtx;

const STORE_WORDS: &[&str] = &["online", "store", "shop", "ecommerce"];
const PACKAGING_WORDS: &[&str] = &["packaging", "paper", "waste", "material", "cardboard", "box"];
const TERMS_WORDS: &[&str] = &["terms", "conditions", "accept", "agree"];

const SITE_KEY_JS: &str = "(el) => el.getAttribute('data-sitekey') || ''";

/// 处理器的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 页面已填写，计入已完成集合
    Completed,
    /// 没有写入任何内容（或本页无需填写）
    Incomplete,
    /// 最终提交已点击，本次运行结束
    Finished,
    /// 无法继续（登录表单无法提交）
    Fatal,
}

/// 登录凭据
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// 页面处理器集合
pub struct PageHandlers {
    credentials: Credentials,
    captcha: Option<Box<dyn CaptchaSolver>>,
}

impl PageHandlers {
    pub fn new(credentials: Credentials, captcha: Option<Box<dyn CaptchaSolver>>) -> Self {
        Self {
            credentials,
            captcha,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let captcha = CapSolverClient::from_config(config)
            .map(|client| Box::new(client) as Box<dyn CaptchaSolver>);
        Self::new(
            Credentials {
                username: config.login_username.clone(),
                password: config.login_password.clone(),
            },
            captcha,
        )
    }

    /// 按页面状态分派
    pub async fn handle(&self, state: PageState, p: &PageCtx<'_>) -> HandlerOutcome {
        info!("{} 📄 处理页面: {}", p.run, state);
        match state {
            PageState::Login => self.login(p).await,
            PageState::Dashboard => {
                debug!("仪表盘无需填写，交给导航");
                HandlerOutcome::Incomplete
            }
            PageState::MembershipForm | PageState::MembershipPage1 => {
                self.company_and_country(p, state).await
            }
            PageState::MembershipPage2 => self.activities_and_store(p).await,
            PageState::MembershipPage3
            | PageState::CompanyDetails
            | PageState::AdditionalDetails => self.contact_details(p, state).await,
            PageState::MembershipPage4 => self.terms_and_final_submit(p).await,
            PageState::PackagingChoice => self.packaging_choice(p).await,
            PageState::Upload => self.upload_and_complete(p).await,
            PageState::Success | PageState::Unknown | PageState::Error => {
                HandlerOutcome::Incomplete
            }
        }
    }

    // ========== 登录 ==========

    async fn login(&self, p: &PageCtx<'_>) -> HandlerOutcome {
        let username = first_match(p.driver, &[Locator::name("username")]).await;
        let password = first_match(p.driver, &[Locator::name("password")]).await;
        let (Some(username), Some(password)) = (username, password) else {
            info!("{} ✓ 没有登录表单，视为已登录", p.run);
            return HandlerOutcome::Completed;
        };

        let executor = &p.tools.executor;
        if !executor.fill(p.driver, &username, &self.credentials.username).await {
            warn!("⚠️ 用户名填写失败");
        }
        if !executor.fill(p.driver, &password, &self.credentials.password).await {
            warn!("⚠️ 密码填写失败");
        }

        self.satisfy_captcha(p.driver).await;

        if !p.tools.navigator.submit_current(p.driver, executor).await {
            error!("{} ❌ 登录表单无法提交", p.run);
            return HandlerOutcome::Fatal;
        }
        info!("{} ✓ 登录已提交", p.run);
        log_step(p, "login_completed").await;
        HandlerOutcome::Completed
    }

    /// 页面上有验证码控件时，取得令牌并写回控件
    async fn satisfy_captcha(&self, driver: &dyn UiDriver) {
        let Some(widget) = first_match(driver, &[Locator::css("[data-sitekey]")]).await else {
            debug!("页面没有验证码控件");
            return;
        };
        let Some(solver) = &self.captcha else {
            warn!("⚠️ 未配置验证码求解器，假定验证码已通过（未经确认）");
            return;
        };

        let site_key = match driver.execute_script(SITE_KEY_JS, Some(&widget)).await {
            Ok(value) => value.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                warn!("⚠️ 读取 site key 失败: {}", e);
                return;
            }
        };
        if site_key.is_empty() {
            warn!("⚠️ 验证码控件没有 site key，假定验证码已通过（未经确认）");
            return;
        }
        let page_url = driver.current_url().await.unwrap_or_default();

        let token = match solver.solve(&site_key, &page_url).await {
            Ok(token) => token,
            Err(e) => {
                warn!("⚠️ 验证码求解失败，继续尝试登录: {}", e);
                return;
            }
        };
        let Ok(literal) = serde_json::to_string(&token) else {
            return;
        };
        let inject = format!(
            "(el) => {{ if (el.friendlyChallenge) {{ el.friendlyChallenge.solution = {0}; }} const input = el.querySelector('input[name=\"frc-captcha-solution\"]'); if (input) {{ input.value = {0}; }} return true; }}",
            literal
        );
        match driver.execute_script(&inject, Some(&widget)).await {
            Ok(_) => info!("✓ 验证码令牌已写入"),
            Err(e) => warn!("⚠️ 验证码令牌写入失败: {}", e),
        }
    }

    // ========== 会员表单 ==========

    /// 入口表单 / 第 1 页：公司名称 + 国家
    async fn company_and_country(&self, p: &PageCtx<'_>, state: PageState) -> HandlerOutcome {
        let mut report = FillReport::default();

        let company = p.record.get(FieldKey::CompanyName);
        if company.is_empty() {
            warn!("{} ⚠️ 记录没有公司名称", p.run);
        } else {
            match first_interactable(p.driver, &company_locators()).await {
                Some((handle, _)) => {
                    if p.tools.executor.fill(p.driver, &handle, &company).await {
                        info!("✓ {}: '{}'", FieldKey::CompanyName, company);
                        report.record(FieldKey::CompanyName, company);
                    }
                }
                None => warn!("⚠️ 未找到公司名称输入框"),
            }
        }

        let country = p.record.get(FieldKey::Country);
        if !country.is_empty() {
            match first_interactable(p.driver, &country_locators()).await {
                Some((handle, control)) => {
                    let chosen = select_matching(
                        p.driver,
                        &p.tools.executor,
                        &p.tools.matcher,
                        &handle,
                        &control.options,
                        FieldKey::Country,
                        &country,
                    )
                    .await;
                    if let Some(option) = chosen {
                        report.record(FieldKey::Country, option.label);
                    }
                }
                None => warn!("⚠️ 未找到国家下拉框"),
            }
        }

        finish_page(p, state, report).await
    }

    /// 第 2 页：业务类型、子类型、网店单选（两阶段）
    async fn activities_and_store(&self, p: &PageCtx<'_>) -> HandlerOutcome {
        let mut report = FillReport::default();
        business_activity(p, &mut report).await;
        sub_activity(p, &mut report).await;
        online_store(p, &mut report).await;
        finish_page(p, PageState::MembershipPage2, report).await
    }

    /// 第 3 页 / 联系信息页：下拉框 + 文本框
    async fn contact_details(&self, p: &PageCtx<'_>, state: PageState) -> HandlerOutcome {
        let resolver = &p.tools.resolver;
        let mut report = resolver
            .fill_selects(p.driver, &p.tools.executor, &p.tools.matcher, p.record)
            .await;
        report.merge(
            resolver
                .fill_text_controls(p.driver, &p.tools.executor, p.record)
                .await,
        );
        finish_page(p, state, report).await
    }

    /// 第 4 页：条款、附件、附加单选，然后最终提交
    async fn terms_and_final_submit(&self, p: &PageCtx<'_>) -> HandlerOutcome {
        let state = PageState::MembershipPage4;
        let mut report = FillReport::default();

        if p.record.flag(FieldKey::TermsAccepted) == Some(true) {
            accept_terms(p, &mut report).await;
        } else {
            warn!("{} ⚠️ 记录未接受条款，跳过条款勾选", p.run);
        }

        upload_attachment(p, &mut report).await;

        // 附加单选：点第一个可用的
        for (handle, control) in inspect(p.driver, &Locator::css("input[type=\"radio\"]")).await {
            if !control.is_interactable() || control.selected {
                continue;
            }
            if p.tools.executor.click(p.driver, &handle).await {
                info!("✓ 附加选项: '{}'", control.display_name());
                report.record_extra("radio", control.as_option().label);
                break;
            }
        }

        p.audit.fields(&p.run.submission_id, state, &report.filled).await;
        info!("{} 📊 {}: 已填写 {} 项", p.run, state, report.count());

        if final_submit(p, &[]).await {
            info!("{} 🎉 最终提交已完成", p.run);
            capture_evidence(p, "final_submit").await;
            log_step(p, "final_submit").await;
            HandlerOutcome::Finished
        } else {
            warn!("{} ⚠️ 最终提交按钮未能点击", p.run);
            outcome_of(&report)
        }
    }

    // ========== 结构识别出的页面 ==========

    /// 包装类选择页：优先包装相关的单选项
    async fn packaging_choice(&self, p: &PageCtx<'_>) -> HandlerOutcome {
        let state = PageState::PackagingChoice;
        let radios: Vec<_> = inspect(p.driver, &Locator::css("input[type=\"radio\"]"))
            .await
            .into_iter()
            .filter(|(_, c)| c.is_interactable())
            .collect();
        info!("📻 找到 {} 个可用单选项", radios.len());

        let chosen = radios
            .iter()
            .find(|(_, c)| {
                let text = radio_text(c);
                PACKAGING_WORDS.iter().any(|w| text.contains(w))
            })
            .or_else(|| radios.first());

        let mut report = FillReport::default();
        if let Some((handle, control)) = chosen {
            if control.selected || p.tools.executor.click(p.driver, handle).await {
                info!("✓ 已选择: '{}'", control.display_name());
                report.record(FieldKey::PackagingManufacturing, control.as_option().label);
            }
        }

        finish_page(p, state, report).await
    }

    /// 上传页：附件 + 完成注册
    async fn upload_and_complete(&self, p: &PageCtx<'_>) -> HandlerOutcome {
        let state = PageState::Upload;
        let mut report = FillReport::default();
        upload_attachment(p, &mut report).await;

        let preferred = [
            Locator::text("button", "complete registration"),
            Locator::text("button", "complete"),
        ];
        if final_submit(p, &preferred).await {
            info!("{} 🎉 注册已完成", p.run);
            capture_evidence(p, "registration_complete").await;
            log_step(p, "registration_complete").await;
            return HandlerOutcome::Finished;
        }

        warn!("{} ⚠️ 未找到完成注册按钮", p.run);
        outcome_of(&report)
    }
}

// ========== 定位候选 ==========

fn company_locators() -> Vec<Locator> {
    vec![
        Locator::css("input[name=\"company_name\"]"),
        Locator::css("input[id=\"company_name\"]"),
        Locator::css("input[name*=\"company\"]"),
        Locator::css("input[id*=\"company\"]"),
        Locator::css("input[placeholder*=\"ompany\"]"),
    ]
}

fn country_locators() -> Vec<Locator> {
    vec![
        Locator::css("select[name=\"country\"]"),
        Locator::css("select[id=\"country\"]"),
        Locator::css("select[name*=\"country\"]"),
        Locator::css("select[id*=\"country\"]"),
    ]
}

fn radio_locator() -> Locator {
    Locator::css("input[type=\"radio\"]")
}

// ========== 第 2 页的细节 ==========

async fn business_activity(p: &PageCtx<'_>, report: &mut FillReport) {
    let field = FieldKey::BusinessActivity;
    let Some((handle, control)) = find_select(p.driver, &p.tools.resolver, field).await else {
        debug!("页面没有业务类型下拉框");
        return;
    };

    let target = p.record.get(field);
    if !target.is_empty() {
        let chosen = select_matching(
            p.driver,
            &p.tools.executor,
            &p.tools.matcher,
            &handle,
            &control.options,
            field,
            &target,
        )
        .await;
        if let Some(option) = chosen {
            report.record(field, option.label);
            return;
        }
    }

    let real_options = || control.options.iter().filter(|o| !o.is_placeholder());
    let fallback = real_options()
        .find(|o| {
            let label = o.label.to_lowercase();
            label.contains("manufactur") || label.contains("packaging")
        })
        .or_else(|| real_options().next());

    if let Some(option) = fallback {
        if p.tools.executor.select(p.driver, &handle, &option.value).await {
            info!("↪ {} 使用备选项: '{}'", field, option.label);
            report.record(field, option.label.clone());
        }
    }
}

async fn sub_activity(p: &PageCtx<'_>, report: &mut FillReport) {
    let field = FieldKey::SubActivity;
    let driver = p.driver;
    let resolver = &p.tools.resolver;

    // 子类型选项在选中业务类型后才会填充
    let populated = poll_until(p.tools.policy, move || async move {
        find_select(driver, resolver, field)
            .await
            .map(|(_, c)| c.options.iter().any(|o| !o.is_placeholder()))
            .unwrap_or(false)
    })
    .await;
    if !populated {
        debug!("子类型下拉框没有可选项");
        return;
    }
    let Some((handle, control)) = find_select(driver, resolver, field).await else {
        return;
    };

    let target = p.record.get(field);
    if target.is_empty() {
        if let Some(option) = control.options.iter().find(|o| !o.is_placeholder()) {
            if p.tools.executor.select(driver, &handle, &option.value).await {
                info!("↪ {} 没有记录值，使用第一个选项: '{}'", field, option.label);
                report.record(field, option.label.clone());
            }
        }
        return;
    }

    let chosen = select_matching(
        driver,
        &p.tools.executor,
        &p.tools.matcher,
        &handle,
        &control.options,
        field,
        &target,
    )
    .await;
    if let Some(option) = chosen {
        report.record(field, option.label);
    }
}

/// 网店问题：阶段一选是/否，阶段二在新出现的单选项中匹配"卖什么"
async fn online_store(p: &PageCtx<'_>, report: &mut FillReport) {
    let Some(wants_store) = p.record.flag(FieldKey::OnlineStore) else {
        debug!("记录没有可识别的网店取值");
        return;
    };

    let phase_one: Vec<_> = inspect(p.driver, &radio_locator())
        .await
        .into_iter()
        .filter(|(_, c)| c.is_interactable())
        .collect();
    info!("📻 阶段一: {} 个单选项", phase_one.len());

    let Some(index) = phase_one_choice(&phase_one, wants_store) else {
        warn!("⚠️ 没有与网店取值匹配的单选项");
        return;
    };
    let (handle, control) = &phase_one[index];
    if !control.selected && !p.tools.executor.click(p.driver, handle).await {
        return;
    }
    info!("✓ 网店: '{}'", control.as_option().label);
    report.record(FieldKey::OnlineStore, if wants_store { "yes" } else { "no" });

    let sells = p.record.get(FieldKey::OnlineStoreSells);
    if !wants_store || sells.is_empty() {
        return;
    }

    // 阶段二：等待阶段一之外的可交互单选项出现，隐藏的单选项不算
    let known: HashSet<_> = phase_one.iter().map(|(_, c)| radio_key(c)).collect();
    let (driver, known_ref) = (p.driver, &known);
    let revealed = poll_until(p.tools.policy, move || async move {
        !new_radios(driver, known_ref).await.is_empty()
    })
    .await;
    if !revealed {
        warn!("⚠️ 选择网店后没有出现新的单选项");
        return;
    }

    let phase_two = new_radios(p.driver, &known).await;
    info!("📻 阶段二: {} 个新单选项", phase_two.len());

    let options: Vec<_> = phase_two.iter().map(|(_, c)| c.as_option()).collect();
    let decision = match p.tools.matcher.select(&sells, &options) {
        MatchOutcome::Matched(decision) => decision,
        other => {
            warn!("⚠️ '{}' 在新单选项中没有匹配 ({:?})", sells, other);
            return;
        }
    };
    let Some((handle, control)) = phase_two.get(decision.index) else {
        return;
    };
    if control.selected || p.tools.executor.click(p.driver, handle).await {
        info!("✓ {}: '{}' (得分 {:.3})", FieldKey::OnlineStoreSells, options[decision.index].label, decision.score);
        report.record(FieldKey::OnlineStoreSells, options[decision.index].label.clone());
    }
}

/// 阶段一之后新出现的可交互单选项
async fn new_radios(
    driver: &dyn UiDriver,
    known: &HashSet<(String, String, String)>,
) -> Vec<(ControlHandle, ControlDescriptor)> {
    inspect(driver, &radio_locator())
        .await
        .into_iter()
        .filter(|(_, c)| c.is_interactable() && !known.contains(&radio_key(c)))
        .collect()
}

fn phase_one_choice(radios: &[(ControlHandle, ControlDescriptor)], wants_yes: bool) -> Option<usize> {
    let words: Vec<Vec<String>> = radios.iter().map(|(_, c)| words_of(&radio_text(c))).collect();
    let fits = |w: &Vec<String>| {
        let flags: Vec<bool> = w.iter().filter_map(|t| label_flag(t)).collect();
        flags.contains(&wants_yes) && !flags.contains(&!wants_yes)
    };

    words
        .iter()
        .position(|w| fits(w) && has_any(w, STORE_WORDS))
        .or_else(|| words.iter().position(fits))
}

/// 标签里的是 / 否词；单个字母和数字常出现在 id 里，不计
fn label_flag(word: &str) -> Option<bool> {
    if word.chars().count() < 2 || !word.chars().all(char::is_alphabetic) {
        return None;
    }
    flag_token(word)
}

fn has_any(words: &[String], list: &[&str]) -> bool {
    words.iter().any(|t| list.contains(&t.as_str()))
}

fn radio_key(control: &ControlDescriptor) -> (String, String, String) {
    (
        control.value.to_lowercase(),
        control.name.to_lowercase(),
        control.id.to_lowercase(),
    )
}

fn radio_text(control: &ControlDescriptor) -> String {
    format!(
        "{} {} {} {}",
        control.value, control.name, control.id, control.label
    )
    .to_lowercase()
}

fn words_of(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ========== 第 4 页 / 上传页的细节 ==========

async fn accept_terms(p: &PageCtx<'_>, report: &mut FillReport) {
    for (handle, control) in inspect(p.driver, &Locator::css("input[type=\"checkbox\"]")).await {
        if !control.is_interactable() {
            continue;
        }
        let text = format!("{} {}", control.attribute_text(), control.label.to_lowercase());
        if !TERMS_WORDS.iter().any(|w| text.contains(w)) {
            continue;
        }
        if control.selected {
            info!("ℹ️ 条款已勾选");
            report.record(FieldKey::TermsAccepted, "yes");
            return;
        }
        if p.tools.executor.click(p.driver, &handle).await {
            info!("✓ 已接受条款");
            report.record(FieldKey::TermsAccepted, "yes");
            return;
        }
    }
    warn!("⚠️ 未能勾选条款复选框");
}

async fn upload_attachment(p: &PageCtx<'_>, report: &mut FillReport) {
    let Some(path) = &p.run.attachment else {
        debug!("没有附件，跳过上传");
        return;
    };
    let Some((handle, _)) = inspect(p.driver, &Locator::css("input[type=\"file\"]"))
        .await
        .into_iter()
        .next()
    else {
        debug!("页面没有文件控件");
        return;
    };
    if p.tools.executor.upload(p.driver, &handle, path).await {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("✓ 附件已上传: {}", name);
        report.record_extra("attachment", name);
    }
}

/// 滚动到按钮再点击，按钮依次取 `preferred` 和通用提交按钮
async fn final_submit(p: &PageCtx<'_>, preferred: &[Locator]) -> bool {
    let mut locators = preferred.to_vec();
    locators.extend(submit_locators());

    for locator in &locators {
        for (handle, control) in inspect(p.driver, locator).await {
            if !control.is_interactable() {
                continue;
            }
            if let Err(e) = p.driver.execute_script(scripts::SCROLL_INTO_VIEW, Some(&handle)).await {
                debug!("滚动失败: {}", e);
            }
            let before = p.driver.current_url().await.unwrap_or_default();
            if p.tools.executor.click(p.driver, &handle).await {
                debug!("✓ 已点击 {}", locator);
                wait_for_url_change(p.driver, &before, p.tools.policy).await;
                return true;
            }
        }
    }
    false
}

// ========== 共用 ==========

async fn first_interactable(
    driver: &dyn UiDriver,
    locators: &[Locator],
) -> Option<(ControlHandle, ControlDescriptor)> {
    for locator in locators {
        if let Some(found) = inspect(driver, locator)
            .await
            .into_iter()
            .find(|(_, c)| c.is_interactable())
        {
            return Some(found);
        }
    }
    None
}

async fn find_select(
    driver: &dyn UiDriver,
    resolver: &FieldResolver,
    field: FieldKey,
) -> Option<(ControlHandle, ControlDescriptor)> {
    inspect(driver, &Locator::css("select"))
        .await
        .into_iter()
        .find(|(_, c)| c.is_interactable() && resolver.resolve_select(c) == Some(field))
}

fn outcome_of(report: &FillReport) -> HandlerOutcome {
    if report.count() > 0 {
        HandlerOutcome::Completed
    } else {
        HandlerOutcome::Incomplete
    }
}

/// 记录字段快照并提交当前页
async fn finish_page(p: &PageCtx<'_>, state: PageState, report: FillReport) -> HandlerOutcome {
    p.audit.fields(&p.run.submission_id, state, &report.filled).await;
    info!(
        "{} 📊 {}: 已填写 {} 项，跳过 {} 项",
        p.run,
        state,
        report.count(),
        report.skipped
    );

    if p.tools.navigator.submit_current(p.driver, &p.tools.executor).await {
        log_step(p, &format!("{}_submitted", state.as_str().to_lowercase())).await;
    }
    outcome_of(&report)
}

async fn log_step(p: &PageCtx<'_>, step: &str) {
    let url = p.driver.current_url().await.unwrap_or_default();
    let title = p.driver.title().await.unwrap_or_default();
    p.audit.step(&p.run.submission_id, &url, &title, step).await;
}

async fn capture_evidence(p: &PageCtx<'_>, kind: &str) {
    match p.driver.screenshot().await {
        Ok(png) => p.audit.evidence(&p.run.submission_id, kind, &png).await,
        Err(e) => warn!("⚠️ 截图失败: {}", e),
    }
}
