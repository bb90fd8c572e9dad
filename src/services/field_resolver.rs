//! 字段对应服务 - 业务能力层
//!
//! 决定页面上的哪个控件接收记录中的哪个字段，再交给 ActionExecutor 去填。
//! 每个控件按规则表从上到下匹配，第一条命中的规则生效：
//! 先看控件类型（email / tel），再看属性子串，最宽泛的 company 规则放在最后。

use tracing::{debug, info, warn};

use crate::error::ResolutionError;
use crate::infrastructure::{inspect, Locator, UiDriver};
use crate::models::{ControlDescriptor, ControlHandle, ControlKind, FieldKey, OptionCandidate, Record};
use crate::services::option_matcher::{MatchOutcome, OptionMatcher};
use crate::services::ActionExecutor;

/// 规则条件
#[derive(Debug, Clone, Copy)]
pub enum FieldMatch {
    /// 控件类型
    Kind(ControlKind),
    /// 属性包含任一关键词
    Any(&'static [&'static str]),
    /// 属性包含全部关键词
    All(&'static [&'static str]),
    /// 包含关键词且不包含任何排除词
    AnyExcept(&'static [&'static str], &'static [&'static str]),
}

impl FieldMatch {
    fn matches(&self, control: &ControlDescriptor, attributes: &str) -> bool {
        match self {
            FieldMatch::Kind(kind) => control.kind == *kind,
            FieldMatch::Any(words) => words.iter().any(|w| attributes.contains(w)),
            FieldMatch::All(words) => words.iter().all(|w| attributes.contains(w)),
            FieldMatch::AnyExcept(words, excluded) => {
                words.iter().any(|w| attributes.contains(w))
                    && !excluded.iter().any(|w| attributes.contains(w))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub when: FieldMatch,
    pub field: FieldKey,
}

const fn rule(when: FieldMatch, field: FieldKey) -> FieldRule {
    FieldRule { when, field }
}

/// 文本类控件的规则表
pub fn text_rules() -> Vec<FieldRule> {
    use FieldMatch::*;
    vec![
        rule(Kind(ControlKind::Email), FieldKey::Email),
        rule(Kind(ControlKind::Tel), FieldKey::Phone),
        rule(Any(&["email"]), FieldKey::Email),
        rule(Any(&["phone"]), FieldKey::Phone),
        rule(All(&["first", "name"]), FieldKey::FirstName),
        rule(All(&["last", "name"]), FieldKey::LastName),
        rule(Any(&["street", "address"]), FieldKey::Street),
        rule(Any(&["postal", "zip", "plz"]), FieldKey::PostalCode),
        rule(Any(&["city", "stadt"]), FieldKey::City),
        rule(Any(&["country", "land"]), FieldKey::Country),
        rule(Any(&["website", "web", "url"]), FieldKey::Website),
        rule(
            AnyExcept(&["company"], &["street", "postal", "city", "country", "phone"]),
            FieldKey::CompanyName,
        ),
    ]
}

/// 文本类控件：没有 type 的 input 按文本框处理
pub const TEXT_CONTROLS: &str = "input[type=\"text\"], input[type=\"email\"], input[type=\"tel\"], \
                                 input:not([type]), textarea";

/// 下拉框的规则表
pub fn select_rules() -> Vec<FieldRule> {
    use FieldMatch::*;
    vec![
        rule(Any(&["salutation", "anrede"]), FieldKey::Salutation),
        rule(Any(&["country", "land"]), FieldKey::Country),
        rule(Any(&["sub"]), FieldKey::SubActivity),
        rule(Any(&["business", "activity"]), FieldKey::BusinessActivity),
    ]
}

/// 一次填写的结果
#[derive(Debug, Clone, Default)]
pub struct FillReport {
    /// 已经写入并验证的字段
    pub filled: Vec<(FieldKey, String)>,
    /// 不对应记录字段的操作（附件、附加选项），`(说明, 值)`
    pub extras: Vec<(String, String)>,
    /// 没有规则或没有值而跳过的控件数
    pub skipped: usize,
}

impl FillReport {
    pub fn count(&self) -> usize {
        self.filled.len() + self.extras.len()
    }

    pub fn merge(&mut self, other: FillReport) {
        self.filled.extend(other.filled);
        self.extras.extend(other.extras);
        self.skipped += other.skipped;
    }

    pub fn record(&mut self, field: FieldKey, value: impl Into<String>) {
        self.filled.push((field, value.into()));
    }

    pub fn record_extra(&mut self, what: impl Into<String>, value: impl Into<String>) {
        self.extras.push((what.into(), value.into()));
    }
}

/// 字段对应服务
pub struct FieldResolver {
    text_rules: Vec<FieldRule>,
    select_rules: Vec<FieldRule>,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self {
            text_rules: text_rules(),
            select_rules: select_rules(),
        }
    }

    /// 文本类控件对应的字段
    pub fn resolve(&self, control: &ControlDescriptor) -> Option<FieldKey> {
        if !control.kind.is_textual() {
            return None;
        }
        first_rule(&self.text_rules, control)
    }

    /// 下拉框对应的字段
    pub fn resolve_select(&self, control: &ControlDescriptor) -> Option<FieldKey> {
        if control.kind != ControlKind::Select {
            return None;
        }
        first_rule(&self.select_rules, control)
    }

    /// 填写页面上所有可见的文本类控件
    pub async fn fill_text_controls(
        &self,
        driver: &dyn UiDriver,
        executor: &ActionExecutor,
        record: &Record,
    ) -> FillReport {
        let locator = Locator::css(TEXT_CONTROLS);
        let mut report = FillReport::default();

        for (handle, control) in inspect(driver, &locator).await {
            if !control.is_interactable() {
                continue;
            }
            let Some(field) = self.resolve(&control) else {
                let err = ResolutionError::NoFieldRule {
                    control: control.attribute_text().trim().to_string(),
                };
                debug!("跳过: {}", err);
                report.skipped += 1;
                continue;
            };

            let value = record.get(field);
            if value.is_empty() {
                debug!("字段 {} 没有值，跳过控件 {}", field, control.display_name());
                report.skipped += 1;
                continue;
            }

            if executor.fill(driver, &handle, &value).await {
                info!("✓ {}: '{}'", field, value);
                report.record(field, value);
            } else {
                warn!("⚠️ 字段 {} 填写失败 ({})", field, control.display_name());
            }
        }

        report
    }

    /// 填写页面上能对应到字段的下拉框
    pub async fn fill_selects(
        &self,
        driver: &dyn UiDriver,
        executor: &ActionExecutor,
        matcher: &OptionMatcher,
        record: &Record,
    ) -> FillReport {
        let mut report = FillReport::default();

        for (handle, control) in inspect(driver, &Locator::css("select")).await {
            if !control.is_interactable() {
                continue;
            }
            let Some(field) = self.resolve_select(&control) else {
                report.skipped += 1;
                continue;
            };
            let value = record.get(field);
            if value.is_empty() {
                report.skipped += 1;
                continue;
            }
            if let Some(option) =
                select_matching(driver, executor, matcher, &handle, &control.options, field, &value).await
            {
                report.record(field, option.label);
            }
        }

        report
    }
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn first_rule(rules: &[FieldRule], control: &ControlDescriptor) -> Option<FieldKey> {
    let attributes = control.attribute_text();
    rules
        .iter()
        .find(|rule| rule.when.matches(control, &attributes))
        .map(|rule| rule.field)
}

/// 用 OptionMatcher 在下拉选项中找到目标值并选中，返回选中的选项
pub async fn select_matching(
    driver: &dyn UiDriver,
    executor: &ActionExecutor,
    matcher: &OptionMatcher,
    handle: &ControlHandle,
    options: &[OptionCandidate],
    field: FieldKey,
    target: &str,
) -> Option<OptionCandidate> {
    let decision = match matcher.select(target, options) {
        MatchOutcome::Matched(decision) => decision,
        MatchOutcome::Unresolved { best_score } => {
            let err = ResolutionError::BelowThreshold {
                field,
                target: target.to_string(),
                best_score,
            };
            warn!("⚠️ {}", err);
            return None;
        }
        MatchOutcome::NoCandidates => {
            warn!("⚠️ {}", ResolutionError::NoCandidates { field });
            return None;
        }
    };

    let option = options.get(decision.index)?.clone();
    if executor.select(driver, handle, &option.value).await {
        info!(
            "✓ {}: '{}' ({}, 得分 {:.3})",
            field,
            option.label,
            if decision.exact { "精确匹配" } else { "模糊匹配" },
            decision.score
        );
        Some(option)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(kind: ControlKind, name: &str, id: &str, placeholder: &str) -> ControlDescriptor {
        let mut c = ControlDescriptor::new(kind);
        c.name = name.to_string();
        c.id = id.to_string();
        c.placeholder = placeholder.to_string();
        c
    }

    #[test]
    fn test_company_email_resolves_to_email() {
        let resolver = FieldResolver::new();
        let by_kind = control(ControlKind::Email, "company_email", "", "");
        assert_eq!(resolver.resolve(&by_kind), Some(FieldKey::Email));

        // 即使类型是 text，email 属性规则也排在 company 之前
        let by_attr = control(ControlKind::Text, "company_email", "", "");
        assert_eq!(resolver.resolve(&by_attr), Some(FieldKey::Email));
    }

    #[test]
    fn test_tel_kind_beats_attributes() {
        let resolver = FieldResolver::new();
        let c = control(ControlKind::Tel, "company_city", "", "");
        assert_eq!(resolver.resolve(&c), Some(FieldKey::Phone));
    }

    #[test]
    fn test_company_prefixed_address_fields() {
        let resolver = FieldResolver::new();
        let cases = [
            ("company_street", FieldKey::Street),
            ("company_postal_code", FieldKey::PostalCode),
            ("company_city", FieldKey::City),
            ("company_country", FieldKey::Country),
            ("company_name", FieldKey::CompanyName),
            ("contact_first_name", FieldKey::FirstName),
            ("contact_last_name", FieldKey::LastName),
            ("company_website", FieldKey::Website),
        ];
        for (name, expected) in cases {
            let c = control(ControlKind::Text, name, "", "");
            assert_eq!(resolver.resolve(&c), Some(expected), "{}", name);
        }
    }

    #[test]
    fn test_placeholder_and_id_are_considered() {
        let resolver = FieldResolver::new();
        let c = control(ControlKind::Text, "", "field_7", "PLZ");
        assert_eq!(resolver.resolve(&c), Some(FieldKey::PostalCode));
    }

    #[test]
    fn test_unmatched_control_is_skipped() {
        let resolver = FieldResolver::new();
        let c = control(ControlKind::Text, "vat_number", "vat", "");
        assert_eq!(resolver.resolve(&c), None);

        // 非文本控件不参与文本规则
        let c = control(ControlKind::Radio, "email", "", "");
        assert_eq!(resolver.resolve(&c), None);
    }

    #[test]
    fn test_select_rules() {
        let resolver = FieldResolver::new();
        let sub = control(ControlKind::Select, "sub_activity", "", "");
        assert_eq!(resolver.resolve_select(&sub), Some(FieldKey::SubActivity));
        let main = control(ControlKind::Select, "business_activity", "", "");
        assert_eq!(resolver.resolve_select(&main), Some(FieldKey::BusinessActivity));
        let salutation = control(ControlKind::Select, "", "salutation", "");
        assert_eq!(resolver.resolve_select(&salutation), Some(FieldKey::Salutation));
    }

    #[test]
    fn test_fill_report_merge() {
        let mut a = FillReport::default();
        a.record(FieldKey::City, "Berlin");
        let mut b = FillReport::default();
        b.record(FieldKey::Country, "Germany");
        b.record_extra("attachment", "brochure.pdf");
        b.skipped = 2;
        a.merge(b);
        assert_eq!(a.count(), 3);
        assert_eq!(a.skipped, 2);
    }
}
