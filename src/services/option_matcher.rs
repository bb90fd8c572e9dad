//! 选项匹配服务 - 业务能力层
//!
//! 把记录中的自由文本对应到下拉框 / 单选组中的某一个选项。
//! 只返回决定，不碰 UI；应用决定由 ActionExecutor 负责。

use std::collections::BTreeSet;

use phf::phf_set;
use tracing::debug;

use crate::config::env_parse;
use crate::models::OptionCandidate;

/// 领域通用词，不算"独特词"
static GENERIC_WORDS: phf::Set<&'static str> = phf_set! {
    "paper", "production", "products", "manufacturing",
};

/// 参与词级比较的最短长度（不含）
const MIN_WORD_LEN: usize = 2;
/// 子串比较的最短长度
const SUBSTRING_MIN_LEN: usize = 4;
/// 相似词比较的最短长度
const SIMILARITY_MIN_LEN: usize = 5;
const SIMILARITY_MAX_LEN_DIFF: usize = 2;
const SIMILARITY_RATIO: f64 = 0.7;

/// 模糊匹配参数
///
/// 阈值和各项权重都是经验值，全部可以通过环境变量覆盖。
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// 最高分不低于该值才会选中
    pub threshold: f64,
    /// 整串包含（任一方向）
    pub containment_weight: f64,
    /// 每个共同词
    pub shared_word_weight: f64,
    /// 目标词命中比例
    pub completeness_weight: f64,
    /// 每对互为子串的词
    pub substring_weight: f64,
    /// 每对字形相近的词
    pub similarity_weight: f64,
    /// 每个命中的非通用词
    pub distinctive_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            containment_weight: 1.0,
            shared_word_weight: 0.5,
            completeness_weight: 0.3,
            substring_weight: 0.1,
            similarity_weight: 0.1,
            distinctive_weight: 0.8,
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            threshold: env_parse("MATCH_THRESHOLD").unwrap_or(default.threshold),
            containment_weight: env_parse("MATCH_CONTAINMENT_WEIGHT")
                .unwrap_or(default.containment_weight),
            shared_word_weight: env_parse("MATCH_SHARED_WORD_WEIGHT")
                .unwrap_or(default.shared_word_weight),
            completeness_weight: env_parse("MATCH_COMPLETENESS_WEIGHT")
                .unwrap_or(default.completeness_weight),
            substring_weight: env_parse("MATCH_SUBSTRING_WEIGHT").unwrap_or(default.substring_weight),
            similarity_weight: env_parse("MATCH_SIMILARITY_WEIGHT")
                .unwrap_or(default.similarity_weight),
            distinctive_weight: env_parse("MATCH_DISTINCTIVE_WEIGHT")
                .unwrap_or(default.distinctive_weight),
        }
    }
}

/// 选中的选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    /// 在传入列表中的下标
    pub index: usize,
    pub score: f64,
    /// 是否为精确匹配
    pub exact: bool,
}

/// 匹配结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    Matched(MatchDecision),
    /// 有候选但最高分不够
    Unresolved { best_score: f64 },
    /// 没有可比较的候选
    NoCandidates,
}

impl MatchOutcome {
    pub fn decision(self) -> Option<MatchDecision> {
        match self {
            MatchOutcome::Matched(decision) => Some(decision),
            _ => None,
        }
    }
}

/// 选项匹配服务
///
/// 职责：
/// - 精确匹配优先，命中即返回
/// - 否则逐项打分，取最高分（同分取靠前者）
/// - 占位选项（空文字、含 "select"）不参与
#[derive(Debug, Clone, Default)]
pub struct OptionMatcher {
    config: MatcherConfig,
}

impl OptionMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// 为目标文本选出至多一个候选
    pub fn select(&self, target: &str, candidates: &[OptionCandidate]) -> MatchOutcome {
        let target = target.trim();
        let eligible: Vec<(usize, &OptionCandidate)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| is_eligible(c))
            .collect();

        if target.is_empty() || eligible.is_empty() {
            return MatchOutcome::NoCandidates;
        }

        // 1. 精确匹配
        let wanted = target.to_lowercase();
        if let Some((index, _)) = eligible
            .iter()
            .find(|(_, c)| c.label.trim().to_lowercase() == wanted)
        {
            debug!("精确匹配: '{}' → 第 {} 项", target, index);
            return MatchOutcome::Matched(MatchDecision {
                index: *index,
                score: 1.0,
                exact: true,
            });
        }

        // 2. 模糊打分
        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in &eligible {
            let score = self.score(target, &candidate.label);
            if score > 0.0 {
                debug!("选项 '{}' 得分 {:.3}", candidate.label, score);
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((*index, score));
            }
        }

        match best {
            Some((index, score)) if score >= self.config.threshold => {
                MatchOutcome::Matched(MatchDecision {
                    index,
                    score,
                    exact: false,
                })
            }
            Some((_, score)) => MatchOutcome::Unresolved { best_score: score },
            None => MatchOutcome::NoCandidates,
        }
    }

    /// 模糊得分（不含精确匹配短路）
    pub fn score(&self, target: &str, candidate: &str) -> f64 {
        let cfg = &self.config;
        let target_text = target.trim().to_lowercase();
        let candidate_text = candidate.trim().to_lowercase();
        let target_words = words(&target_text);
        let candidate_words = words(&candidate_text);

        let mut score = 0.0;

        if !target_text.is_empty()
            && !candidate_text.is_empty()
            && (candidate_text.contains(&target_text) || target_text.contains(&candidate_text))
        {
            score += cfg.containment_weight;
        }

        let shared = target_words.intersection(&candidate_words).count();
        if shared > 0 {
            score += shared as f64 * cfg.shared_word_weight;
            score += shared as f64 / target_words.len() as f64 * cfg.completeness_weight;
        }

        for t in &target_words {
            for c in &candidate_words {
                if t.len() >= SUBSTRING_MIN_LEN
                    && c.len() >= SUBSTRING_MIN_LEN
                    && (c.contains(t.as_str()) || t.contains(c.as_str()))
                {
                    score += cfg.substring_weight;
                }
                if looks_similar(t, c) {
                    score += cfg.similarity_weight;
                }
            }
        }

        let distinctive = target_words
            .iter()
            .filter(|w| !GENERIC_WORDS.contains(w.as_str()) && candidate_words.contains(*w))
            .count();
        score += distinctive as f64 * cfg.distinctive_weight;

        score
    }
}

fn is_eligible(candidate: &OptionCandidate) -> bool {
    let label = candidate.label.trim();
    !label.is_empty() && !label.to_lowercase().contains("select")
}

/// 小写、按空白切分、去重，只保留长度 > 2 的词
fn words(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > MIN_WORD_LEN)
        .map(str::to_string)
        .collect()
}

/// 长度相近、同位置字符重合 ≥ 70% 的两个不同词
fn looks_similar(a: &str, b: &str) -> bool {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if a == b || la < SIMILARITY_MIN_LEN || lb < SIMILARITY_MIN_LEN {
        return false;
    }
    if la.abs_diff(lb) > SIMILARITY_MAX_LEN_DIFF {
        return false;
    }
    let same = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    same as f64 >= la.min(lb) as f64 * SIMILARITY_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(labels: &[&str]) -> Vec<OptionCandidate> {
        labels
            .iter()
            .map(|l| OptionCandidate::new(*l, l.to_lowercase().replace(' ', "_")))
            .collect()
    }

    fn matcher() -> OptionMatcher {
        OptionMatcher::default()
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let outcome = matcher().select(
            "Products they own",
            &options(&["Products they own", "Products owned by other vendors", "Both"]),
        );
        assert_eq!(
            outcome,
            MatchOutcome::Matched(MatchDecision {
                index: 0,
                score: 1.0,
                exact: true
            })
        );
    }

    #[test]
    fn test_exact_match_beats_earlier_fuzzy_candidate() {
        let outcome = matcher().select(
            "Recycled Paper Production",
            &options(&["Paper Production", "Recycled Paper Production", "Plastic Production"]),
        );
        let decision = outcome.decision().unwrap();
        assert_eq!(decision.index, 1);
        assert!(decision.exact);
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let decision = matcher()
            .select("  germany ", &options(&["France", "Germany", "Italy"]))
            .decision()
            .unwrap();
        assert_eq!(decision.index, 1);
        assert_eq!(decision.score, 1.0);
    }

    #[test]
    fn test_distinctive_word_wins() {
        // "recycled" 不是通用词，得到额外加分
        let decision = matcher()
            .select(
                "Recycled paper",
                &options(&["Paper Production", "Recycled Paper Production"]),
            )
            .decision()
            .unwrap();
        assert_eq!(decision.index, 1);
        assert!(!decision.exact);
    }

    #[test]
    fn test_below_threshold_is_unresolved() {
        let outcome = matcher().select("Glass", &options(&["Wood", "Metal"]));
        assert_eq!(outcome, MatchOutcome::Unresolved { best_score: 0.0 });
        assert!(outcome.decision().is_none());
    }

    #[test]
    fn test_placeholders_never_selected() {
        let outcome = matcher().select("select", &options(&["Please select", ""]));
        assert_eq!(outcome, MatchOutcome::NoCandidates);

        // 下标仍然指向原始列表
        let decision = matcher()
            .select("Italy", &options(&["Please select", "France", "Italy"]))
            .decision()
            .unwrap();
        assert_eq!(decision.index, 2);
    }

    #[test]
    fn test_ties_pick_first_index() {
        let decision = matcher()
            .select("Cardboard", &options(&["Cardboard boxes", "Cardboard tubes"]))
            .decision()
            .unwrap();
        assert_eq!(decision.index, 0);
    }

    #[test]
    fn test_score_components() {
        let m = matcher();
        // 整串包含 1.0 + 共同词 0.5 + 完整度 0.3 + 子串 0.1 + 独特词 0.8
        let score = m.score("cartons", "Folding cartons");
        assert!((score - 2.7).abs() < 1e-9, "score = {}", score);

        // 相近词：packaging / packeging
        let score = m.score("packaging", "packeging");
        assert!((score - 0.1).abs() < 1e-9, "score = {}", score);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let strict = OptionMatcher::new(MatcherConfig {
            threshold: 5.0,
            ..MatcherConfig::default()
        });
        let outcome = strict.select("Recycled paper", &options(&["Recycled Paper Production"]));
        assert!(matches!(outcome, MatchOutcome::Unresolved { .. }));
    }
}
