//! Threshold filtering and summary/full-text quota selection

use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::models::Passage;

/// Restriction on the `source` metadata tag of selected passages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilter {
    /// Keep every source
    All,
    /// Keep passages whose `meta.source` equals the tag
    Tag(String),
}

impl SourceFilter {
    /// Resolve a caller-facing selector ("code civil", "ipbes", "all", ...)
    /// through the configured selector table. Unknown selectors mean `All`.
    ///
    /// An exact key wins; otherwise the case-insensitive match with the
    /// smallest key is used, so the result never depends on map order.
    pub fn resolve(selector: &str, sources: &HashMap<String, String>) -> Self {
        let selector = selector.trim();
        if let Some(tag) = sources.get(selector) {
            return Self::Tag(tag.clone());
        }
        let key = selector.to_lowercase();
        sources
            .iter()
            .filter(|(name, _)| name.to_lowercase() == key)
            .min_by(|a, b| a.0.cmp(b.0))
            .map_or(Self::All, |(_, tag)| Self::Tag(tag.clone()))
    }

    fn accepts(&self, passage: &Passage) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => &passage.meta.source == tag,
        }
    }
}

/// Selects the passages that go into the prompt
#[derive(Debug, Clone)]
pub struct PassageRanker {
    k_summary: usize,
    k_total: usize,
    summary_report_types: Vec<String>,
}

impl PassageRanker {
    /// `k_summary` above `k_total` is clamped to `k_total`
    pub fn new(k_summary: usize, k_total: usize, summary_report_types: Vec<String>) -> Self {
        Self {
            k_summary: k_summary.min(k_total),
            k_total,
            summary_report_types,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(
            config.k_summary,
            config.k_total,
            config.summary_report_types.clone(),
        )
    }

    pub const fn k_summary(&self) -> usize {
        self.k_summary
    }

    pub const fn k_total(&self) -> usize {
        self.k_total
    }

    /// Keep passages scoring strictly above `threshold`, preserving order
    pub fn above_threshold(passages: Vec<Passage>, threshold: f32) -> Vec<Passage> {
        passages
            .into_iter()
            .filter(|p| p.score > threshold)
            .collect()
    }

    /// Source filter, then up to `k_summary` summaries followed by full-text
    /// passages up to `k_total` overall. Input order is kept within each group.
    pub fn select(&self, passages: Vec<Passage>, filter: &SourceFilter) -> Vec<Passage> {
        let (summaries, full_text): (Vec<Passage>, Vec<Passage>) = passages
            .into_iter()
            .filter(|p| filter.accepts(p))
            .partition(|p| p.is_summary(&self.summary_report_types));

        let mut selected: Vec<Passage> = summaries.into_iter().take(self.k_summary).collect();
        // a summary shortfall is back-filled from full text
        let remaining = self.k_total - selected.len();
        selected.extend(full_text.into_iter().take(remaining));
        selected
    }

    /// Threshold then select
    pub fn rank(
        &self,
        passages: Vec<Passage>,
        threshold: f32,
        filter: &SourceFilter,
    ) -> Vec<Passage> {
        self.select(Self::above_threshold(passages, threshold), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PassageMeta;

    fn passage(content: &str, score: f32, report_type: &str, source: &str) -> Passage {
        Passage {
            content: content.to_string(),
            score,
            meta: PassageMeta {
                source: source.to_string(),
                report_type: report_type.to_string(),
                ..PassageMeta::default()
            },
        }
    }

    fn ranker() -> PassageRanker {
        PassageRanker::new(3, 10, vec!["SPM".to_string(), "TS".to_string()])
    }

    fn contents(passages: &[Passage]) -> Vec<&str> {
        passages.iter().map(|p| p.content.as_str()).collect()
    }

    /// Two summaries and ten full-text passages with descending scores
    fn scenario_a() -> Vec<Passage> {
        let full_scores = [0.85, 0.8, 0.75, 0.7, 0.65, 0.6, 0.58, 0.56, 0.3, 0.1];
        let mut passages = vec![
            passage("s1", 0.9, "SPM", "codecivil"),
            passage("s2", 0.8, "TS", "codecivil"),
        ];
        passages.extend(
            full_scores
                .iter()
                .enumerate()
                .map(|(i, &score)| passage(&format!("f{}", i + 1), score, "article", "codecivil")),
        );
        passages
    }

    #[test]
    fn test_scenario_summaries_then_full_text() {
        let selected = ranker().rank(scenario_a(), 0.555, &SourceFilter::All);

        assert_eq!(selected.len(), 10);
        assert_eq!(
            contents(&selected),
            vec!["s1", "s2", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8"]
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let passages = vec![
            passage("equal", 0.5, "article", ""),
            passage("above", 0.5001, "article", ""),
        ];
        let kept = PassageRanker::above_threshold(passages, 0.5);
        assert_eq!(contents(&kept), vec!["above"]);
    }

    #[test]
    fn test_everything_below_threshold_is_empty() {
        let passages = vec![
            passage("a", 0.3, "SPM", ""),
            passage("b", 0.555, "article", ""),
        ];
        assert!(ranker().rank(passages, 0.555, &SourceFilter::All).is_empty());
    }

    #[test]
    fn test_summary_quota_caps_summaries() {
        let passages: Vec<Passage> = (0..6)
            .map(|i| passage(&format!("s{i}"), 0.9, "SPM", ""))
            .chain((0..2).map(|i| passage(&format!("f{i}"), 0.8, "article", "")))
            .collect();

        let selected = ranker().select(passages, &SourceFilter::All);
        assert_eq!(contents(&selected), vec!["s0", "s1", "s2", "f0", "f1"]);
    }

    #[test]
    fn test_summary_order_precedes_higher_scored_full_text() {
        let passages = vec![
            passage("f", 0.99, "article", ""),
            passage("s", 0.6, "TS", ""),
        ];
        let selected = ranker().select(passages, &SourceFilter::All);
        assert_eq!(contents(&selected), vec!["s", "f"]);
    }

    #[test]
    fn test_output_bounds_hold_for_all_quotas() {
        let passages = scenario_a();
        let summary_types = vec!["SPM".to_string(), "TS".to_string()];
        for k_total in 1..=12 {
            for k_summary in 0..=k_total {
                let ranker = PassageRanker::new(k_summary, k_total, summary_types.clone());
                let selected = ranker.rank(passages.clone(), 0.2, &SourceFilter::All);
                let summaries = selected.iter().filter(|p| p.is_summary(&summary_types)).count();

                assert!(selected.len() <= k_total);
                assert!(summaries <= k_summary.min(2));
                assert!(selected.iter().all(|p| p.score > 0.2));
            }
        }
    }

    #[test]
    fn test_rank_is_idempotent() {
        let ranker = ranker();
        let once = ranker.rank(scenario_a(), 0.555, &SourceFilter::All);
        let twice = ranker.rank(once.clone(), 0.555, &SourceFilter::All);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_k_summary_clamped_to_k_total() {
        let ranker = PassageRanker::new(5, 2, vec!["SPM".to_string()]);
        assert_eq!(ranker.k_summary(), 2);
        let passages = (0..4).map(|i| passage(&format!("s{i}"), 0.9, "SPM", "")).collect();
        assert_eq!(ranker.select(passages, &SourceFilter::All).len(), 2);
    }

    // ====== Source Filter Tests ======

    #[test]
    fn test_source_filter_resolution() {
        let sources = crate::config::default_sources();
        assert_eq!(
            SourceFilter::resolve("Code civil", &sources),
            SourceFilter::Tag("codecivil".to_string())
        );
        assert_eq!(
            SourceFilter::resolve("IPBES", &sources),
            SourceFilter::Tag("IPBES".to_string())
        );
        assert_eq!(SourceFilter::resolve("all", &sources), SourceFilter::All);
        assert_eq!(SourceFilter::resolve("ipcc", &sources), SourceFilter::All);
    }

    #[test]
    fn test_source_filter_resolution_ignores_map_order() {
        let sources = HashMap::from([
            ("IPBES".to_string(), "upper".to_string()),
            ("ipbes".to_string(), "lower".to_string()),
            ("Code Civil".to_string(), "b".to_string()),
            ("CODE CIVIL".to_string(), "a".to_string()),
        ]);
        assert_eq!(
            SourceFilter::resolve("ipbes", &sources),
            SourceFilter::Tag("lower".to_string())
        );
        assert_eq!(
            SourceFilter::resolve("IPBES", &sources),
            SourceFilter::Tag("upper".to_string())
        );
        // no exact key: smallest of the case-insensitive matches
        assert_eq!(
            SourceFilter::resolve("code civil", &sources),
            SourceFilter::Tag("a".to_string())
        );
    }

    #[test]
    fn test_source_filter_applies_tag() {
        let passages = vec![
            passage("civil", 0.9, "article", "codecivil"),
            passage("commerce", 0.9, "article", "codecommerce"),
        ];
        let filter = SourceFilter::Tag("codecivil".to_string());
        let selected = ranker().select(passages, &filter);
        assert_eq!(contents(&selected), vec!["civil"]);
    }
}
