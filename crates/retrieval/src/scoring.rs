//! Relevance and priority scoring for chart types.
//!
//! The relevance score is a saturating weighted-OR, not a probability:
//! independent bonuses are summed and clamped to 1.0, so ties are
//! expected and the selector breaks them by corpus order. The constants
//! are hand-tuned and preserved exactly for behavioral compatibility;
//! they live in [`ScoringConfig`] rather than inline literals.

use nakshatra_core::{QueryAnalysis, QueryPriority};
use serde::{Deserialize, Serialize};

/// A chart-type-specific relevance bonus, optionally gated on a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeBonus {
    pub chart_type: String,
    pub bonus: f32,
    /// If set, the bonus applies only when the analysis matched this topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_topic: Option<String>,
}

/// Every tuned constant used by relevance and priority scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// The always-relevant baseline identity chart type.
    #[serde(default = "default_chart_type")]
    pub default_chart_type: String,

    /// Relevance bonus for the default chart type.
    #[serde(default = "default_type_relevance")]
    pub default_type_relevance: f32,

    /// Relevance bonus when the chart type appears in the analysis hints.
    #[serde(default = "hinted_relevance")]
    pub hinted_relevance: f32,

    /// Per-chart-type bonuses, some gated on matched topics.
    #[serde(default = "builtin_type_bonuses")]
    pub type_bonuses: Vec<TypeBonus>,

    /// Charts at or below this relevance are excluded from the bundle.
    #[serde(default = "relevance_threshold")]
    pub relevance_threshold: f32,

    /// Priority baseline for any surviving chart.
    #[serde(default = "base_priority")]
    pub base_priority: f32,

    /// Priority for the default chart type.
    #[serde(default = "default_type_priority")]
    pub default_type_priority: f32,

    /// Priority for hinted chart types.
    #[serde(default = "hinted_priority")]
    pub hinted_priority: f32,

    /// Added (high) or subtracted (low) based on query priority.
    #[serde(default = "priority_adjustment")]
    pub priority_adjustment: f32,

    /// Priority clamp bounds.
    #[serde(default = "min_priority")]
    pub min_priority: f32,
    #[serde(default = "max_priority")]
    pub max_priority: f32,
}

fn default_chart_type() -> String {
    "basic".into()
}
fn default_type_relevance() -> f32 {
    0.8
}
fn hinted_relevance() -> f32 {
    0.6
}
fn relevance_threshold() -> f32 {
    0.3
}
fn base_priority() -> f32 {
    0.5
}
fn default_type_priority() -> f32 {
    0.9
}
fn hinted_priority() -> f32 {
    0.8
}
fn priority_adjustment() -> f32 {
    0.2
}
fn min_priority() -> f32 {
    0.1
}
fn max_priority() -> f32 {
    1.0
}

fn builtin_type_bonuses() -> Vec<TypeBonus> {
    fn bonus(chart_type: &str, bonus: f32, topic: Option<&str>) -> TypeBonus {
        TypeBonus {
            chart_type: chart_type.into(),
            bonus,
            required_topic: topic.map(Into::into),
        }
    }
    vec![
        bonus("planets", 0.7, None),
        bonus("houses", 0.6, None),
        bonus("dasha", 0.9, Some("predictions")),
        bonus("ashtakvarga", 0.8, Some("health")),
        bonus("compatibility", 0.9, Some("relationships")),
    ]
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_chart_type: default_chart_type(),
            default_type_relevance: default_type_relevance(),
            hinted_relevance: hinted_relevance(),
            type_bonuses: builtin_type_bonuses(),
            relevance_threshold: relevance_threshold(),
            base_priority: base_priority(),
            default_type_priority: default_type_priority(),
            hinted_priority: hinted_priority(),
            priority_adjustment: priority_adjustment(),
            min_priority: min_priority(),
            max_priority: max_priority(),
        }
    }
}

/// Pure scorer over a [`ScoringConfig`].
pub struct RelevanceScorer {
    config: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Relevance of one chart type to the analysis, in `[0.0, 1.0]`.
    pub fn relevance(&self, chart_type: &str, analysis: &QueryAnalysis) -> f32 {
        let cfg = &self.config;
        let mut relevance = 0.0;

        if chart_type == cfg.default_chart_type {
            relevance += cfg.default_type_relevance;
        }

        if analysis.hints_include(chart_type) {
            relevance += cfg.hinted_relevance;
        }

        for tb in &cfg.type_bonuses {
            if tb.chart_type != chart_type {
                continue;
            }
            let gate_open = match &tb.required_topic {
                Some(topic) => analysis.has_topic(topic),
                None => true,
            };
            if gate_open {
                relevance += tb.bonus;
            }
        }

        relevance.min(1.0)
    }

    /// Priority of one chart type, in `[min_priority, max_priority]`.
    ///
    /// Hinted types overwrite the default-type priority when both apply;
    /// relevance already rewards the default type separately.
    pub fn priority(&self, chart_type: &str, analysis: &QueryAnalysis) -> f32 {
        let cfg = &self.config;
        let mut priority = cfg.base_priority;

        if chart_type == cfg.default_chart_type {
            priority = cfg.default_type_priority;
        }

        if analysis.hints_include(chart_type) {
            priority = cfg.hinted_priority;
        }

        match analysis.priority {
            QueryPriority::High => priority += cfg.priority_adjustment,
            QueryPriority::Low => priority -= cfg.priority_adjustment,
            QueryPriority::Medium => {}
        }

        priority.clamp(cfg.min_priority, cfg.max_priority)
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
