//! The context bundle — the ranked, filtered chart set handed to the LLM.

use crate::analysis::QueryAnalysis;
use crate::chart::ChartDocument;
use serde::{Deserialize, Serialize};

/// One chart type that cleared the relevance threshold, with its scores
/// and the documents backing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChart {
    pub chart_type: String,

    /// Saturating relevance heuristic in `[0.0, 1.0]`.
    pub relevance: f32,

    /// Emphasis score in `[0.1, 1.0]`, multiplied with relevance for
    /// ordering only.
    pub priority: f32,

    /// The documents for this chart type, in corpus order.
    pub documents: Vec<ChartDocument>,
}

impl ScoredChart {
    /// The sort key: priority × relevance.
    pub fn rank_score(&self) -> f32 {
        self.priority * self.relevance
    }
}

/// The unit exchanged with the tool-calling layer and cached per
/// (owner, query): an ordered chart-type → scored-chart mapping plus the
/// analysis that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Surviving charts, sorted descending by `priority × relevance` with
    /// corpus-order tie-breaks.
    pub charts: Vec<ScoredChart>,

    /// The query analysis the scores were computed against.
    pub query_analysis: QueryAnalysis,

    /// Number of chart types that cleared the threshold.
    pub total_relevant_charts: usize,
}

impl ContextBundle {
    /// An empty bundle for an analysis that matched nothing.
    pub fn empty(query_analysis: QueryAnalysis) -> Self {
        Self {
            charts: Vec::new(),
            query_analysis,
            total_relevant_charts: 0,
        }
    }

    pub fn get(&self, chart_type: &str) -> Option<&ScoredChart> {
        self.charts.iter().find(|c| c.chart_type == chart_type)
    }

    pub fn chart_types(&self) -> impl Iterator<Item = &str> {
        self.charts.iter().map(|c| c.chart_type.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

/// What the retrieval fallback chain produced.
///
/// `NoData` is a signal, not an error: upstream it becomes a user-facing
/// request to rephrase or complete profile data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RetrievalOutcome {
    /// Charts were found and ranked.
    Bundle(ContextBundle),
    /// Every step of the chain came up empty.
    NoData,
}

impl RetrievalOutcome {
    pub fn as_bundle(&self) -> Option<&ContextBundle> {
        match self {
            Self::Bundle(b) => Some(b),
            Self::NoData => None,
        }
    }
}
