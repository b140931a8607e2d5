//! Query analysis — what the user is asking about.
//!
//! Produced by the query analyzer, consumed by the relevance scorer and
//! chart selector. Derived per request and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How much emphasis the query deserves during priority scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// The result of analyzing a user query against the topic taxonomy.
///
/// Ordered sets keep repeated analysis of the same query byte-identical,
/// which the response cache key depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Matched topic labels (e.g. "career", "relationships").
    pub topics: BTreeSet<String>,

    /// Union of chart-type hints from every matched topic.
    pub chart_type_hints: BTreeSet<String>,

    /// Query priority derived from how many topics matched.
    pub priority: QueryPriority,
}

impl QueryAnalysis {
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    pub fn hints_include(&self, chart_type: &str) -> bool {
        self.chart_type_hints.contains(chart_type)
    }
}
