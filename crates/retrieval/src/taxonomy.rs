//! Topic taxonomy — keyword sets mapped to topic labels and chart-type
//! hints.
//!
//! The taxonomy is an explicit, injectable data structure loaded once at
//! startup. Tests (and deployments with different chart vocabularies) can
//! supply alternate rule tables; the default table matches the production
//! keyword sets.

use serde::{Deserialize, Serialize};

/// One taxonomy rule: if any keyword appears in the query, the topic
/// matches and its chart-type hints are unioned into the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRule {
    /// Topic label (e.g. "career").
    pub topic: String,

    /// Lowercase keywords tested by substring containment.
    pub keywords: Vec<String>,

    /// Chart types this topic makes relevant.
    pub chart_type_hints: Vec<String>,
}

/// An ordered list of topic rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    rules: Vec<TopicRule>,
}

impl Taxonomy {
    pub fn new(rules: Vec<TopicRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    /// The built-in production rule table.
    pub fn builtin() -> Self {
        fn rule(topic: &str, keywords: &[&str], hints: &[&str]) -> TopicRule {
            TopicRule {
                topic: topic.into(),
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                chart_type_hints: hints.iter().map(|s| s.to_string()).collect(),
            }
        }

        Self::new(vec![
            rule(
                "personality",
                &["personality", "character", "traits"],
                &["basic", "planets", "ascendant"],
            ),
            rule(
                "career",
                &["career", "job", "profession"],
                &["basic", "planets", "houses", "dasha"],
            ),
            rule(
                "relationships",
                &["love", "relationship", "marriage"],
                &["basic", "planets", "houses", "compatibility"],
            ),
            rule(
                "health",
                &["health", "wellness", "medical"],
                &["basic", "planets", "houses", "ashtakvarga"],
            ),
            rule(
                "predictions",
                &["future", "prediction", "forecast"],
                &["dasha", "predictive", "transits"],
            ),
        ])
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
