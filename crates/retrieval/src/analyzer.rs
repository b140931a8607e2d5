//! Query analyzer — matches the lowercased query against the taxonomy.

use crate::taxonomy::Taxonomy;
use nakshatra_core::{QueryAnalysis, QueryPriority};
use tracing::debug;

/// Pure, stateless analyzer over an injected taxonomy.
pub struct QueryAnalyzer {
    taxonomy: Taxonomy,
}

impl QueryAnalyzer {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// Analyze a free-text query.
    ///
    /// Multiple topics may match; their chart-type hints are unioned.
    /// Never fails: an unmatched query yields empty topics and hints with
    /// medium priority.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let query_lower = query.to_lowercase();
        let mut analysis = QueryAnalysis::default();

        for rule in self.taxonomy.rules() {
            if rule.keywords.iter().any(|kw| query_lower.contains(kw.as_str())) {
                analysis.topics.insert(rule.topic.clone());
                for hint in &rule.chart_type_hints {
                    analysis.chart_type_hints.insert(hint.clone());
                }
            }
        }

        // Two or fewer matched topics stay at the medium default; a query
        // spanning more than two topics gets extra emphasis.
        analysis.priority = if analysis.topics.len() > 2 {
            QueryPriority::High
        } else {
            QueryPriority::Medium
        };

        debug!(
            topics = analysis.topics.len(),
            hints = analysis.chart_type_hints.len(),
            priority = ?analysis.priority,
            "Query analyzed"
        );

        analysis
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(Taxonomy::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TopicRule;

    #[test]
    fn career_query_hints_planets_houses_dasha() {
        let analyzer = QueryAnalyzer::default();
        let analysis = analyzer.analyze("What should I do about my career this year?");

        assert!(analysis.has_topic("career"));
        for hint in ["planets", "houses", "dasha"] {
            assert!(analysis.hints_include(hint), "missing hint {hint}");
        }
    }

    #[test]
    fn analyze_is_idempotent() {
        let analyzer = QueryAnalyzer::default();
        let q = "Will my career and marriage improve in the future?";
        assert_eq!(analyzer.analyze(q), analyzer.analyze(q));
    }

    #[test]
    fn unmatched_query_is_empty_and_medium() {
        let analyzer = QueryAnalyzer::default();
        let analysis = analyzer.analyze("tell me something interesting");
        assert!(analysis.topics.is_empty());
        assert!(analysis.chart_type_hints.is_empty());
        assert_eq!(analysis.priority, QueryPriority::Medium);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let analyzer = QueryAnalyzer::default();
        let analysis = analyzer.analyze("CAREER advice PLEASE");
        assert!(analysis.has_topic("career"));
    }

    #[test]
    fn one_or_two_topics_stay_medium() {
        let analyzer = QueryAnalyzer::default();

        let one = analyzer.analyze("my career");
        assert_eq!(one.topics.len(), 1);
        assert_eq!(one.priority, QueryPriority::Medium);

        let two = analyzer.analyze("career and marriage");
        assert_eq!(two.topics.len(), 2);
        assert_eq!(two.priority, QueryPriority::Medium);
    }

    #[test]
    fn more_than_two_topics_is_high() {
        let analyzer = QueryAnalyzer::default();
        let analysis = analyzer.analyze("my career, my marriage, and my health in the future");
        assert!(analysis.topics.len() > 2);
        assert_eq!(analysis.priority, QueryPriority::High);
    }

    #[test]
    fn alternate_taxonomy_is_injectable() {
        let taxonomy = Taxonomy::new(vec![TopicRule {
            topic: "travel".into(),
            keywords: vec!["journey".into()],
            chart_type_hints: vec!["transits".into()],
        }]);
        let analyzer = QueryAnalyzer::new(taxonomy);

        let analysis = analyzer.analyze("is this a good time for a journey?");
        assert!(analysis.has_topic("travel"));
        assert!(analysis.hints_include("transits"));
        assert!(!analyzer.analyze("career").has_topic("career"));
    }
}
