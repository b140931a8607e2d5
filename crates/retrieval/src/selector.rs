//! Chart selector — scores a corpus against an analysis and produces the
//! ordered context bundle.

use crate::scoring::RelevanceScorer;
use nakshatra_core::{ContextBundle, Corpus, QueryAnalysis, ScoredChart};
use tracing::debug;

/// Scores every chart type in a corpus, drops the irrelevant ones, and
/// ranks the rest.
pub struct ChartSelector {
    scorer: RelevanceScorer,
    /// Optional hard cap on the number of chart types in a bundle.
    max_context_types: Option<usize>,
}

impl ChartSelector {
    pub fn new(scorer: RelevanceScorer) -> Self {
        Self {
            scorer,
            max_context_types: None,
        }
    }

    pub fn with_max_context_types(mut self, max: Option<usize>) -> Self {
        self.max_context_types = max;
        self
    }

    /// Build the context bundle for one corpus and analysis.
    ///
    /// Chart types at or below the relevance threshold are dropped. The
    /// survivors are sorted descending by `priority × relevance`; the sort
    /// is stable, so equal scores keep their corpus order. An empty corpus
    /// yields an empty bundle.
    pub fn select(&self, corpus: &Corpus, analysis: &QueryAnalysis) -> ContextBundle {
        let threshold = self.scorer.config().relevance_threshold;
        let mut charts: Vec<ScoredChart> = Vec::new();

        for (chart_type, documents) in corpus.iter() {
            if documents.is_empty() {
                continue;
            }
            let relevance = self.scorer.relevance(chart_type, analysis);
            if relevance <= threshold {
                continue;
            }
            charts.push(ScoredChart {
                chart_type: chart_type.to_string(),
                relevance,
                priority: self.scorer.priority(chart_type, analysis),
                documents: documents.to_vec(),
            });
        }

        charts.sort_by(|a, b| {
            b.rank_score()
                .partial_cmp(&a.rank_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(max) = self.max_context_types {
            charts.truncate(max);
        }

        let total_relevant_charts = charts.len();
        debug!(
            candidates = corpus.len(),
            selected = total_relevant_charts,
            "Charts selected"
        );

        ContextBundle {
            charts,
            query_analysis: analysis.clone(),
            total_relevant_charts,
        }
    }
}

impl Default for ChartSelector {
    fn default() -> Self {
        Self::new(RelevanceScorer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::QueryAnalyzer;
    use nakshatra_core::ChartDocument;
    use serde_json::json;

    fn corpus(types: &[&str]) -> Corpus {
        let mut corpus = Corpus::new();
        for t in types {
            corpus.push(ChartDocument::new(
                format!("u1_{t}_1700000000"),
                *t,
                "u1",
                json!({"chart": t}),
            ));
        }
        corpus
    }

    #[test]
    fn empty_corpus_yields_empty_bundle() {
        let selector = ChartSelector::default();
        let analysis = QueryAnalyzer::default().analyze("career advice");

        let bundle = selector.select(&Corpus::new(), &analysis);
        assert!(bundle.is_empty());
        assert_eq!(bundle.total_relevant_charts, 0);
    }

    #[test]
    fn irrelevant_types_are_excluded() {
        let selector = ChartSelector::default();
        let analysis = QueryAnalyzer::default().analyze("tell me about my personality");

        let corpus = corpus(&["basic", "dasha", "compatibility"]);
        let bundle = selector.select(&corpus, &analysis);

        // dasha and compatibility have no standing bonus and their topic
        // gates are closed, so only basic survives.
        assert!(bundle.get("basic").is_some());
        assert!(bundle.get("dasha").is_none());
        assert!(bundle.get("compatibility").is_none());
    }

    #[test]
    fn prediction_query_ranks_dasha_with_basic() {
        let selector = ChartSelector::default();
        let analysis = QueryAnalyzer::default()
            .analyze("What does my future hold for my career?");

        let corpus = corpus(&["basic", "planets", "houses", "dasha"]);
        let bundle = selector.select(&corpus, &analysis);

        let dasha = bundle.get("dasha").expect("dasha should survive");
        assert!(dasha.relevance > 0.3);
        assert!(bundle.get("basic").is_some());
        assert!(bundle.total_relevant_charts >= 2);
    }

    #[test]
    fn ordering_is_descending_by_rank_score() {
        let selector = ChartSelector::default();
        let analysis = QueryAnalyzer::default().analyze("future predictions please");

        let bundle = selector.select(&corpus(&["houses", "dasha", "basic", "planets"]), &analysis);
        let scores: Vec<f32> = bundle.charts.iter().map(ScoredChart::rank_score).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "not sorted: {scores:?}");
        }
    }

    #[test]
    fn equal_scores_keep_corpus_order() {
        let selector = ChartSelector::default();
        // No topics, no hints: planets and houses differ, but two copies of
        // the same standing bonus would tie. Use a corpus with two types
        // that score identically: neither hinted, both with no topic gate.
        let analysis = QueryAnalyzer::default().analyze("hmm");

        let mut corpus = Corpus::new();
        for t in ["planets", "houses"] {
            corpus.push(ChartDocument::new(
                format!("u1_{t}_1"),
                t,
                "u1",
                json!({}),
            ));
        }
        let bundle = selector.select(&corpus, &analysis);

        // planets (0.7) outranks houses (0.6); both clear the threshold.
        let types: Vec<_> = bundle.chart_types().collect();
        assert_eq!(types, vec!["planets", "houses"]);

        // Same query, same corpus: identical result.
        let again = selector.select(&corpus, &analysis);
        let types_again: Vec<_> = again.chart_types().collect();
        assert_eq!(types, types_again);
    }

    #[test]
    fn max_context_types_caps_the_bundle() {
        let selector = ChartSelector::default().with_max_context_types(Some(2));
        let analysis = QueryAnalyzer::default().analyze("my future career and health");

        let bundle = selector.select(
            &corpus(&["basic", "planets", "houses", "dasha", "ashtakvarga"]),
            &analysis,
        );
        assert_eq!(bundle.charts.len(), 2);
        assert_eq!(bundle.total_relevant_charts, 2);
    }
}
