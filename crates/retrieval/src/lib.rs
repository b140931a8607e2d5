//! The retrieval decision core — from free-text question to ranked
//! context bundle.
//!
//! Stages, leaves first:
//!
//! 1. [`Taxonomy`] — keyword sets → topic labels and chart-type hints
//! 2. [`QueryAnalyzer`] — query text → [`nakshatra_core::QueryAnalysis`]
//! 3. [`RelevanceScorer`] — one chart type vs. an analysis → `[0,1]`
//! 4. [`ChartSelector`] — whole corpus → ordered
//!    [`nakshatra_core::ContextBundle`]
//! 5. [`TtlCache`] — shared response/corpus caches with lazy expiration
//! 6. [`RetrievalPipeline`] — cache → vector search → full fetch →
//!    `NoData` fallback chain
//!
//! The analyzer, scorer, and selector are pure and stateless; only the
//! caches hold shared mutable state.

pub mod analyzer;
pub mod cache;
pub mod pipeline;
pub mod scoring;
pub mod selector;
pub mod taxonomy;

pub use analyzer::QueryAnalyzer;
pub use cache::{corpus_cache_key, response_cache_key, CacheStats, TtlCache};
pub use pipeline::{PipelineConfig, RetrievalPipeline};
pub use scoring::{RelevanceScorer, ScoringConfig, TypeBonus};
pub use selector::ChartSelector;
pub use taxonomy::{Taxonomy, TopicRule};
