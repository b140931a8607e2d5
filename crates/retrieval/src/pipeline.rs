//! The retrieval pipeline — a four-step fallback chain from cache hit to
//! honest no-data.
//!
//! 1. Response cache (5-minute TTL keyed by owner, normalized query, and
//!    retrieval flags)
//! 2. Vector search, restricted to the owner's namespace
//! 3. Full corpus fetch from the primary store (itself behind a 10-minute
//!    corpus cache)
//! 4. `NoData`
//!
//! Transport failures at steps 2 and 3 are logged and fall through to the
//! next step; the chain itself never fails.

use crate::analyzer::QueryAnalyzer;
use crate::cache::{corpus_cache_key, response_cache_key, CacheStats, TtlCache};
use crate::selector::ChartSelector;
use nakshatra_core::{
    ChartDocument, ChartStore, ContextBundle, Corpus, RetrievalOutcome, VectorIndex,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Tunables for the retrieval chain.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Top-K for vector search when the caller sets no limit.
    pub search_top_k: usize,

    /// Deadline applied to each backend call (search and full fetch).
    pub fetch_timeout: Duration,

    /// TTL for assembled response bundles.
    pub response_ttl: Duration,

    /// TTL for raw per-owner corpora.
    pub corpus_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_top_k: 5,
            fetch_timeout: Duration::from_secs(10),
            response_ttl: Duration::from_secs(300),
            corpus_ttl: Duration::from_secs(600),
        }
    }
}

/// Owns the fallback chain and both caches.
pub struct RetrievalPipeline {
    store: Arc<dyn ChartStore>,
    index: Arc<dyn VectorIndex>,
    analyzer: QueryAnalyzer,
    selector: ChartSelector,
    response_cache: TtlCache<ContextBundle>,
    corpus_cache: TtlCache<Corpus>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<dyn ChartStore>,
        index: Arc<dyn VectorIndex>,
        analyzer: QueryAnalyzer,
        selector: ChartSelector,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            index,
            analyzer,
            selector,
            response_cache: TtlCache::new(config.response_ttl),
            corpus_cache: TtlCache::new(config.corpus_ttl),
            config,
        }
    }

    /// Run the chain for one query.
    ///
    /// `selected_types` narrows step 3 to a prior selection; if narrowing
    /// would discard everything the full corpus is used instead.
    /// `max_results` overrides the configured search top-K.
    pub async fn retrieve(
        &self,
        owner_id: &str,
        query: &str,
        selected_types: &[String],
        max_results: Option<usize>,
    ) -> RetrievalOutcome {
        let analysis = self.analyzer.analyze(query);
        let key = self.cache_key(owner_id, query, selected_types, max_results);

        // Step 1: response cache.
        if let Some(bundle) = self.response_cache.get(&key).await {
            debug!(owner_id, "Response cache hit");
            return RetrievalOutcome::Bundle(bundle);
        }

        // Step 2: vector search.
        let k = max_results.unwrap_or(self.config.search_top_k);
        match timeout(
            self.config.fetch_timeout,
            self.index.search(query, owner_id, k),
        )
        .await
        {
            Ok(Ok(hits)) if !hits.is_empty() => {
                let mut corpus = Corpus::new();
                for hit in hits {
                    corpus.push(ChartDocument::new(
                        format!("{owner_id}_{}_indexed", hit.chart_type),
                        hit.chart_type.clone(),
                        owner_id,
                        json!({ "content": hit.content, "score": hit.score }),
                    ));
                }
                // A prior selection narrows the search results; an empty
                // restriction falls through to the full fetch below.
                if !selected_types.is_empty() {
                    corpus = corpus.restrict_to(selected_types);
                }
                let bundle = self.selector.select(&corpus, &analysis);
                if !bundle.is_empty() {
                    info!(
                        owner_id,
                        charts = bundle.total_relevant_charts,
                        index = self.index.name(),
                        "Context from vector search"
                    );
                    self.response_cache.put(key, bundle.clone()).await;
                    return RetrievalOutcome::Bundle(bundle);
                }
            }
            Ok(Ok(_)) => debug!(owner_id, "Vector search returned no hits"),
            Ok(Err(err)) => warn!(owner_id, %err, "Vector search failed, falling through"),
            Err(_) => warn!(owner_id, "Vector search timed out, falling through"),
        }

        // Step 3: full corpus fetch.
        match self.corpus(owner_id).await {
            Some(full) if !full.is_empty() => {
                let corpus = if selected_types.is_empty() {
                    full
                } else {
                    let restricted = full.restrict_to(selected_types);
                    if restricted.is_empty() { full } else { restricted }
                };
                let bundle = self.selector.select(&corpus, &analysis);
                if !bundle.is_empty() {
                    info!(
                        owner_id,
                        charts = bundle.total_relevant_charts,
                        store = self.store.name(),
                        "Context from full corpus"
                    );
                    self.response_cache.put(key, bundle.clone()).await;
                    return RetrievalOutcome::Bundle(bundle);
                }
            }
            _ => {}
        }

        // Step 4: nothing usable anywhere.
        info!(owner_id, "Retrieval chain exhausted");
        RetrievalOutcome::NoData
    }

    /// The owner's raw corpus, served from the 10-minute cache when fresh.
    ///
    /// `None` means the fetch failed or timed out, not that the owner has
    /// no charts; an owner without charts yields `Some` empty corpus.
    pub async fn corpus(&self, owner_id: &str) -> Option<Corpus> {
        let key = corpus_cache_key(owner_id);
        if let Some(corpus) = self.corpus_cache.get(&key).await {
            debug!(owner_id, "Corpus cache hit");
            return Some(corpus);
        }

        match timeout(self.config.fetch_timeout, self.store.get_charts(owner_id)).await {
            Ok(Ok(corpus)) => {
                self.corpus_cache.put(key, corpus.clone()).await;
                Some(corpus)
            }
            Ok(Err(err)) => {
                warn!(owner_id, %err, store = self.store.name(), "Corpus fetch failed");
                None
            }
            Err(_) => {
                warn!(owner_id, store = self.store.name(), "Corpus fetch timed out");
                None
            }
        }
    }

    pub async fn response_cache_stats(&self) -> CacheStats {
        self.response_cache.stats().await
    }

    pub async fn corpus_cache_stats(&self) -> CacheStats {
        self.corpus_cache.stats().await
    }

    /// Evict expired entries from both caches.
    pub async fn sweep_caches(&self) -> usize {
        self.response_cache.sweep().await + self.corpus_cache.sweep().await
    }

    fn cache_key(
        &self,
        owner_id: &str,
        query: &str,
        selected_types: &[String],
        max_results: Option<usize>,
    ) -> String {
        let mut flags: Vec<String> = selected_types.to_vec();
        flags.sort();
        if let Some(k) = max_results {
            flags.push(format!("k:{k}"));
        }
        let flag_refs: Vec<&str> = flags.iter().map(String::as_str).collect();
        response_cache_key(owner_id, query, &flag_refs)
    }
}
