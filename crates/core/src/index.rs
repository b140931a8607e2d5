//! VectorIndex trait — the seam to the semantic search service.
//!
//! Embedding and nearest-neighbor search live entirely behind this trait;
//! the retrieval pipeline only sees ranked hits.

use crate::error::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked hit from a semantic search, scoped to a single owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    /// Which chart type the indexed content came from.
    pub chart_type: String,

    /// The text content that was indexed for this chart.
    pub content: String,

    /// Similarity score, higher is closer.
    pub score: f32,
}

/// Nearest-neighbor search over a user's indexed chart content.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The index name (e.g. "pinecone", "in_memory").
    fn name(&self) -> &str;

    /// Top-`k` hits for `text` within `owner_id`'s namespace, ranked by
    /// similarity descending. No matches yields an empty Vec.
    async fn search(
        &self,
        text: &str,
        owner_id: &str,
        k: usize,
    ) -> std::result::Result<Vec<IndexHit>, IndexError>;
}
