//! ChartStore trait — the seam to the primary document database.
//!
//! The store persists every computed chart document per user. This crate
//! never talks to a concrete database; the hosting application injects an
//! implementation (Firestore, SQL, in-memory for tests).

use crate::chart::Corpus;
use crate::error::StoreError;
use async_trait::async_trait;

/// Read access to a user's chart corpus.
#[async_trait]
pub trait ChartStore: Send + Sync {
    /// The backend name (e.g. "firestore", "in_memory").
    fn name(&self) -> &str;

    /// Fetch the owner's complete corpus, grouped by chart type in the
    /// store's document order. An owner with no charts yields an empty
    /// corpus, not an error.
    async fn get_charts(&self, owner_id: &str) -> std::result::Result<Corpus, StoreError>;
}
