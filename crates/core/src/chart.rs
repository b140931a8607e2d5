//! Chart documents and the per-user corpus.
//!
//! A chart document is one computed astrological artifact (planetary
//! positions, house placements, a dasha timeline, a compatibility report)
//! for a person. Documents are append-only: a recomputation stores a new
//! version rather than mutating the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single computed chart document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDocument {
    /// Document ID. The primary store formats these as
    /// `{owner}_{chart_type}_{timestamp}`.
    pub id: String,

    /// The chart type identifier (e.g. "basic", "planets", "dasha").
    /// Never empty — see [`ChartDocument::new`].
    pub chart_type: String,

    /// Who this chart belongs to.
    pub owner_id: String,

    /// The raw structured payload from the astrology computation API.
    pub payload: serde_json::Value,

    /// When the computation finished.
    pub created_at: DateTime<Utc>,
}

impl ChartDocument {
    /// Create a document, normalizing the chart type.
    ///
    /// Older documents in the store may lack an explicit chart type; in
    /// that case it is recovered from the document ID, falling back to
    /// `"unknown"` so the non-empty invariant always holds.
    pub fn new(
        id: impl Into<String>,
        chart_type: impl Into<String>,
        owner_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let id = id.into();
        let mut chart_type = chart_type.into();
        if chart_type.is_empty() {
            chart_type = chart_type_from_id(&id)
                .unwrap_or("unknown")
                .to_string();
        }
        Self {
            id,
            chart_type,
            owner_id: owner_id.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Recover a chart type from a `{owner}_{chart_type}_{timestamp}` document ID.
pub fn chart_type_from_id(id: &str) -> Option<&str> {
    let mut parts = id.split('_');
    parts.next()?;
    parts.next().filter(|p| !p.is_empty())
}

/// A user's chart corpus: an insertion-ordered mapping from chart type to
/// a non-empty sequence of documents.
///
/// Insertion order matters — the selector uses it as the deterministic
/// tie-break when two chart types score identically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    entries: Vec<(String, Vec<ChartDocument>)>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to its chart type's bucket, creating the bucket
    /// at the end of the ordering if this type is new.
    pub fn push(&mut self, doc: ChartDocument) {
        match self.entries.iter_mut().find(|(t, _)| *t == doc.chart_type) {
            Some((_, docs)) => docs.push(doc),
            None => self.entries.push((doc.chart_type.clone(), vec![doc])),
        }
    }

    /// Documents for one chart type, if present.
    pub fn get(&self, chart_type: &str) -> Option<&[ChartDocument]> {
        self.entries
            .iter()
            .find(|(t, _)| t == chart_type)
            .map(|(_, docs)| docs.as_slice())
    }

    /// Chart types in insertion order.
    pub fn chart_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    /// Iterate `(chart_type, documents)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChartDocument])> {
        self.entries
            .iter()
            .map(|(t, docs)| (t.as_str(), docs.as_slice()))
    }

    /// Number of chart types present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A new corpus containing only the named chart types, preserving the
    /// original ordering. Types not present in the corpus are ignored.
    pub fn restrict_to(&self, chart_types: &[String]) -> Corpus {
        Corpus {
            entries: self
                .entries
                .iter()
                .filter(|(t, _)| chart_types.iter().any(|c| c == t))
                .cloned()
                .collect(),
        }
    }
}
