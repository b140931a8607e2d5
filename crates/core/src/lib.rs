//! Core domain types and traits for Nakshatra.
//!
//! Nakshatra is the retrieval-context core of a conversational astrology
//! assistant. A user's question flows through the system like this:
//!
//! 1. **Analyze** the question against a topic taxonomy
//! 2. **Score** every chart type in the user's corpus for relevance
//! 3. **Select** and rank the charts that clear the threshold
//! 4. **Retrieve** through a cache → vector index → primary store chain
//! 5. **Orchestrate** a two-step tool-calling protocol with the LLM
//!
//! This crate holds the value objects exchanged between those stages and
//! the trait seams for the external collaborators: the chart document
//! store, the vector index, and the language model provider.

pub mod analysis;
pub mod bundle;
pub mod chart;
pub mod error;
pub mod index;
pub mod message;
pub mod provider;
pub mod store;

pub use analysis::{QueryAnalysis, QueryPriority};
pub use bundle::{ContextBundle, RetrievalOutcome, ScoredChart};
pub use chart::{ChartDocument, Corpus};
pub use error::{Error, IndexError, ProviderError, Result, StoreError, ToolError};
pub use index::{IndexHit, VectorIndex};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use store::ChartStore;
