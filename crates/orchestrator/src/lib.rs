//! Turn orchestration for the chart-aware assistant.
//!
//! One turn is one user question driven through a strictly forward state
//! machine: the model selects chart types, retrieves ranked context
//! through the fallback chain, and answers from it. Empty-corpus and
//! empty-retrieval cases end in guidance replies, never errors.

pub mod state;
pub mod tools;
pub mod turn;

pub use state::{TransitionError, TurnState};
pub use tools::{definitions, recognized_types, ChartToolCall, GET_CHARTS, SELECT_RELEVANT_CHARTS};
pub use turn::{TurnOrchestrator, TurnOutcome};
