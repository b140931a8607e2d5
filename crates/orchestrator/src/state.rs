//! The turn state machine.
//!
//! A turn only ever moves forward. Stages may be skipped (a model that
//! answers without tools jumps straight to `Done`; an early `get_charts`
//! skips `Selecting`) but never revisited, which is what makes a turn's
//! tool protocol idempotent to replay and safe to log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a turn currently is in the tool-calling protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Turn started, no tool call seen yet.
    Init,
    /// The model has selected chart types.
    Selecting,
    /// Context is being retrieved.
    Retrieving,
    /// Context delivered; the model is composing the answer.
    Answering,
    /// Final answer produced.
    Done,
    /// Retrieval came up empty; the user gets a rephrase/complete-profile
    /// reply.
    NoData,
    /// The user has no charts at all; the reply asks for birth details.
    NeedsBaselineData,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::NoData | Self::NeedsBaselineData)
    }

    /// Whether `self → next` is a legal forward move.
    pub fn can_transition(self, next: TurnState) -> bool {
        use TurnState::*;
        match (self, next) {
            // Selecting is optional; an early get_charts degrades rather
            // than failing the turn.
            (Init, Selecting) | (Init, Retrieving) => true,
            (Selecting, Retrieving) => true,
            (Retrieving, Answering) => true,
            // A plain text answer finishes the turn from any live state.
            (s, Done) if !s.is_terminal() => true,
            // Empty-retrieval and empty-corpus outcomes.
            (s, NoData) if !s.is_terminal() => true,
            (Init, NeedsBaselineData) => true,
            _ => false,
        }
    }

    /// Attempt a transition, consuming the old state.
    pub fn transition(self, next: TurnState) -> Result<TurnState, TransitionError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Selecting => "selecting",
            Self::Retrieving => "retrieving",
            Self::Answering => "answering",
            Self::Done => "done",
            Self::NoData => "no_data",
            Self::NeedsBaselineData => "needs_baseline_data",
        };
        f.write_str(s)
    }
}

/// An illegal state machine move.
#[derive(Debug, Clone, Error)]
#[error("illegal turn transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: TurnState,
    pub to: TurnState,
}

impl From<TransitionError> for nakshatra_core::Error {
    fn from(err: TransitionError) -> Self {
        nakshatra_core::Error::Internal(err.to_string())
    }
}
