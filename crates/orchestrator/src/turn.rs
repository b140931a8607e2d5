//! The turn lifecycle: one user question in, one outcome out.
//!
//! A turn drives the model through the two-step tool protocol (select,
//! then retrieve), feeds it the ranked context, and collects the final
//! text answer. Turns within one conversation are serialized; tool-call
//! state never interleaves across concurrent messages in a session.

use crate::state::TurnState;
use crate::tools::{self, ChartToolCall};
use nakshatra_core::{
    ContextBundle, Conversation, ConversationId, Error, Message, Provider, ProviderRequest,
    RetrievalOutcome, Role, ToolError,
};
use nakshatra_retrieval::RetrievalPipeline;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Queries are bounded free text; anything longer is truncated, not
/// rejected.
const MAX_QUERY_CHARS: usize = 500;

const NEEDS_BASELINE_GUIDANCE: &str = "I don't have your birth details on file yet, so I can't \
     read your charts. Please share your birth date, time, and place and I'll prepare them.";

const NO_DATA_GUIDANCE: &str = "I couldn't find chart data matching your question. Try asking \
     in a different way, or complete your profile so more of your charts can be computed.";

const FALLBACK_ANSWER: &str = "I wasn't able to consult your charts for this question. Could \
     you rephrase it, or ask about a specific area like career, relationships, or health?";

/// How a turn ended, from the user's point of view.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// A normal answer, with the context bundle that informed it (if any).
    Answer {
        text: String,
        bundle: Option<ContextBundle>,
    },
    /// Retrieval came up empty everywhere.
    NoData { guidance: String },
    /// The user has no charts at all.
    NeedsBaselineData { guidance: String },
}

impl TurnOutcome {
    /// The text shown to the user regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            Self::Answer { text, .. } => text,
            Self::NoData { guidance } | Self::NeedsBaselineData { guidance } => guidance,
        }
    }
}

/// Drives the tool-calling protocol for one conversation turn.
pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    pipeline: Arc<RetrievalPipeline>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum model round-trips per turn
    max_iterations: u32,

    /// Per-conversation locks serializing turns within a session
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        pipeline: Arc<RetrievalPipeline>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            pipeline,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 6,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run one turn: append the question, drive the protocol, return the
    /// outcome. The final assistant message is pushed onto `conversation`.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        owner_id: &str,
        question: &str,
    ) -> Result<TurnOutcome, Error> {
        let lock = self.conversation_lock(&conversation.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_turn_locked(conversation, owner_id, question).await
        };
        drop(lock);
        self.release_conversation_lock(&conversation.id).await;
        result
    }

    async fn run_turn_locked(
        &self,
        conversation: &mut Conversation,
        owner_id: &str,
        question: &str,
    ) -> Result<TurnOutcome, Error> {
        let question: String = question.trim().chars().take(MAX_QUERY_CHARS).collect();
        let question = question.as_str();

        info!(
            conversation_id = %conversation.id,
            owner_id,
            "Turn started"
        );

        let mut state = TurnState::Init;
        conversation.push(Message::user(question));

        // An empty corpus short-circuits the whole protocol: there is
        // nothing to select or retrieve until baseline charts exist. A
        // failed probe is not the same thing; the retrieval chain gets its
        // own chance at the backends.
        let available: Vec<String> = match self.pipeline.corpus(owner_id).await {
            Some(corpus) if corpus.is_empty() => {
                state = state.transition(TurnState::NeedsBaselineData)?;
                debug!(conversation_id = %conversation.id, %state, "Turn finished");
                conversation.push(Message::assistant(NEEDS_BASELINE_GUIDANCE));
                return Ok(TurnOutcome::NeedsBaselineData {
                    guidance: NEEDS_BASELINE_GUIDANCE.into(),
                });
            }
            Some(corpus) => corpus.chart_types().map(str::to_string).collect(),
            None => Vec::new(),
        };

        self.ensure_system_prompt(conversation, &available);

        let tool_definitions = tools::definitions(&available);
        let mut selected: Vec<String> = Vec::new();
        let mut bundle: Option<ContextBundle> = None;
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(
                    conversation_id = %conversation.id,
                    iterations = iteration,
                    "Max iterations reached, answering without charts"
                );
                conversation.push(Message::assistant(FALLBACK_ANSWER));
                return Ok(TurnOutcome::Answer {
                    text: FALLBACK_ANSWER.into(),
                    bundle,
                });
            }

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                state = state.transition(TurnState::Done)?;
                info!(conversation_id = %conversation.id, %state, "Turn finished");
                return Ok(TurnOutcome::Answer { text, bundle });
            }

            // The protocol is one tool call per step; extras are ignored.
            let call = response.message.tool_calls[0].clone();
            if response.message.tool_calls.len() > 1 {
                debug!(
                    extra = response.message.tool_calls.len() - 1,
                    "Ignoring extra tool calls in one step"
                );
            }
            conversation.push(response.message);

            match ChartToolCall::parse(&call) {
                Ok(ChartToolCall::Select {
                    chart_types,
                    reasoning,
                }) => {
                    match state.transition(TurnState::Selecting) {
                        Ok(next) => state = next,
                        Err(err) => {
                            debug!(%err, "Selection refused");
                            conversation.push(Message::tool_result(
                                &call.id,
                                "Charts were already selected for this turn. Call get_charts \
                                 or answer directly.",
                            ));
                            continue;
                        }
                    }

                    selected = if available.is_empty() {
                        chart_types
                    } else {
                        tools::recognized_types(&chart_types, &available)
                    };
                    debug!(
                        conversation_id = %conversation.id,
                        selected = ?selected,
                        %reasoning,
                        "Charts selected"
                    );
                    conversation.push(Message::tool_result(
                        &call.id,
                        json!({ "accepted_chart_types": selected }).to_string(),
                    ));
                }

                Ok(ChartToolCall::Get {
                    chart_types,
                    search_query,
                    max_results,
                }) => {
                    match state.transition(TurnState::Retrieving) {
                        Ok(next) => {
                            if state == TurnState::Init {
                                debug!("Retrieval without prior selection");
                            }
                            state = next;
                        }
                        Err(err) => {
                            debug!(%err, "Retrieval refused");
                            conversation.push(Message::tool_result(
                                &call.id,
                                "Chart data was already retrieved for this turn. Answer with \
                                 the context you have.",
                            ));
                            continue;
                        }
                    }

                    let requested_any = !chart_types.is_empty();
                    let mut types = if available.is_empty() {
                        chart_types
                    } else {
                        tools::recognized_types(&chart_types, &available)
                    };
                    if types.is_empty() {
                        types = selected.clone();
                    }
                    // Every requested type was unknown and nothing was
                    // selected earlier: answer with guidance instead of
                    // retrieving blind.
                    if types.is_empty() && requested_any && !available.is_empty() {
                        warn!(
                            conversation_id = %conversation.id,
                            "No recognized chart types in retrieval request"
                        );
                        state = state.transition(TurnState::Done)?;
                        conversation.push(Message::assistant(FALLBACK_ANSWER));
                        return Ok(TurnOutcome::Answer {
                            text: FALLBACK_ANSWER.into(),
                            bundle,
                        });
                    }
                    let query = if search_query.trim().is_empty() {
                        question
                    } else {
                        search_query.as_str()
                    };

                    match self.pipeline.retrieve(owner_id, query, &types, max_results).await {
                        RetrievalOutcome::Bundle(b) => {
                            conversation
                                .push(Message::tool_result(&call.id, render_bundle(&b)));
                            bundle = Some(b);
                            state = state.transition(TurnState::Answering)?;
                        }
                        RetrievalOutcome::NoData => {
                            state = state.transition(TurnState::NoData)?;
                            info!(conversation_id = %conversation.id, %state, "Turn finished");
                            conversation.push(Message::assistant(NO_DATA_GUIDANCE));
                            return Ok(TurnOutcome::NoData {
                                guidance: NO_DATA_GUIDANCE.into(),
                            });
                        }
                    }
                }

                Err(ToolError::UnknownTool(name)) => {
                    warn!(tool = %name, "Model called an unknown tool, degrading");
                    state = state.transition(TurnState::Done)?;
                    conversation.push(Message::assistant(FALLBACK_ANSWER));
                    return Ok(TurnOutcome::Answer {
                        text: FALLBACK_ANSWER.into(),
                        bundle,
                    });
                }

                Err(ToolError::InvalidArguments(detail)) => {
                    debug!(tool = %call.name, %detail, "Invalid tool arguments");
                    conversation.push(Message::tool_result(
                        &call.id,
                        format!("Invalid arguments: {detail}. Check the tool schema and retry."),
                    ));
                }
            }
        }
    }

    fn ensure_system_prompt(&self, conversation: &mut Conversation, available: &[String]) {
        let prompt = system_prompt(available);
        match conversation.messages.first() {
            Some(m) if m.role == Role::System => {
                conversation.messages[0] = Message::system(prompt);
            }
            _ => conversation.messages.insert(0, Message::system(prompt)),
        }
    }

    async fn conversation_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.clone()).or_default().clone()
    }

    /// Drop a conversation's lock entry once the last user is gone.
    ///
    /// A waiting turn holds its own clone of the `Arc`, so a strong count
    /// of 1 means the map's reference is the only one left and the entry
    /// can go. A later turn for the same conversation simply re-inserts.
    async fn release_conversation_lock(&self, id: &ConversationId) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(id);
            }
        }
    }

    /// Number of conversations currently holding a serialization lock
    /// entry. Exposed for monitoring; steady-state idle value is zero.
    pub async fn tracked_conversations(&self) -> usize {
        self.locks.lock().await.len()
    }
}

fn system_prompt(available: &[String]) -> String {
    let types = if available.is_empty() {
        "unknown (the chart store could not be reached)".to_string()
    } else {
        available.join(", ")
    };
    format!(
        "You are a Vedic astrology assistant. Answer from the user's actual chart data, \
         never from generalities.\n\n\
         Available chart types for this user: {types}.\n\n\
         For chart questions: first call select_relevant_charts with the chart types you \
         need and your reasoning, then call get_charts to retrieve them, then answer from \
         the returned data. For greetings or questions that need no charts, answer directly."
    )
}

/// Serialize a bundle into the tool-result payload the model reads.
fn render_bundle(bundle: &ContextBundle) -> String {
    let charts: Vec<_> = bundle
        .charts
        .iter()
        .map(|c| {
            json!({
                "chart_type": c.chart_type,
                "relevance": c.relevance,
                "data": c.documents.iter().map(|d| &d.payload).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "total_relevant_charts": bundle.total_relevant_charts,
        "charts": charts,
    })
    .to_string()
}
