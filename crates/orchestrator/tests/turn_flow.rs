//! End-to-end turn tests with scripted model responses.

use async_trait::async_trait;
use nakshatra_core::{
    ChartDocument, ChartStore, Conversation, Corpus, IndexError, IndexHit, Message,
    MessageToolCall, Provider, ProviderError, ProviderRequest, ProviderResponse, StoreError,
    VectorIndex,
};
use nakshatra_orchestrator::{TurnOrchestrator, TurnOutcome};
use nakshatra_retrieval::{ChartSelector, PipelineConfig, QueryAnalyzer, RetrievalPipeline};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Mocks ──

/// Replays a fixed script of model responses in order.
struct ScriptedProvider {
    script: Mutex<VecDeque<Message>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let message = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Malformed("script exhausted".into()))?;
        Ok(ProviderResponse {
            message,
            model: "scripted-model".into(),
            usage: None,
        })
    }
}

struct FixedStore {
    corpus: Corpus,
}

impl FixedStore {
    fn with_types(types: &[&str]) -> Arc<Self> {
        let mut corpus = Corpus::new();
        for t in types {
            corpus.push(ChartDocument::new(
                format!("u1_{t}_1700000000"),
                *t,
                "u1",
                json!({"chart": t, "detail": format!("{t} data")}),
            ));
        }
        Arc::new(Self { corpus })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            corpus: Corpus::new(),
        })
    }
}

#[async_trait]
impl ChartStore for FixedStore {
    fn name(&self) -> &str {
        "fixed_store"
    }

    async fn get_charts(&self, _owner_id: &str) -> Result<Corpus, StoreError> {
        Ok(self.corpus.clone())
    }
}

struct CountingIndex {
    hits: Vec<IndexHit>,
    searches: AtomicUsize,
}

impl CountingIndex {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            hits: Vec::new(),
            searches: AtomicUsize::new(0),
        })
    }

    fn with_hits(hits: Vec<IndexHit>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            searches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn name(&self) -> &str {
        "counting_index"
    }

    async fn search(
        &self,
        _text: &str,
        _owner_id: &str,
        k: usize,
    ) -> Result<Vec<IndexHit>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

// ── Script helpers ──

fn tool_call(name: &str, arguments: serde_json::Value) -> Message {
    let mut msg = Message::assistant("");
    msg.tool_calls = vec![MessageToolCall {
        id: "call_1".into(),
        name: name.into(),
        arguments: arguments.to_string(),
    }];
    msg
}

fn select_call(types: &[&str]) -> Message {
    tool_call(
        "select_relevant_charts",
        json!({ "chart_types": types, "reasoning": "these cover the question" }),
    )
}

fn get_call(types: &[&str], query: &str) -> Message {
    tool_call(
        "get_charts",
        json!({ "chart_types": types, "search_query": query }),
    )
}

fn orchestrator(
    store: Arc<FixedStore>,
    index: Arc<CountingIndex>,
    provider: Arc<ScriptedProvider>,
) -> TurnOrchestrator {
    let pipeline = Arc::new(RetrievalPipeline::new(
        store,
        index,
        QueryAnalyzer::default(),
        ChartSelector::default(),
        PipelineConfig::default(),
    ));
    TurnOrchestrator::new(provider, pipeline, "scripted-model")
}

// ── Scenarios ──

#[tokio::test]
async fn full_protocol_turn_answers_from_chart_data() {
    let store = FixedStore::with_types(&["basic", "planets", "houses", "dasha"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![
        select_call(&["basic", "dasha"]),
        get_call(&["basic", "dasha"], "career timing"),
        Message::assistant("Your Saturn dasha favors a deliberate career move."),
    ]);
    let orch = orchestrator(store, index, provider.clone());

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "What does my future hold for my career?")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::Answer { text, bundle } => {
            assert!(text.contains("Saturn"));
            let bundle = bundle.expect("context should have been retrieved");
            assert!(bundle.get("dasha").is_some());
            assert!(bundle.get("basic").is_some());
        }
        other => panic!("expected answer, got {other:?}"),
    }

    // Three model round-trips: select, get, answer.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

    // The transcript carries both tool results and the final answer.
    let tool_results = conv
        .messages
        .iter()
        .filter(|m| m.tool_call_id.is_some())
        .count();
    assert_eq!(tool_results, 2);
    assert!(conv.messages.last().unwrap().content.contains("Saturn"));
}

#[tokio::test]
async fn empty_corpus_requests_baseline_data_without_calling_the_model() {
    let store = FixedStore::empty();
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(store, index, provider.clone());

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "What is my dasha?")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::NeedsBaselineData { guidance } => {
            assert!(guidance.contains("birth"));
        }
        other => panic!("expected baseline-data outcome, got {other:?}"),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    // The transcript still records the question before the guidance.
    assert_eq!(conv.messages.len(), 2);
    assert_eq!(conv.messages[0].content, "What is my dasha?");
    assert!(conv.messages[1].content.contains("birth"));
}

#[tokio::test]
async fn conversation_locks_are_released_after_each_turn() {
    let store = FixedStore::with_types(&["basic"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![
        Message::assistant("First."),
        Message::assistant("Second."),
    ]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    orch.run_turn(&mut conv, "u1", "hi").await.unwrap();
    assert_eq!(orch.tracked_conversations().await, 0);

    // A second conversation doesn't accumulate either.
    let mut conv2 = Conversation::new();
    orch.run_turn(&mut conv2, "u2", "hello").await.unwrap();
    assert_eq!(orch.tracked_conversations().await, 0);
}

#[tokio::test]
async fn early_get_charts_degrades_instead_of_failing() {
    let store = FixedStore::with_types(&["basic", "planets"]);
    let index = CountingIndex::empty();
    // The model skips select_relevant_charts entirely.
    let provider = ScriptedProvider::new(vec![
        get_call(&["basic"], "personality traits"),
        Message::assistant("You have a steady, methodical temperament."),
    ]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "Describe my personality")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::Answer { bundle, .. } => {
            assert!(bundle.expect("retrieval still ran").get("basic").is_some());
        }
        other => panic!("expected answer, got {other:?}"),
    }
}

#[tokio::test]
async fn repeated_question_is_served_from_the_response_cache() {
    let store = FixedStore::with_types(&["basic"]);
    let index = CountingIndex::with_hits(vec![IndexHit {
        chart_type: "basic".into(),
        content: "basic chart summary".into(),
        score: 0.92,
    }]);
    let provider = ScriptedProvider::new(vec![
        get_call(&["basic"], "my personality"),
        Message::assistant("First answer."),
        get_call(&["basic"], "my personality"),
        Message::assistant("Second answer."),
    ]);
    let orch = orchestrator(store, index.clone(), provider);

    let mut conv = Conversation::new();
    orch.run_turn(&mut conv, "u1", "Describe my personality")
        .await
        .unwrap();
    assert_eq!(index.searches.load(Ordering::SeqCst), 1);

    let mut conv2 = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv2, "u1", "Describe my personality")
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Answer { .. }));

    // Same owner, same query, same flags: the cached bundle is reused.
    assert_eq!(index.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retrieval_ends_in_no_data_guidance() {
    // The corpus only holds a chart type nothing scores for this query.
    let store = FixedStore::with_types(&["kalsarpa"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![get_call(&["kalsarpa"], "hello there")]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "hello there")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::NoData { guidance } => assert!(guidance.contains("profile")),
        other => panic!("expected no-data outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_tool_call_degrades_to_a_fallback_answer() {
    let store = FixedStore::with_types(&["basic"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![tool_call(
        "analyze_current_transits",
        json!({ "planet": "saturn" }),
    )]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "What about Saturn?")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::Answer { text, bundle } => {
            assert!(bundle.is_none());
            assert!(!text.is_empty());
        }
        other => panic!("expected fallback answer, got {other:?}"),
    }
}

#[tokio::test]
async fn second_retrieval_in_one_turn_is_refused() {
    let store = FixedStore::with_types(&["basic", "planets"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![
        get_call(&["basic"], "personality"),
        // The model tries to retrieve again instead of answering.
        get_call(&["planets"], "personality"),
        Message::assistant("Answering from the context I already have."),
    ]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "Describe my personality")
        .await
        .unwrap();

    let TurnOutcome::Answer { bundle, .. } = outcome else {
        panic!("expected answer");
    };
    // Only the first retrieval produced context.
    assert!(bundle.expect("first retrieval").get("basic").is_some());

    // The refusal reached the model as a tool result.
    let refusal = conv
        .messages
        .iter()
        .any(|m| m.tool_call_id.is_some() && m.content.contains("already retrieved"));
    assert!(refusal);
}

#[tokio::test]
async fn plain_greeting_needs_no_tools() {
    let store = FixedStore::with_types(&["basic"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![Message::assistant(
        "Namaste! Ask me anything about your charts.",
    )]);
    let orch = orchestrator(store, index.clone(), provider);

    let mut conv = Conversation::new();
    let outcome = orch.run_turn(&mut conv, "u1", "hi!").await.unwrap();

    match outcome {
        TurnOutcome::Answer { text, bundle } => {
            assert!(text.contains("Namaste"));
            assert!(bundle.is_none());
        }
        other => panic!("expected answer, got {other:?}"),
    }
    assert_eq!(index.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_arguments_get_a_retry_hint() {
    let store = FixedStore::with_types(&["basic"]);
    let index = CountingIndex::empty();
    let provider = ScriptedProvider::new(vec![
        tool_call("get_charts", json!({ "chart_types": "not-an-array" })),
        Message::assistant("Let me just answer directly."),
    ]);
    let orch = orchestrator(store, index, provider);

    let mut conv = Conversation::new();
    let outcome = orch
        .run_turn(&mut conv, "u1", "Describe my personality")
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Answer { .. }));
    let hint = conv
        .messages
        .iter()
        .any(|m| m.tool_call_id.is_some() && m.content.contains("Invalid arguments"));
    assert!(hint);
}
