use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::engine::{TurnEngine, TurnOutcome};
use super::errors::TurnError;
use crate::domain::types::ChatMessage;
use crate::infrastructure::generation::service::GenerationService;
use crate::infrastructure::generation::traits::TextGenerator;
use crate::infrastructure::generation::types::{GenerationError, ProgressSink};
use crate::infrastructure::tooling::{ToolTransport, TransportError};

#[derive(Clone)]
struct ScriptedGenerator {
    responses: Arc<Mutex<Vec<Result<String, String>>>>,
    recordings: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses
                    .into_iter()
                    .map(|entry| entry.map(String::from).map_err(String::from))
                    .collect(),
            )),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn scripted(response: &str) -> Self {
        Self::new(vec![Ok(response)])
    }

    async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        _progress: Option<ProgressSink>,
    ) -> Result<String, GenerationError> {
        self.recordings.lock().await.push(messages.to_vec());
        let mut responses = self.responses.lock().await;
        responses
            .remove(0)
            .map_err(|reason| GenerationError::invalid_response("scripted", reason))
    }
}

struct StubTransport {
    listing: Result<Value, ()>,
    call_result: Result<Value, ()>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubTransport {
    fn new(listing: Value, call_result: Value) -> Self {
        Self {
            listing: Ok(listing),
            call_result: Ok(call_result),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn without_listing() -> Self {
        Self {
            listing: Err(()),
            call_result: Ok(Value::Null),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing_dispatch(listing: Value) -> Self {
        Self {
            listing: Ok(listing),
            call_result: Err(()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn recorded_calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolTransport for StubTransport {
    fn id(&self) -> &str {
        "stub"
    }

    async fn list_tools(&self) -> Result<Value, TransportError> {
        self.listing
            .clone()
            .map_err(|_| TransportError::transport("stub", "listing unavailable"))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .await
            .push((name.to_string(), arguments));
        self.call_result
            .clone()
            .map_err(|_| TransportError::transport("stub", "dispatch refused"))
    }
}

fn engine_with(generator: ScriptedGenerator, transport: Arc<StubTransport>) -> TurnEngine {
    TurnEngine::new(
        Arc::new(GenerationService::new(Arc::new(generator))),
        transport,
    )
}

fn sample_listing() -> Value {
    json!({"tools": [
        {"name": "adder", "description": "Add two numbers",
         "inputSchema": {"properties": {"a": {"type": "number"}, "b": {"type": "number"}}}}
    ]})
}

fn assert_two_decimals(rendered: &str) {
    let (_, fraction) = rendered
        .split_once('.')
        .unwrap_or_else(|| panic!("no decimal point in '{rendered}'"));
    assert_eq!(fraction.len(), 2, "expected two decimals in '{rendered}'");
}

fn assert_timing_shape(outcome: &TurnOutcome) {
    assert_two_decimals(&outcome.model_select_seconds);
    assert_two_decimals(&outcome.total_seconds);
    if let Some(tool_seconds) = &outcome.tool_call_seconds {
        assert_two_decimals(tool_seconds);
    }
}

#[tokio::test]
async fn conversational_turn_with_empty_catalog() {
    let generator = ScriptedGenerator::scripted("assistant Hello there!");
    let transport = Arc::new(StubTransport::new(json!({"tools": []}), Value::Null));
    let engine = engine_with(generator.clone(), transport.clone());

    let outcome = engine
        .process_turn("hello", None)
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.response_text, "Hello there!");
    assert!(outcome.tool_call_seconds.is_none());
    assert_eq!(outcome.model_select_seconds, outcome.total_seconds);
    assert_timing_shape(&outcome);

    // The compiled prompt carried zero tool blocks and the user text.
    let requests = generator.requests().await;
    assert_eq!(requests.len(), 1);
    let messages = &requests[0];
    assert_eq!(messages.len(), 2);
    assert!(!messages[0].content.contains("**Tool Name: "));
    assert_eq!(messages[1].content, "hello");

    assert!(transport.recorded_calls().await.is_empty());
}

#[tokio::test]
async fn tool_turn_dispatches_and_formats_response() {
    let generator =
        ScriptedGenerator::scripted(r#"{"tool_name":"adder","tool_arguments":{"a":3,"b":4}}"#);
    let transport = Arc::new(StubTransport::new(
        sample_listing(),
        json!({"result": "7"}),
    ));
    let engine = engine_with(generator, transport.clone());

    let outcome = engine
        .process_turn("add 3 and 4", None)
        .await
        .expect("turn succeeds");

    assert_eq!(outcome.response_text, "Response from 'adder':\n7");
    assert!(outcome.tool_call_seconds.is_some());
    assert_timing_shape(&outcome);

    let calls = transport.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "adder");
    assert_eq!(calls[0].1, json!({"a": 3, "b": 4}));
}

#[tokio::test]
async fn catalog_failure_degrades_to_empty_catalog() {
    let generator = ScriptedGenerator::scripted("No tools needed here.");
    let transport = Arc::new(StubTransport::without_listing());
    let engine = engine_with(generator.clone(), transport);

    let outcome = engine
        .process_turn("hi", None)
        .await
        .expect("turn still succeeds");

    assert_eq!(outcome.response_text, "No tools needed here.");
    let requests = generator.requests().await;
    assert!(!requests[0][0].content.contains("**Tool Name: "));
}

#[tokio::test]
async fn tool_listing_reaches_the_prompt() {
    let generator = ScriptedGenerator::scripted("Just chatting.");
    let transport = Arc::new(StubTransport::new(sample_listing(), Value::Null));
    let engine = engine_with(generator.clone(), transport);

    engine.process_turn("hi", None).await.expect("turn succeeds");

    let requests = generator.requests().await;
    let system = &requests[0][0].content;
    assert!(system.contains("1.  **Tool Name: adder**"));
    assert!(system.contains("* a (number): "));
}

#[tokio::test]
async fn generation_failure_is_fatal_to_the_turn() {
    let generator = ScriptedGenerator::new(vec![Err("backend down")]);
    let transport = Arc::new(StubTransport::new(json!({"tools": []}), Value::Null));
    let engine = engine_with(generator, transport);

    let error = engine
        .process_turn("hi", None)
        .await
        .expect_err("turn fails");
    assert!(matches!(error, TurnError::Generation { .. }));
}

#[tokio::test]
async fn dispatch_failure_is_fatal_not_conversational() {
    let generator =
        ScriptedGenerator::scripted(r#"{"tool_name":"adder","tool_arguments":{"a":1,"b":2}}"#);
    let transport = Arc::new(StubTransport::failing_dispatch(sample_listing()));
    let engine = engine_with(generator, transport);

    let error = engine
        .process_turn("add", None)
        .await
        .expect_err("turn fails");
    match error {
        TurnError::ToolDispatch { tool, .. } => assert_eq!(tool, "adder"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_tool_name_is_dispatched_anyway() {
    // The engine does not pre-validate the name against the catalog; the
    // transport owns the authoritative tool set.
    let generator = ScriptedGenerator::scripted(r#"{"tool_name":"invented"}"#);
    let transport = Arc::new(StubTransport::new(
        sample_listing(),
        json!({"result": "surprising but fine"}),
    ));
    let engine = engine_with(generator, transport.clone());

    let outcome = engine.process_turn("go", None).await.expect("turn succeeds");
    assert_eq!(
        outcome.response_text,
        "Response from 'invented':\nsurprising but fine"
    );

    let calls = transport.recorded_calls().await;
    assert_eq!(calls[0].0, "invented");
    // Missing tool_arguments became an empty object.
    assert_eq!(calls[0].1, json!({}));
}

#[tokio::test]
async fn fenced_tool_call_round_trips_through_the_engine() {
    let generator = ScriptedGenerator::scripted(
        "```json\n{\"tool_name\":\"adder\",\"tool_arguments\":{\"a\":1,\"b\":1}}\n```",
    );
    let transport = Arc::new(StubTransport::new(
        sample_listing(),
        json!({"structuredContent": {"result": 2}}),
    ));
    let engine = engine_with(generator, transport);

    let outcome = engine.process_turn("add", None).await.expect("turn succeeds");
    assert_eq!(outcome.response_text, "Response from 'adder':\n2");
}

#[tokio::test]
async fn outcome_serializes_without_absent_tool_seconds() {
    let generator = ScriptedGenerator::scripted("prose");
    let transport = Arc::new(StubTransport::new(json!({"tools": []}), Value::Null));
    let engine = engine_with(generator, transport);

    let outcome = engine.process_turn("hi", None).await.expect("turn succeeds");
    let rendered = serde_json::to_value(&outcome).expect("serialize outcome");
    assert!(rendered.get("tool_call_seconds").is_none());
    assert_eq!(rendered["response_text"], json!("prose"));
}
