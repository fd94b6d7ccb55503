//! Integration tests for the run engine
//!
//! Tests the complete step loop with scripted model clients and real tools.

use ace::engine::{
    AgentEvent, ApprovalGate, AutoApprovalGate, EngineConfig, RunEngine, RunErrorCode, RunHandle,
    RunInput, RunStatus,
};
use ace::provider::{
    ModelClient, ModelRequest, ModelResponse, ModelStream, StreamChunk, TokenUsage, ToolInvocation,
};
use ace::tool::{ToolDefinition, ToolDispatcher};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Scripted client that pops one response per call.
struct ScriptedClient {
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedClient {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ModelResponse::text("Done.", TokenUsage::new(1, 1)))
        } else {
            Ok(responses.remove(0))
        }
    }

    fn client_name(&self) -> &str {
        "scripted"
    }
}

// Client that stalls inside the model call before answering.
struct SleepingClient {
    delay: Duration,
    response: ModelResponse,
}

#[async_trait]
impl ModelClient for SleepingClient {
    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }

    fn client_name(&self) -> &str {
        "sleeping"
    }
}

fn tool_call_response(id: &str, tool: &str, args: serde_json::Value) -> ModelResponse {
    ModelResponse::with_tool_calls(
        "",
        vec![ToolInvocation::new(id, tool, args)],
        TokenUsage::new(2, 1),
    )
}

fn echo_dispatcher() -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(ToolDefinition::from_fn(
        "echo",
        "Echo the input back",
        json!({"type": "object", "properties": {"text": {"type": "string"}}}),
        |input, _context| Ok(input),
    ));
    dispatcher
}

async fn drain(handle: &mut RunHandle) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    events
}

fn kinds(events: &[AgentEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

#[tokio::test]
async fn test_tool_loop_feeds_results_back() -> Result<()> {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let recorded_in_tool = Arc::clone(&recorded);

    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(ToolDefinition::from_fn(
        "calc",
        "Evaluate an expression",
        json!({"type": "object", "properties": {"expr": {"type": "string"}}}),
        move |input, _context| {
            recorded_in_tool.lock().unwrap().push(input);
            Ok(json!({"value": 4}))
        },
    ));

    let client = Arc::new(ScriptedClient::new(vec![
        tool_call_response("call-1", "calc", json!({"expr": "2 + 2"})),
        ModelResponse::text("The answer is 4.", TokenUsage::new(3, 2)),
    ]));
    let requests = Arc::clone(&client.requests);

    let engine = RunEngine::new(
        client,
        Arc::new(dispatcher),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("What is 2 + 2?"));
    let events = drain(&mut handle).await;

    assert_eq!(
        kinds(&events),
        vec![
            "run:started",
            "step:started",
            "model:request",
            "model:response",
            "tool:started",
            "tool:completed",
            "step:completed",
            "step:started",
            "model:request",
            "model:response",
            "step:completed",
            "run:completed",
        ]
    );

    match events.last() {
        Some(AgentEvent::RunCompleted { result, .. }) => {
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(result.response, "The answer is 4.");
            assert_eq!(result.steps, 2);
            assert_eq!(result.usage.input, 5);
            assert_eq!(result.usage.output, 3);
        }
        other => panic!("expected run:completed, got {:?}", other),
    }

    // The tool saw the model's arguments.
    let tool_inputs = recorded.lock().unwrap();
    assert_eq!(tool_inputs.as_slice(), &[json!({"expr": "2 + 2"})]);

    // The second model call saw the tool result in history.
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().unwrap();
    assert!(last.content.contains("\"tool\":\"calc\""));
    assert!(last.content.contains("\"value\":4"));

    Ok(())
}

#[tokio::test]
async fn test_max_steps_exceeded() -> Result<()> {
    let client = Arc::new(ScriptedClient::new(vec![
        tool_call_response("call-1", "echo", json!({"text": "one"})),
        tool_call_response("call-2", "echo", json!({"text": "two"})),
    ]));

    let config = EngineConfig {
        max_steps: 2,
        ..EngineConfig::default()
    };
    let engine = RunEngine::new(
        client,
        Arc::new(echo_dispatcher()),
        Arc::new(AutoApprovalGate::approve_all()),
        config,
    );
    let mut handle = engine.spawn(RunInput::new("loop forever"));
    let events = drain(&mut handle).await;

    match events.last() {
        Some(AgentEvent::RunError { error, .. }) => {
            assert_eq!(error.code, RunErrorCode::MaxStepsExceeded);
            assert_eq!(error.message, "run exceeded maximum steps: 2");
        }
        other => panic!("expected run:error, got {:?}", other),
    }
    // Both steps ran before the budget tripped.
    assert_eq!(
        kinds(&events).iter().filter(|k| **k == "step:completed").count(),
        2
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_between_steps() -> Result<()> {
    // One slow model call eats the whole budget; the run must fail at the
    // next step boundary instead of starting step two.
    let client = Arc::new(SleepingClient {
        delay: Duration::from_secs(301),
        response: tool_call_response("call-1", "echo", json!({"text": "slow"})),
    });

    let engine = RunEngine::new(
        client,
        Arc::new(echo_dispatcher()),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("take your time"));
    let events = drain(&mut handle).await;

    match events.last() {
        Some(AgentEvent::RunError { error, .. }) => {
            assert_eq!(error.code, RunErrorCode::Timeout);
            assert!(error.message.contains("300"));
        }
        other => panic!("expected run:error, got {:?}", other),
    }
    assert_eq!(
        kinds(&events).iter().filter(|k| **k == "step:started").count(),
        1
    );

    Ok(())
}

#[tokio::test]
async fn test_denied_tool_keeps_run_alive() -> Result<()> {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(
        ToolDefinition::from_fn(
            "delete_everything",
            "Remove all records",
            json!({"type": "object"}),
            |_input, _context| Ok(json!({"deleted": true})),
        )
        .with_approval(true),
    );

    let client = Arc::new(ScriptedClient::new(vec![
        tool_call_response("call-1", "delete_everything", json!({})),
        ModelResponse::text("I was not allowed to do that.", TokenUsage::new(2, 2)),
    ]));
    let requests = Arc::clone(&client.requests);

    let engine = RunEngine::new(
        client,
        Arc::new(dispatcher),
        Arc::new(AutoApprovalGate::deny_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("clean up"));
    let events = drain(&mut handle).await;

    let kinds = kinds(&events);
    assert!(kinds.contains(&"tool:approval:required"));
    assert!(kinds.contains(&"tool:approval:denied"));
    assert!(kinds.contains(&"tool:error"));
    assert!(!kinds.contains(&"tool:completed"));

    // The run continued to a normal completion.
    match events.last() {
        Some(AgentEvent::RunCompleted { result, .. }) => {
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(result.steps, 2);
        }
        other => panic!("expected run:completed, got {:?}", other),
    }

    // The model saw the denial as a tool error.
    let requests = requests.lock().unwrap();
    let last = requests[1].messages.last().unwrap();
    assert!(last.content.contains("Tool execution denied by user"));

    Ok(())
}

// Streams scripted chunks, waiting briefly between them.
struct StreamingClient {
    chunks: Arc<Mutex<Vec<StreamChunk>>>,
}

#[async_trait]
impl ModelClient for StreamingClient {
    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse> {
        anyhow::bail!("streaming only")
    }

    async fn generate_stream(&self, _request: ModelRequest) -> Result<ModelStream> {
        let chunks: Vec<Result<StreamChunk>> =
            self.chunks.lock().unwrap().drain(..).map(Ok).collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn client_name(&self) -> &str {
        "streaming"
    }
}

#[tokio::test]
async fn test_streaming_chunks_are_relayed() -> Result<()> {
    let client = Arc::new(StreamingClient {
        chunks: Arc::new(Mutex::new(vec![
            StreamChunk::Delta {
                content: "The answer".to_string(),
            },
            StreamChunk::Delta {
                content: " is 4.".to_string(),
            },
            StreamChunk::Final {
                response: ModelResponse::text("", TokenUsage::new(4, 2)),
            },
        ])),
    });

    let engine = RunEngine::new(
        client,
        Arc::new(ToolDispatcher::new()),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("What is 2 + 2?"));
    let events = drain(&mut handle).await;

    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ModelChunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["The answer", " is 4."]);

    // An empty final text is backfilled from the streamed deltas.
    match events.last() {
        Some(AgentEvent::RunCompleted { result, .. }) => {
            assert_eq!(result.response, "The answer is 4.");
        }
        other => panic!("expected run:completed, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_streaming_without_deltas_emits_one_chunk() -> Result<()> {
    let client = Arc::new(StreamingClient {
        chunks: Arc::new(Mutex::new(vec![StreamChunk::Final {
            response: ModelResponse::text("4", TokenUsage::new(4, 1)),
        }])),
    });

    let engine = RunEngine::new(
        client,
        Arc::new(ToolDispatcher::new()),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("What is 2 + 2?"));
    let events = drain(&mut handle).await;

    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ModelChunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["4"]);

    Ok(())
}

// Streams deltas forever, one per poll, so a run can be cancelled mid-call.
struct EndlessStreamClient;

#[async_trait]
impl ModelClient for EndlessStreamClient {
    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse> {
        anyhow::bail!("streaming only")
    }

    async fn generate_stream(&self, _request: ModelRequest) -> Result<ModelStream> {
        let stream = futures_util::stream::unfold(0u64, |n| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let chunk = StreamChunk::Delta {
                content: format!("chunk-{} ", n),
            };
            Some((Ok(chunk), n + 1))
        });
        Ok(Box::pin(stream))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn client_name(&self) -> &str {
        "endless"
    }
}

#[tokio::test]
async fn test_cancellation_mid_stream() -> Result<()> {
    let engine = RunEngine::new(
        Arc::new(EndlessStreamClient),
        Arc::new(ToolDispatcher::new()),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("never finish"));

    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        if matches!(event, AgentEvent::ModelChunk { .. }) && events.len() > 3 {
            handle.cancellation.cancel();
        }
        events.push(event);
    }

    assert!(matches!(
        events.last(),
        Some(AgentEvent::RunCancelled { .. })
    ));
    assert!(!kinds(&events).contains(&"run:completed"));

    Ok(())
}

#[tokio::test]
async fn test_tool_results_preserve_call_order() -> Result<()> {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(ToolDefinition::from_fn(
        "alpha",
        "First tool",
        json!({"type": "object"}),
        |_input, _context| Ok(json!("a")),
    ));
    dispatcher.register(
        ToolDefinition::from_fn(
            "beta",
            "Gated tool",
            json!({"type": "object"}),
            |_input, _context| Ok(json!("b")),
        )
        .with_approval(true),
    );
    dispatcher.register(ToolDefinition::from_fn(
        "gamma",
        "Third tool",
        json!({"type": "object"}),
        |_input, _context| Ok(json!("c")),
    ));

    let response = ModelResponse::with_tool_calls(
        "",
        vec![
            ToolInvocation::new("call-a", "alpha", json!({})),
            ToolInvocation::new("call-b", "beta", json!({})),
            ToolInvocation::new("call-c", "gamma", json!({})),
        ],
        TokenUsage::new(3, 3),
    );
    let client = Arc::new(ScriptedClient::new(vec![
        response,
        ModelResponse::text("done", TokenUsage::new(1, 1)),
    ]));
    let requests = Arc::clone(&client.requests);

    let engine = RunEngine::new(
        client,
        Arc::new(dispatcher),
        Arc::new(AutoApprovalGate::deny_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("run all three"));
    let events = drain(&mut handle).await;

    // Approval and start events interleave per call; execution results come
    // after the whole batch, still in call order.
    let tool_kinds: Vec<&str> = kinds(&events)
        .into_iter()
        .filter(|k| k.starts_with("tool:"))
        .collect();
    assert_eq!(
        tool_kinds,
        vec![
            "tool:started",
            "tool:started",
            "tool:approval:required",
            "tool:approval:denied",
            "tool:error",
            "tool:started",
            "tool:completed",
            "tool:completed",
        ]
    );

    // The model-visible tool message lists results in call order.
    let requests = requests.lock().unwrap();
    let content = &requests[1].messages.last().unwrap().content;
    let results: serde_json::Value = serde_json::from_str(content)?;
    let ids: Vec<&str> = results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["callId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["call-a", "call-b", "call-c"]);
    assert!(results[1]["error"]
        .as_str()
        .unwrap()
        .contains("denied"));

    Ok(())
}

// Fails a fixed number of times before answering.
struct FlakyClient {
    failures_left: Arc<Mutex<u32>>,
}

#[async_trait]
impl ModelClient for FlakyClient {
    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse> {
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            anyhow::bail!("upstream 503")
        }
        Ok(ModelResponse::text("recovered", TokenUsage::new(1, 1)))
    }

    fn client_name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test(start_paused = true)]
async fn test_model_retry_recovers() -> Result<()> {
    let engine = RunEngine::new(
        Arc::new(FlakyClient {
            failures_left: Arc::new(Mutex::new(2)),
        }),
        Arc::new(ToolDispatcher::new()),
        Arc::new(AutoApprovalGate::approve_all()),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("hello"));
    let events = drain(&mut handle).await;

    match events.last() {
        Some(AgentEvent::RunCompleted { result, .. }) => {
            assert_eq!(result.response, "recovered");
            assert_eq!(result.steps, 1);
        }
        other => panic!("expected run:completed, got {:?}", other),
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_model_retry_exhaustion_is_fatal() -> Result<()> {
    let config = EngineConfig {
        max_retries: 1,
        ..EngineConfig::default()
    };
    let engine = RunEngine::new(
        Arc::new(FlakyClient {
            failures_left: Arc::new(Mutex::new(10)),
        }),
        Arc::new(ToolDispatcher::new()),
        Arc::new(AutoApprovalGate::approve_all()),
        config,
    );
    let mut handle = engine.spawn(RunInput::new("hello"));
    let events = drain(&mut handle).await;

    match events.last() {
        Some(AgentEvent::RunError { error, .. }) => {
            assert_eq!(error.code, RunErrorCode::ModelError);
            assert!(error.message.contains("503"));
        }
        other => panic!("expected run:error, got {:?}", other),
    }

    Ok(())
}

// Gate that records requests and answers from a script.
struct RecordingGate {
    decisions: Arc<Mutex<Vec<bool>>>,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ApprovalGate for RecordingGate {
    async fn request(
        &self,
        request: ace::engine::ApprovalRequest,
    ) -> ace::engine::ApprovalDecision {
        self.seen.lock().unwrap().push(request.tool.clone());
        let approved = {
            let mut decisions = self.decisions.lock().unwrap();
            if decisions.is_empty() {
                false
            } else {
                decisions.remove(0)
            }
        };
        if approved {
            ace::engine::ApprovalDecision::Approved
        } else {
            ace::engine::ApprovalDecision::denied("not this one")
        }
    }
}

#[tokio::test]
async fn test_gate_sees_tool_and_input() -> Result<()> {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(
        ToolDefinition::from_fn(
            "deploy",
            "Deploy to production",
            json!({"type": "object"}),
            |_input, _context| Ok(json!({"deployed": true})),
        )
        .with_approval(true),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let gate = RecordingGate {
        decisions: Arc::new(Mutex::new(vec![true])),
        seen: Arc::clone(&seen),
    };

    let client = Arc::new(ScriptedClient::new(vec![
        tool_call_response("call-1", "deploy", json!({"env": "prod"})),
        ModelResponse::text("Deployed.", TokenUsage::new(1, 1)),
    ]));

    let engine = RunEngine::new(
        client,
        Arc::new(dispatcher),
        Arc::new(gate),
        EngineConfig::default(),
    );
    let mut handle = engine.spawn(RunInput::new("ship it"));
    let events = drain(&mut handle).await;

    assert!(kinds(&events).contains(&"tool:approval:granted"));
    assert!(kinds(&events).contains(&"tool:completed"));
    assert_eq!(seen.lock().unwrap().as_slice(), &["deploy".to_string()]);

    Ok(())
}
