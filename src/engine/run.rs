//! The per-run state machine: step loop, streaming, approval gating, budgets.

use crate::engine::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::engine::events::{AgentEvent, RunErrorCode, RunErrorInfo, RunResult, RunStatus};
use crate::engine::transcript::Transcript;
use crate::message::{Message, MessageMetadata, TimelineStatus, ToolTimelineEntry};
use crate::provider::{
    ModelClient, ModelRequest, ModelResponse, StreamChunk, TokenUsage, ToolInvocation, ToolSchema,
};
use crate::tool::{ToolCall, ToolContext, ToolDispatcher, ToolError, ToolExecutionResult};
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_MAX_STEPS: u32 = 50;
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MESSAGE_WINDOW: usize = 40;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Budgets and model parameters for runs spawned by one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Agent identity runs execute under.
    pub agent_id: String,
    /// System prompt sent with every model call.
    pub system_prompt: String,
    /// Model to use (None = client default).
    pub model_name: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token cap per model call.
    pub max_tokens: Option<u32>,
    /// Step budget per run.
    pub max_steps: u32,
    /// Wall-clock budget per run, checked at step boundaries only. A slow
    /// model call is not preempted, so this is a latency bound rather than a
    /// hard real-time guarantee.
    pub timeout: Duration,
    /// Retries per model call on transient failure.
    pub max_retries: u32,
    /// How many trailing messages the model sees per call.
    pub message_window: usize,
    /// Working directory handed to tool handlers.
    pub working_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_id: "agent".to_string(),
            system_prompt: "You are a helpful agent.".to_string(),
            model_name: None,
            temperature: None,
            max_tokens: None,
            max_steps: DEFAULT_MAX_STEPS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_retries: DEFAULT_MAX_RETRIES,
            message_window: DEFAULT_MESSAGE_WINDOW,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Everything one run starts from. Immutable once the run is spawned.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    /// The user's task.
    pub task: String,
    /// Host-supplied parameters surfaced to tool handlers.
    pub parameters: HashMap<String, Value>,
    /// History from earlier runs of the same conversation.
    pub prior_messages: Vec<Message>,
    /// Externally owned cancellation token; a fresh one is created if absent.
    pub cancellation: Option<CancellationToken>,
}

impl RunInput {
    /// An input carrying just a task.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    /// Set the run parameters.
    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Seed the run with prior conversation history.
    pub fn with_prior_messages(mut self, messages: Vec<Message>) -> Self {
        self.prior_messages = messages;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// A live run: its id, event stream, cancellation token, and shared history.
///
/// Consume `events` until a terminal event (`run:completed`, `run:error`, or
/// `run:cancelled`); the channel closes shortly after. Cancelling the token
/// asks the run to stop at its next suspension point.
#[derive(Debug)]
pub struct RunHandle {
    /// The run's unique id.
    pub run_id: String,
    /// Ordered event stream, closed after the terminal event.
    pub events: mpsc::Receiver<AgentEvent>,
    /// Cancels the run when triggered.
    pub cancellation: CancellationToken,
    /// The run's full message history, shared with the engine task.
    pub transcript: Transcript,
}

/// Drives runs: the model-call/tool-call step loop with approval gating.
///
/// One engine is built per run by the coordinator (the approval gate is
/// per-run state), but an engine can spawn any number of runs when the gate
/// is stateless.
pub struct RunEngine {
    client: Arc<dyn ModelClient>,
    dispatcher: Arc<ToolDispatcher>,
    gate: Arc<dyn ApprovalGate>,
    config: EngineConfig,
}

impl RunEngine {
    /// Create an engine over the given client, tools, and approval gate.
    pub fn new(
        client: Arc<dyn ModelClient>,
        dispatcher: Arc<ToolDispatcher>,
        gate: Arc<dyn ApprovalGate>,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            dispatcher,
            gate,
            config,
        }
    }

    /// Start a run on its own tokio task and hand back the live end.
    pub fn spawn(&self, input: RunInput) -> RunHandle {
        let run_id = uuid::Uuid::new_v4().to_string();
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancellation = input.cancellation.clone().unwrap_or_default();
        let transcript = Transcript::seeded(input.prior_messages.clone());

        let worker = RunWorker {
            run_id: run_id.clone(),
            client: Arc::clone(&self.client),
            dispatcher: Arc::clone(&self.dispatcher),
            gate: Arc::clone(&self.gate),
            config: self.config.clone(),
            transcript: transcript.clone(),
            events,
            cancellation: cancellation.clone(),
            parameters: input.parameters.clone(),
        };
        tokio::spawn(worker.drive(input.task));

        RunHandle {
            run_id,
            events: receiver,
            cancellation,
            transcript,
        }
    }
}

impl std::fmt::Debug for RunEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEngine")
            .field("client", &self.client.client_name())
            .field("tools", &self.dispatcher.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// How one step left the run.
enum StepFlow {
    Continue,
    Finished(RunResult),
    Cancelled,
    Fatal(RunErrorInfo),
}

/// A tool call's outcome within a step, in call order.
struct SlotOutcome {
    result: ToolExecutionResult,
    denied: bool,
}

/// What the approval pass decided for one call.
enum Slot {
    Queued(ToolCall),
    Denied(ToolExecutionResult),
}

struct RunWorker {
    run_id: String,
    client: Arc<dyn ModelClient>,
    dispatcher: Arc<ToolDispatcher>,
    gate: Arc<dyn ApprovalGate>,
    config: EngineConfig,
    transcript: Transcript,
    events: mpsc::Sender<AgentEvent>,
    cancellation: CancellationToken,
    parameters: HashMap<String, Value>,
}

impl RunWorker {
    async fn drive(self, task: String) {
        self.transcript
            .push(Message::user(task).with_metadata(MessageMetadata::now()))
            .await;
        self.emit(AgentEvent::RunStarted {
            run_id: self.run_id.clone(),
            agent_id: self.config.agent_id.clone(),
        })
        .await;

        let run_started = Instant::now();
        let mut usage = TokenUsage::default();

        for step in 1..=self.config.max_steps {
            if self.cancellation.is_cancelled() {
                self.finish_cancelled().await;
                return;
            }
            if run_started.elapsed() > self.config.timeout {
                self.finish_fatal(RunErrorInfo {
                    code: RunErrorCode::Timeout,
                    message: format!(
                        "run exceeded timeout of {}s",
                        self.config.timeout.as_secs()
                    ),
                })
                .await;
                return;
            }

            match self.execute_step(step, &mut usage).await {
                StepFlow::Continue => {}
                StepFlow::Finished(result) => {
                    self.emit(AgentEvent::RunCompleted {
                        run_id: self.run_id.clone(),
                        result,
                    })
                    .await;
                    return;
                }
                StepFlow::Cancelled => {
                    self.finish_cancelled().await;
                    return;
                }
                StepFlow::Fatal(error) => {
                    self.finish_fatal(error).await;
                    return;
                }
            }
        }

        self.finish_fatal(RunErrorInfo {
            code: RunErrorCode::MaxStepsExceeded,
            message: format!("run exceeded maximum steps: {}", self.config.max_steps),
        })
        .await;
    }

    async fn execute_step(&self, step: u32, usage: &mut TokenUsage) -> StepFlow {
        let step_started = Instant::now();
        self.emit(AgentEvent::StepStarted { step }).await;

        let window = self.transcript.window(self.config.message_window).await;
        self.emit(AgentEvent::ModelRequest {
            tokens: window.len() as u32,
        })
        .await;

        let response = match self.call_model(self.build_request(window)).await {
            Ok(response) => response,
            Err(e) => {
                if self.cancellation.is_cancelled() {
                    return StepFlow::Cancelled;
                }
                return StepFlow::Fatal(RunErrorInfo {
                    code: RunErrorCode::ModelError,
                    message: e.to_string(),
                });
            }
        };
        usage.add(response.usage);
        self.emit(AgentEvent::ModelResponse {
            usage: response.usage,
        })
        .await;

        self.transcript
            .push(Message::assistant(response.text.clone()).with_metadata(MessageMetadata::now()))
            .await;

        if !response.has_tool_calls() {
            let duration = step_started.elapsed().as_millis() as u64;
            self.emit(AgentEvent::StepCompleted { step, duration }).await;
            return StepFlow::Finished(RunResult {
                status: RunStatus::Completed,
                response: response.text,
                steps: step,
                usage: *usage,
            });
        }

        let outcomes = self.tool_phase(step, &response.tool_calls).await;
        self.push_tool_message(&outcomes).await;

        if self.cancellation.is_cancelled() {
            return StepFlow::Cancelled;
        }

        let duration = step_started.elapsed().as_millis() as u64;
        self.emit(AgentEvent::StepCompleted { step, duration }).await;
        StepFlow::Continue
    }

    /// Process one turn's tool calls: approvals first, then the approved
    /// calls as one sequential batch. Outcomes come back in call order.
    async fn tool_phase(&self, step: u32, calls: &[ToolInvocation]) -> Vec<SlotOutcome> {
        let mut slots = Vec::with_capacity(calls.len());
        let mut queued = Vec::new();

        for call in calls {
            self.emit(AgentEvent::ToolStarted {
                tool: call.name.clone(),
                input: call.arguments.clone(),
            })
            .await;

            let gated = self
                .dispatcher
                .get(&call.name)
                .map(|tool| tool.requires_approval)
                .unwrap_or(false);
            if !gated {
                let tool_call = ToolCall::new(&call.id, &call.name, call.arguments.clone());
                slots.push(Slot::Queued(tool_call.clone()));
                queued.push(tool_call);
                continue;
            }

            match self.await_approval(call).await {
                ApprovalDecision::Approved => {
                    let tool_call = ToolCall::new(&call.id, &call.name, call.arguments.clone());
                    slots.push(Slot::Queued(tool_call.clone()));
                    queued.push(tool_call);
                }
                ApprovalDecision::Denied { reason } => {
                    let error = ToolError::denied(reason).to_string();
                    self.emit(AgentEvent::ToolError {
                        tool: call.name.clone(),
                        error: error.clone(),
                        recoverable: true,
                    })
                    .await;
                    slots.push(Slot::Denied(ToolExecutionResult::failure(
                        &call.id, &call.name, error, 0,
                    )));
                }
            }
        }

        let context = ToolContext::new(self.run_id.clone(), self.config.agent_id.clone())
            .with_step(step)
            .with_working_dir(&self.config.working_dir)
            .with_parameters(self.parameters.clone())
            .with_cancellation(self.cancellation.clone());
        let mut results = self.dispatcher.execute_batch(&queued, &context).await.into_iter();

        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Denied(result) => outcomes.push(SlotOutcome {
                    result,
                    denied: true,
                }),
                Slot::Queued(call) => {
                    let result = results.next().unwrap_or_else(|| {
                        ToolExecutionResult::failure(
                            &call.id,
                            &call.name,
                            ToolError::cancelled(&call.name).to_string(),
                            0,
                        )
                    });
                    match &result.error {
                        None => {
                            self.emit(AgentEvent::ToolCompleted {
                                tool: result.tool.clone(),
                                output: result.output.clone().unwrap_or(Value::Null),
                                duration: result.duration_ms,
                            })
                            .await;
                        }
                        Some(error) => {
                            self.emit(AgentEvent::ToolError {
                                tool: result.tool.clone(),
                                error: error.clone(),
                                recoverable: true,
                            })
                            .await;
                        }
                    }
                    outcomes.push(SlotOutcome {
                        result,
                        denied: false,
                    });
                }
            }
        }
        outcomes
    }

    /// Park the run on the approval gate, racing the cancellation token so a
    /// stopped run never waits on a decision nobody will make.
    async fn await_approval(&self, call: &ToolInvocation) -> ApprovalDecision {
        let approval_id = uuid::Uuid::new_v4().to_string();
        let request = ApprovalRequest {
            approval_id: approval_id.clone(),
            run_id: self.run_id.clone(),
            tool: call.name.clone(),
            input: call.arguments.clone(),
        };

        // Poll the gate once before announcing the request, so a consumer
        // that reacts to the event immediately finds the request already
        // registered with the gate.
        let mut pending = self.gate.request(request);
        let early = futures_util::poll!(&mut pending);

        self.emit(AgentEvent::ApprovalRequired {
            tool: call.name.clone(),
            input: call.arguments.clone(),
            approval_id: approval_id.clone(),
        })
        .await;

        let decision = match early {
            Poll::Ready(decision) => decision,
            Poll::Pending => tokio::select! {
                _ = self.cancellation.cancelled() => ApprovalDecision::denied("run cancelled"),
                decision = &mut pending => decision,
            },
        };

        match &decision {
            ApprovalDecision::Approved => {
                self.emit(AgentEvent::ApprovalGranted {
                    approval_id: approval_id.clone(),
                })
                .await;
            }
            ApprovalDecision::Denied { reason } => {
                self.emit(AgentEvent::ApprovalDenied {
                    approval_id: approval_id.clone(),
                    reason: reason.clone(),
                })
                .await;
            }
        }
        decision
    }

    /// Append the turn's tool results to history as one tool-role message
    /// with an inline timeline annotation.
    async fn push_tool_message(&self, outcomes: &[SlotOutcome]) {
        let results: Vec<&ToolExecutionResult> = outcomes.iter().map(|o| &o.result).collect();
        let content = serde_json::to_string(&results).unwrap_or_else(|_| "[]".to_string());

        let mut metadata = MessageMetadata::now();
        metadata.tool_timeline = outcomes
            .iter()
            .map(|outcome| ToolTimelineEntry {
                tool: outcome.result.tool.clone(),
                status: if outcome.denied {
                    TimelineStatus::Denied
                } else if outcome.result.is_error() {
                    TimelineStatus::Error
                } else {
                    TimelineStatus::Completed
                },
                detail: outcome.result.error.clone(),
                duration_ms: (!outcome.denied).then_some(outcome.result.duration_ms),
            })
            .collect();

        self.transcript
            .push(Message::tool(content).with_metadata(metadata))
            .await;
    }

    fn build_request(&self, window: Vec<Message>) -> ModelRequest {
        let mut tools: Vec<ToolSchema> = self
            .dispatcher
            .list()
            .into_iter()
            .map(|tool| {
                ToolSchema::new(
                    tool.name.clone(),
                    tool.description.clone(),
                    tool.input_schema.clone(),
                )
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));

        let mut request =
            ModelRequest::new(self.config.system_prompt.clone(), window).with_tools(tools);
        if let Some(model) = &self.config.model_name {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// One model call with retry. Transient failures back off exponentially;
    /// exhaustion surfaces the last error.
    async fn call_model(&self, request: ModelRequest) -> anyhow::Result<ModelResponse> {
        for attempt in 0..=self.config.max_retries {
            let result = if self.client.supports_streaming() {
                self.stream_model(request.clone()).await
            } else {
                self.client.generate(request.clone()).await
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt == self.config.max_retries || self.cancellation.is_cancelled() {
                        return Err(e);
                    }
                    warn!(
                        target: "ace::engine",
                        run_id = %self.run_id,
                        attempt,
                        error = %e,
                        "model call failed, retrying"
                    );
                    // Wait before retry (exponential backoff)
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    tokio::select! {
                        _ = self.cancellation.cancelled() => return Err(e),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
        anyhow::bail!("model call retries exhausted")
    }

    /// Consume the streaming path, emitting a chunk event per delta. When the
    /// client streams nothing but the final payload carries text, that text
    /// goes out as a single chunk so UIs render both paths identically.
    async fn stream_model(&self, request: ModelRequest) -> anyhow::Result<ModelResponse> {
        let mut stream = self.client.generate_stream(request).await?;
        let mut streamed_text = String::new();
        let mut chunks = 0usize;
        let mut final_response = None;

        loop {
            let item = tokio::select! {
                _ = self.cancellation.cancelled() => anyhow::bail!("model call cancelled"),
                item = stream.next() => item,
            };
            let Some(chunk) = item else { break };
            match chunk? {
                StreamChunk::Delta { content } => {
                    chunks += 1;
                    streamed_text.push_str(&content);
                    self.emit(AgentEvent::ModelChunk { content }).await;
                }
                StreamChunk::Final { response } => final_response = Some(response),
            }
        }

        let mut response = final_response
            .ok_or_else(|| anyhow::anyhow!("model stream ended without a final payload"))?;
        if response.text.is_empty() && !streamed_text.is_empty() {
            response.text = streamed_text;
        }
        if chunks == 0 && !response.text.is_empty() {
            self.emit(AgentEvent::ModelChunk {
                content: response.text.clone(),
            })
            .await;
        }
        Ok(response)
    }

    async fn finish_cancelled(&self) {
        debug!(target: "ace::engine", run_id = %self.run_id, "run cancelled");
        self.emit(AgentEvent::RunCancelled {
            run_id: self.run_id.clone(),
        })
        .await;
    }

    async fn finish_fatal(&self, error: RunErrorInfo) {
        warn!(
            target: "ace::engine",
            run_id = %self.run_id,
            code = ?error.code,
            message = %error.message,
            "run failed"
        );
        self.emit(AgentEvent::RunError {
            run_id: self.run_id.clone(),
            error,
        })
        .await;
    }

    /// Send one event, tolerating consumers that have gone away. A run keeps
    /// driving to its terminal state even with nobody listening.
    async fn emit(&self, event: AgentEvent) {
        let _ = self.events.send(event).await;
    }
}
