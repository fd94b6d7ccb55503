//! Run lifecycle management across conversations.

use crate::coordinator::buffer::EventBuffer;
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::engine::{
    AgentEvent, ApprovalDecision, ApprovalGate, ApprovalRequest, EngineConfig, RunEngine,
    RunHandle, RunInput,
};
use crate::message::Message;
use crate::observability::RunLogger;
use crate::provider::ModelClient;
use crate::store::{Conversation, PendingApprovalRecord, RunState, StoreError, StoreHandle};
use crate::tool::ToolDispatcher;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long a finished run's event buffer stays subscribable for replay.
const BUFFER_GRACE: Duration = Duration::from_secs(30);

/// A successfully started run: its id and a live event subscription.
///
/// The subscription yields every event from `run:started` through the
/// terminal event, then closes. Additional observers can attach through
/// [`ConversationCoordinator::subscribe`].
#[derive(Debug)]
pub struct StartedRun {
    /// Id of the new run.
    pub run_id: String,
    /// Replay-then-live event stream for the run.
    pub events: mpsc::Receiver<AgentEvent>,
}

/// Registry entry reserved per conversation while a run is active.
///
/// Created before the run id is known so a racing second start is rejected
/// even during run setup.
struct ActiveRun {
    run_id: Option<String>,
    cancellation: CancellationToken,
}

/// Live half of a pending approval. The persisted mirror lives on the
/// conversation record; this resolver only exists in-process.
struct PendingApproval {
    conversation_id: String,
    owner_id: String,
    resolver: oneshot::Sender<ApprovalDecision>,
}

struct Inner {
    client: Arc<dyn ModelClient>,
    dispatcher: Arc<ToolDispatcher>,
    config: EngineConfig,
    store: StoreHandle,
    logger: Option<Arc<RunLogger>>,
    active: Mutex<HashMap<String, ActiveRun>>,
    approvals: Mutex<HashMap<String, PendingApproval>>,
    buffers: Mutex<HashMap<String, Arc<Mutex<EventBuffer>>>>,
}

/// Enforces one active run per conversation and owns everything that spans
/// runs: the pending-approval registry, per-conversation event buffers, and
/// checkpointed persistence.
///
/// Cloning is cheap and every clone drives the same registries.
#[derive(Clone)]
pub struct ConversationCoordinator {
    inner: Arc<Inner>,
}

impl ConversationCoordinator {
    /// Create a coordinator over the given model client, tools, and stores.
    ///
    /// # Arguments
    /// * `client` - The model boundary runs call through.
    /// * `dispatcher` - Tool registry shared by every run.
    /// * `store` - Persistence for conversations and run checkpoints.
    /// * `config` - Budgets and model parameters for spawned runs.
    /// * `logger` - Optional markdown run log fed from the event stream.
    pub fn new(
        client: Arc<dyn ModelClient>,
        dispatcher: ToolDispatcher,
        store: StoreHandle,
        config: EngineConfig,
        logger: Option<RunLogger>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                dispatcher: Arc::new(dispatcher),
                config,
                store,
                logger: logger.map(Arc::new),
                active: Mutex::new(HashMap::new()),
                approvals: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The stores this coordinator persists through.
    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    /// Id of the conversation's active run, if one is live.
    pub async fn active_run(&self, conversation_id: &str) -> Option<String> {
        let active = self.inner.active.lock().await;
        active
            .get(conversation_id)
            .filter(|run| !run.cancellation.is_cancelled())
            .and_then(|run| run.run_id.clone())
    }

    /// Start a run on a conversation.
    ///
    /// Rejects with [`CoordinatorError::RunConflict`] while the conversation
    /// already has an unaborted run. The conversation record is loaded (or
    /// created) to seed the run with prior history; a storage failure
    /// degrades to an empty history rather than blocking the run.
    pub async fn start_run(
        &self,
        conversation_id: &str,
        owner_id: &str,
        task: &str,
    ) -> CoordinatorResult<StartedRun> {
        let cancellation = CancellationToken::new();

        // Reserve the conversation before the run id exists so a racing
        // second start already sees it taken.
        {
            let mut active = self.inner.active.lock().await;
            if let Some(existing) = active.get(conversation_id) {
                if !existing.cancellation.is_cancelled() {
                    return Err(CoordinatorError::RunConflict {
                        conversation_id: conversation_id.to_string(),
                    });
                }
            }
            active.insert(
                conversation_id.to_string(),
                ActiveRun {
                    run_id: None,
                    cancellation: cancellation.clone(),
                },
            );
        }

        let mut conversation = match self.load_conversation(conversation_id, owner_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                self.inner.active.lock().await.remove(conversation_id);
                return Err(e);
            }
        };

        let gate = RegistryGate {
            inner: Arc::clone(&self.inner),
            conversation_id: conversation_id.to_string(),
            owner_id: owner_id.to_string(),
        };
        let engine = RunEngine::new(
            Arc::clone(&self.inner.client),
            Arc::clone(&self.inner.dispatcher),
            Arc::new(gate),
            self.inner.config.clone(),
        );
        let input = RunInput::new(task)
            .with_prior_messages(conversation.messages.clone())
            .with_cancellation(cancellation.clone());
        let handle = engine.spawn(input);
        let run_id = handle.run_id.clone();
        debug!(
            target: "ace::coordinator",
            conversation_id,
            run_id = %run_id,
            "run started"
        );
        if let Some(logger) = &self.inner.logger {
            if let Err(e) = logger.log_run_start(&run_id, &self.inner.config.agent_id, task) {
                warn!(target: "ace::coordinator", error = %e, "run log write failed");
            }
        }

        {
            let mut active = self.inner.active.lock().await;
            if let Some(entry) = active.get_mut(conversation_id) {
                entry.run_id = Some(run_id.clone());
            }
        }

        // Fresh buffer per run; the previous run's replay window ends here.
        let buffer = Arc::new(Mutex::new(EventBuffer::new()));
        let events = {
            let mut buffers = self.inner.buffers.lock().await;
            buffers.insert(conversation_id.to_string(), Arc::clone(&buffer));
            buffer.lock().await.subscribe()
        };

        conversation.last_run_id = Some(run_id.clone());
        if let Err(e) = self.inner.store.conversations.update(&conversation).await {
            warn!(
                target: "ace::coordinator",
                conversation_id,
                error = %e,
                "conversation write failed at run start"
            );
        }

        let relay = RunRelay {
            inner: Arc::clone(&self.inner),
            conversation,
            buffer,
            run_id: run_id.clone(),
            steps_seen: 0,
        };
        tokio::spawn(relay.pump(handle));

        Ok(StartedRun { run_id, events })
    }

    /// Cancel a conversation's active run.
    ///
    /// Returns false when there is nothing to stop: no registered run, a run
    /// already cancelled, or a supplied `run_id` that does not match the
    /// active one (a stale stop from a reconnecting client must not kill a
    /// newer run). Stopping also denies every pending approval tied to the
    /// conversation; cancellation alone would leave them dangling.
    pub async fn stop(&self, conversation_id: &str, run_id: Option<&str>) -> bool {
        let stopped = {
            let active = self.inner.active.lock().await;
            match active.get(conversation_id) {
                None => false,
                Some(run) if run.cancellation.is_cancelled() => false,
                Some(run) => {
                    let matches = match run_id {
                        Some(expected) => run.run_id.as_deref() == Some(expected),
                        None => true,
                    };
                    if matches {
                        run.cancellation.cancel();
                    }
                    matches
                }
            }
        };

        if stopped {
            debug!(target: "ace::coordinator", conversation_id, "run stopped");
            self.deny_conversation_approvals(conversation_id, "conversation stopped")
                .await;
        }
        stopped
    }

    /// Resolve a pending approval on behalf of `owner_id`.
    ///
    /// An approval that does not exist, was already resolved, or belongs to
    /// another owner is uniformly "not found".
    pub async fn resolve_approval(
        &self,
        owner_id: &str,
        approval_id: &str,
        approved: bool,
    ) -> CoordinatorResult<()> {
        let pending = {
            let mut approvals = self.inner.approvals.lock().await;
            match approvals.remove(approval_id) {
                Some(pending) if pending.owner_id == owner_id => pending,
                Some(pending) => {
                    // Someone else's approval; put it back, reveal nothing.
                    approvals.insert(approval_id.to_string(), pending);
                    return Err(CoordinatorError::ApprovalNotFound(approval_id.to_string()));
                }
                None => {
                    return Err(CoordinatorError::ApprovalNotFound(approval_id.to_string()))
                }
            }
        };

        let decision = if approved {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::denied("denied by user")
        };
        let _ = pending.resolver.send(decision);
        Ok(())
    }

    /// Attach an observer to a conversation's current (or just-finished)
    /// run: buffered events replay first, then live events follow in order.
    ///
    /// Returns None when the conversation has no run within its replay
    /// window.
    pub async fn subscribe(&self, conversation_id: &str) -> Option<mpsc::Receiver<AgentEvent>> {
        let buffers = self.inner.buffers.lock().await;
        match buffers.get(conversation_id) {
            Some(buffer) => Some(buffer.lock().await.subscribe()),
            None => None,
        }
    }

    async fn load_conversation(
        &self,
        conversation_id: &str,
        owner_id: &str,
    ) -> CoordinatorResult<Conversation> {
        match self.inner.store.conversations.get(conversation_id).await {
            Ok(conversation) => {
                if conversation.owner_id != owner_id {
                    return Err(CoordinatorError::ConversationNotFound(
                        conversation_id.to_string(),
                    ));
                }
                Ok(conversation)
            }
            Err(StoreError::NotFound(_)) => {
                Ok(Conversation::with_id(conversation_id, owner_id, None))
            }
            Err(e) => {
                warn!(
                    target: "ace::coordinator",
                    conversation_id,
                    error = %e,
                    "conversation load failed, starting from empty history"
                );
                Ok(Conversation::with_id(conversation_id, owner_id, None))
            }
        }
    }

    async fn deny_conversation_approvals(&self, conversation_id: &str, reason: &str) {
        let mut approvals = self.inner.approvals.lock().await;
        let ids: Vec<String> = approvals
            .iter()
            .filter(|(_, pending)| pending.conversation_id == conversation_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(pending) = approvals.remove(&id) {
                let _ = pending.resolver.send(ApprovalDecision::denied(reason));
            }
        }
    }
}

impl std::fmt::Debug for ConversationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationCoordinator")
            .field("client", &self.inner.client.client_name())
            .field("tools", &self.inner.dispatcher.len())
            .field("store_mode", &self.inner.store.mode)
            .finish_non_exhaustive()
    }
}

/// The engine-facing approval gate for one run: parks requests in the
/// coordinator's registry and waits for [`ConversationCoordinator::resolve_approval`]
/// (or a conversation stop) to answer.
struct RegistryGate {
    inner: Arc<Inner>,
    conversation_id: String,
    owner_id: String,
}

#[async_trait::async_trait]
impl ApprovalGate for RegistryGate {
    async fn request(&self, request: ApprovalRequest) -> ApprovalDecision {
        let (resolver, decision) = oneshot::channel();
        self.inner.approvals.lock().await.insert(
            request.approval_id.clone(),
            PendingApproval {
                conversation_id: self.conversation_id.clone(),
                owner_id: self.owner_id.clone(),
                resolver,
            },
        );

        match decision.await {
            Ok(decision) => decision,
            // Entry pruned without an answer; treat like a denial.
            Err(_) => ApprovalDecision::denied("approval abandoned"),
        }
    }
}

/// Pumps one run's events into the conversation's buffer, persists
/// checkpoints, and finalizes the conversation on the terminal event.
struct RunRelay {
    inner: Arc<Inner>,
    conversation: Conversation,
    buffer: Arc<Mutex<EventBuffer>>,
    run_id: String,
    steps_seen: u32,
}

impl RunRelay {
    async fn pump(mut self, mut handle: RunHandle) {
        while let Some(event) = handle.events.recv().await {
            self.log_event_entry(&event);
            if let AgentEvent::StepCompleted { step, .. } = &event {
                self.steps_seen = *step;
            }

            if event.is_terminal() {
                // Finalize before publishing: once an observer sees the
                // terminal event, the conversation accepts a new run.
                self.log_run_end(&event);
                self.finalize(&handle).await;
                self.buffer.lock().await.append(&event);
                return;
            }

            self.buffer.lock().await.append(&event);
            self.checkpoint(&event, &handle).await;
        }

        // The engine task went away without a terminal event. Close out as
        // cancelled so subscribers and registries do not dangle.
        warn!(
            target: "ace::coordinator",
            conversation_id = %self.conversation.id,
            run_id = %self.run_id,
            "event stream ended without a terminal event"
        );
        self.finalize(&handle).await;
        self.buffer.lock().await.append(&AgentEvent::RunCancelled {
            run_id: self.run_id.clone(),
        });
    }

    fn log_event_entry(&self, event: &AgentEvent) {
        if let Some(logger) = &self.inner.logger {
            let detail = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
            if let Err(e) = logger.log_event(event.kind(), &detail) {
                warn!(target: "ace::coordinator", error = %e, "run log write failed");
            }
        }
    }

    fn log_run_end(&self, event: &AgentEvent) {
        if let Some(logger) = &self.inner.logger {
            let (status, steps) = match event {
                AgentEvent::RunCompleted { result, .. } => {
                    (result.status.as_str(), result.steps)
                }
                AgentEvent::RunError { .. } => ("error", self.steps_seen),
                _ => ("cancelled", self.steps_seen),
            };
            if let Err(e) = logger.log_run_end(&self.run_id, status, steps) {
                warn!(target: "ace::coordinator", error = %e, "run log write failed");
            }
        }
    }

    /// Persist partial progress at meaningful boundaries: full message
    /// history at `step:completed`, the pending-approvals mirror at every
    /// approval-lifecycle event.
    async fn checkpoint(&mut self, event: &AgentEvent, handle: &RunHandle) {
        match event {
            AgentEvent::StepCompleted { .. } => {
                let messages = handle.transcript.snapshot().await;
                self.persist_run_state(messages.clone()).await;
                self.conversation.messages = messages;
                self.persist_conversation().await;
            }
            AgentEvent::ApprovalRequired {
                tool,
                input,
                approval_id,
            } => {
                self.conversation.pending_approvals.push(PendingApprovalRecord {
                    approval_id: approval_id.clone(),
                    run_id: self.run_id.clone(),
                    tool: tool.clone(),
                    input: input.clone(),
                    requested_at: Utc::now(),
                });
                self.persist_conversation().await;
            }
            AgentEvent::ApprovalGranted { approval_id }
            | AgentEvent::ApprovalDenied { approval_id, .. } => {
                self.conversation
                    .pending_approvals
                    .retain(|pending| pending.approval_id != *approval_id);
                self.persist_conversation().await;
            }
            _ => {}
        }
    }

    async fn finalize(&mut self, handle: &RunHandle) {
        self.conversation.messages = handle.transcript.snapshot().await;
        self.conversation.pending_approvals.clear();
        if let Err(e) = self.inner.store.conversations.update(&self.conversation).await {
            warn!(
                target: "ace::coordinator",
                conversation_id = %self.conversation.id,
                error = %e,
                "final conversation write failed, retrying"
            );
            if let Err(e) = self.inner.store.conversations.update(&self.conversation).await {
                warn!(
                    target: "ace::coordinator",
                    conversation_id = %self.conversation.id,
                    error = %e,
                    "final conversation write failed twice, giving up"
                );
            }
        }

        // The run-state checkpoint has served its purpose.
        if let Err(e) = self.inner.store.state.delete(&self.run_id).await {
            warn!(
                target: "ace::coordinator",
                run_id = %self.run_id,
                error = %e,
                "run state cleanup failed"
            );
        }

        // Prune leftover approval resolvers; their gates are gone with the run.
        {
            let mut approvals = self.inner.approvals.lock().await;
            approvals.retain(|_, pending| pending.conversation_id != self.conversation.id);
        }

        // Deregister, unless a newer run already replaced the entry.
        {
            let mut active = self.inner.active.lock().await;
            let ours = active
                .get(&self.conversation.id)
                .and_then(|run| run.run_id.as_deref())
                == Some(self.run_id.as_str());
            if ours {
                active.remove(&self.conversation.id);
            }
        }

        // Keep the buffer subscribable for a grace period, then drop it
        // unless a newer run has already installed its own.
        let inner = Arc::clone(&self.inner);
        let buffer = Arc::clone(&self.buffer);
        let conversation_id = self.conversation.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(BUFFER_GRACE).await;
            let mut buffers = inner.buffers.lock().await;
            if let Some(current) = buffers.get(&conversation_id) {
                if Arc::ptr_eq(current, &buffer) {
                    buffers.remove(&conversation_id);
                }
            }
        });
    }

    async fn persist_run_state(&self, messages: Vec<Message>) {
        let state = RunState::new(&self.run_id, messages);
        if let Err(e) = self.inner.store.state.set(state).await {
            warn!(
                target: "ace::coordinator",
                run_id = %self.run_id,
                error = %e,
                "run state checkpoint failed"
            );
        }
    }

    async fn persist_conversation(&mut self) {
        if let Err(e) = self.inner.store.conversations.update(&self.conversation).await {
            warn!(
                target: "ace::coordinator",
                conversation_id = %self.conversation.id,
                error = %e,
                "conversation checkpoint failed"
            );
        }
    }
}
