//! Agent loop controller — drives one user turn to completion.
//!
//! The turn is an explicit state machine driven by a single task:
//!
//! ```text
//! Sending → Streaming → Detecting ─┬─ no tool call ─→ Done(Completed)
//!    ↑                             └─ tool call ───→ Executing ─┐
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Sending**: assemble context, open the model stream
//! - **Streaming**: accumulate chunks; the stop flag is checked between chunks
//! - **Detecting**: look for a fenced tool call in the full text
//! - **Executing**: run the first tool call, append the canonical
//!   `Tool <name> result: <content>` system message, loop
//!
//! Transport errors end the turn with `Err`; tool errors become observations
//! the model can react to; cancellation is a clean `TurnOutcome::Cancelled`.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use stepwise_core::agent::AgentConfig;
use stepwise_core::error::ToolError;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::message::{Conversation, Message};
use stepwise_core::provider::{ChunkReceiver, Provider, ProviderRequest, Usage};
use stepwise_core::retrieval::RetrievalCollaborator;
use stepwise_core::step::{ExecutionStep, StepStatus};
use stepwise_core::store::ConversationStore;
use stepwise_core::tool::{ToolExecutor, ToolOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::StopSignal;
use crate::context::{ContextAssembler, SystemContext};
use crate::protocol::{self, ToolCallRequest};
use crate::stream_event::AgentStreamEvent;
use crate::trace::{ExecutionTrace, TraceUpdate};

/// Placeholder shown while the follow-up model call is in flight.
pub const PENDING_RESPONSE_TEXT: &str = "Thinking...";

// ── Public types ──────────────────────────────────────────────────────────

/// Per-turn options supplied by the caller.
#[derive(Debug, Default)]
pub struct TurnOptions {
    /// Retrieved context for this turn; overrides the attached retriever.
    pub retrieved_context: Option<String>,
    /// Stop flag observed at every suspension point.
    pub stop: StopSignal,
    /// Streaming UI events.
    pub events: Option<mpsc::Sender<AgentStreamEvent>>,
    /// Receives the full step list after every trace mutation.
    pub trace_observer: Option<mpsc::UnboundedSender<TraceUpdate>>,
}

impl TurnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retrieved_context(mut self, context: impl Into<String>) -> Self {
        self.retrieved_context = Some(context.into());
        self
    }

    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<AgentStreamEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_trace_observer(mut self, observer: mpsc::UnboundedSender<TraceUpdate>) -> Self {
        self.trace_observer = Some(observer);
        self
    }
}

/// How a turn ended, short of a transport error.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The model answered without a tool call. The message is already
    /// appended to the conversation and carries the finalized trace.
    Completed { message: Message },
    /// The user stopped the turn. Nothing partial was appended.
    Cancelled { steps: Vec<ExecutionStep> },
    /// The configured cap on model calls was reached.
    StepLimitExceeded {
        steps: Vec<ExecutionStep>,
        max_turns: u32,
    },
}

impl TurnOutcome {
    /// The final answer text, if the turn completed.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Completed { message } => Some(&message.content),
            _ => None,
        }
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        match self {
            Self::Completed { message } => message.execution_steps.as_deref().unwrap_or_default(),
            Self::Cancelled { steps } | Self::StepLimitExceeded { steps, .. } => steps,
        }
    }
}

// ── Controller ────────────────────────────────────────────────────────────

/// Orchestrates model calls and tool execution for a conversation.
///
/// One turn at a time per conversation: the conversation is borrowed
/// mutably for the whole turn.
pub struct AgentLoopController {
    /// Model endpoint
    provider: Arc<dyn Provider>,

    /// Tool execution seam
    tools: Arc<dyn ToolExecutor>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Persistence, called once per turn
    store: Option<Arc<dyn ConversationStore>>,

    /// RAG / grading collaborator
    retriever: Option<Arc<dyn RetrievalCollaborator>>,
}

impl AgentLoopController {
    /// Create a new controller.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            event_bus,
            store: None,
            retriever: None,
        }
    }

    /// Persist the conversation at the end of every turn.
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Query a retrieval collaborator once per turn for extra system context.
    pub fn with_retriever(mut self, retriever: Arc<dyn RetrievalCollaborator>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Run one user turn.
    ///
    /// Appends the user message, loops model → tool → model until the model
    /// answers without a tool call, and saves the conversation. A failed
    /// model call returns `Err` with the user's message still in place.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        config: &AgentConfig,
        options: TurnOptions,
    ) -> stepwise_core::Result<TurnOutcome> {
        let conversation_id = conversation.id.to_string();
        conversation.push(Message::user(user_message));

        info!(
            conversation = %conversation_id,
            model = %config.model_id,
            max_turns = config.max_turns,
            "Agent turn starting"
        );
        self.event_bus.publish(DomainEvent::TurnStarted {
            conversation_id: conversation_id.clone(),
            model: config.model_id.clone(),
            timestamp: Utc::now(),
        });

        let retrieved = match options.retrieved_context.clone() {
            Some(context) => Some(context),
            None => self.retrieve(user_message).await,
        };
        let system = SystemContext {
            persona: config.persona.clone(),
            tools: self
                .tools
                .catalog()
                .into_iter()
                .filter(|t| config.tool_enabled(&t.name))
                .collect(),
            retrieved,
        };

        let result = {
            let mut turn = Turn::new(self, conversation, config, system, options);
            let result = turn.drive().await;
            if let Err(e) = &result {
                turn.abort(e).await;
            }
            result
        };

        self.persist(conversation).await;
        result
    }

    async fn retrieve(&self, query: &str) -> Option<String> {
        let retriever = self.retriever.as_ref()?;
        match retriever.retrieve(query).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Retrieval failed, continuing without context: {e}");
                None
            }
        }
    }

    async fn persist(&self, conversation: &Conversation) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(conversation).await {
            Ok(()) => debug!(conversation = %conversation.id, store = store.name(), "Conversation saved"),
            Err(e) => warn!(conversation = %conversation.id, "Failed to save conversation: {e}"),
        }
    }
}

// ── Turn state machine ────────────────────────────────────────────────────

enum Phase {
    Sending,
    Streaming(ChunkReceiver),
    Detecting(String),
    Executing(ToolCallRequest),
    Done(TurnOutcome),
}

/// Mutable state of one running turn.
struct Turn<'a> {
    controller: &'a AgentLoopController,
    conversation: &'a mut Conversation,
    config: &'a AgentConfig,
    system: SystemContext,
    assembler: ContextAssembler,
    trace: ExecutionTrace,
    stop: StopSignal,
    events: Option<mpsc::Sender<AgentStreamEvent>>,
    usage: Option<Usage>,
    model_calls: usize,
    tool_calls: usize,
}

impl<'a> Turn<'a> {
    fn new(
        controller: &'a AgentLoopController,
        conversation: &'a mut Conversation,
        config: &'a AgentConfig,
        system: SystemContext,
        options: TurnOptions,
    ) -> Self {
        let trace = match options.trace_observer {
            Some(observer) => ExecutionTrace::with_observer(observer),
            None => ExecutionTrace::new(),
        };
        Self {
            controller,
            conversation,
            config,
            system,
            assembler: ContextAssembler::new(config.context_window),
            trace,
            stop: options.stop,
            events: options.events,
            usage: None,
            model_calls: 0,
            tool_calls: 0,
        }
    }

    async fn drive(&mut self) -> stepwise_core::Result<TurnOutcome> {
        let mut phase = Phase::Sending;
        loop {
            phase = match phase {
                Phase::Sending => self.send().await?,
                Phase::Streaming(rx) => self.stream(rx).await?,
                Phase::Detecting(text) => self.detect(text).await,
                Phase::Executing(call) => self.execute(call).await,
                Phase::Done(outcome) => return Ok(outcome),
            };
        }
    }

    async fn send(&mut self) -> stepwise_core::Result<Phase> {
        if self.stop.is_stopped() {
            return Ok(self.cancelled().await);
        }

        if self.model_calls >= self.config.max_turns as usize {
            return Ok(self.step_limit().await);
        }
        self.model_calls += 1;
        debug!(iteration = self.model_calls, "Agent iteration");

        let system = self.system.to_messages();
        let assembled = self.assembler.assemble(&system, &self.conversation.messages);
        let request = ProviderRequest {
            model: self.config.model_id.clone(),
            messages: assembled.messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
            stop: vec![],
        };

        let provider = self.controller.provider.clone();
        let opened = tokio::select! {
            biased;
            _ = self.stop.stopped() => None,
            opened = provider.stream(request) => Some(opened),
        };
        match opened {
            None => Ok(self.cancelled().await),
            Some(rx) => Ok(Phase::Streaming(rx?)),
        }
    }

    async fn stream(&mut self, mut rx: ChunkReceiver) -> stepwise_core::Result<Phase> {
        let started = Instant::now();
        let mut full_text = String::new();
        let mut call_usage = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.stopped() => None,
                next = rx.recv() => Some(next),
            };
            let Some(next) = next else {
                // Dropping the receiver aborts the provider's stream.
                drop(rx);
                return Ok(self.cancelled().await);
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                full_text.push_str(&text);
                self.emit(AgentStreamEvent::Chunk { content: text }).await;
            }
            if chunk.usage.is_some() {
                call_usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        self.trace.clear_pending();

        if let Some(usage) = &call_usage {
            self.usage.get_or_insert_with(Usage::default).accumulate(usage);
        }
        self.controller.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: self.conversation.id.to_string(),
            model: self.config.model_id.clone(),
            tokens_used: call_usage.map(|u| u.total_tokens).unwrap_or(0),
            timestamp: Utc::now(),
        });
        debug!(
            chars = full_text.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Model response streamed"
        );

        Ok(Phase::Detecting(full_text))
    }

    async fn detect(&mut self, text: String) -> Phase {
        let Some(call) = protocol::parse(&text) else {
            return self.complete(text).await;
        };

        if let Some(thought) = protocol::extract_thought(&text) {
            self.trace.append_thought(&thought);
            self.emit(AgentStreamEvent::Thought { content: thought }).await;
        }
        self.conversation
            .push(Message::assistant(text).with_model(&self.config.model_id));

        self.trace.append_action(&call.name, &call.arguments_json());
        self.emit(AgentStreamEvent::ToolCall {
            name: call.name.clone(),
            input: Value::Object(call.arguments.clone()),
        })
        .await;

        Phase::Executing(call)
    }

    async fn execute(&mut self, call: ToolCallRequest) -> Phase {
        self.tool_calls += 1;
        let started = Instant::now();
        let outcome = if self.config.tool_enabled(&call.name) {
            self.controller
                .tools
                .execute(&call.name, Value::Object(call.arguments))
                .await
        } else {
            ToolOutcome::from(ToolError::Disabled(call.name.clone()))
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let status = StepStatus::from_result_text(&outcome.content);
        let success = status == StepStatus::Success;
        if !success {
            warn!(tool = %call.name, result = %outcome.content, "Tool call failed");
        }

        self.trace.append_observation(&outcome.content, status);
        self.controller.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::ToolResult {
            name: call.name.clone(),
            output: outcome.content.clone(),
            success,
        })
        .await;

        self.conversation
            .push(Message::tool_result(&call.name, &outcome.content));

        if self.stop.is_stopped() {
            return self.cancelled().await;
        }

        self.trace
            .append_response(PENDING_RESPONSE_TEXT, StepStatus::Pending);
        Phase::Sending
    }

    // ── Terminal transitions ──

    async fn complete(&mut self, text: String) -> Phase {
        if !self.trace.is_empty() {
            self.trace.append_response(&text, StepStatus::Success);
        }
        self.trace.finalize();

        let mut message = Message::assistant(text).with_model(&self.config.model_id);
        message.token_usage = self.usage;
        if !self.trace.is_empty() {
            message.execution_steps = Some(self.trace.steps().to_vec());
        }
        self.conversation.push(message.clone());

        info!(
            model_calls = self.model_calls,
            tool_calls = self.tool_calls,
            "Agent turn completed"
        );
        self.publish_completed();
        self.emit(AgentStreamEvent::Done {
            conversation_id: self.conversation.id.to_string(),
            usage: self.usage,
            iterations: self.model_calls,
            tool_calls_made: self.tool_calls,
        })
        .await;

        Phase::Done(TurnOutcome::Completed { message })
    }

    async fn cancelled(&mut self) -> Phase {
        self.trace.clear_pending();
        info!(model_calls = self.model_calls, "Agent turn cancelled");
        self.controller.event_bus.publish(DomainEvent::TurnCancelled {
            conversation_id: self.conversation.id.to_string(),
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::Cancelled).await;
        Phase::Done(TurnOutcome::Cancelled {
            steps: self.trace.steps().to_vec(),
        })
    }

    async fn step_limit(&mut self) -> Phase {
        let max_turns = self.config.max_turns;
        self.trace.clear_pending();
        self.trace.append_response(
            &format!("Stopped after {max_turns} model calls without a final answer"),
            StepStatus::Error,
        );
        self.trace.finalize();

        warn!(max_turns, tool_calls = self.tool_calls, "Agent turn hit step limit");
        self.controller.event_bus.publish(DomainEvent::TurnStepLimited {
            conversation_id: self.conversation.id.to_string(),
            max_turns,
            model_calls: self.model_calls,
            tool_calls: self.tool_calls,
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::StepLimit { max_turns }).await;

        Phase::Done(TurnOutcome::StepLimitExceeded {
            steps: self.trace.steps().to_vec(),
            max_turns,
        })
    }

    /// Roll back in-flight artifacts after a transport error.
    async fn abort(&mut self, error: &stepwise_core::Error) {
        self.trace.clear_pending();
        warn!(model_calls = self.model_calls, "Agent turn failed: {error}");
        self.controller.event_bus.publish(DomainEvent::TurnFailed {
            conversation_id: self.conversation.id.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::Error {
            message: error.to_string(),
        })
        .await;
    }

    fn publish_completed(&self) {
        self.controller.event_bus.publish(DomainEvent::TurnCompleted {
            conversation_id: self.conversation.id.to_string(),
            model_calls: self.model_calls,
            tool_calls: self.tool_calls,
            timestamp: Utc::now(),
        });
    }

    async fn emit(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.events {
            // A departed listener does not stop the turn.
            let _ = tx.send(event).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
