//! Execution trace — the live step log of a single agent turn.
//!
//! The trace is:
//!
//! - **Turn-scoped**: created empty when a turn begins, finalized when it ends
//! - **Append-only**: the one exception is the transient pending placeholder
//!   shown while a model call is in flight, which is removed once the call
//!   resolves
//! - **Observable**: every mutation sends the full step list to the observer
//!
//! State machine: `Empty → Accumulating → Finalized`. Errors are steps with
//! `status = error`, not a separate terminal state.

use serde::{Deserialize, Serialize};
use stepwise_core::step::{ExecutionStep, StepKind, StepStatus};
use tokio::sync::mpsc;

/// Snapshot sent to the observer after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceUpdate {
    pub steps: Vec<ExecutionStep>,
    pub finalized: bool,
}

/// Lifecycle of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceState {
    Empty,
    Accumulating,
    Finalized,
}

/// The ordered step log of the current turn.
#[derive(Debug, Default)]
pub struct ExecutionTrace {
    steps: Vec<ExecutionStep>,
    finalized: bool,
    observer: Option<mpsc::UnboundedSender<TraceUpdate>>,
}

impl ExecutionTrace {
    /// Create an empty trace with no observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty trace that reports every update to `observer`.
    pub fn with_observer(observer: mpsc::UnboundedSender<TraceUpdate>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    // ── Recording ──

    pub fn append_thought(&mut self, text: &str) {
        self.push(ExecutionStep::thought(text));
    }

    /// Record a tool invocation as `name(argsJson)`.
    pub fn append_action(&mut self, name: &str, args_json: &str) {
        self.push(ExecutionStep::action(format!("{name}({args_json})")));
    }

    pub fn append_observation(&mut self, text: &str, status: StepStatus) {
        self.push(ExecutionStep::new(StepKind::Observation, text, Some(status)));
    }

    pub fn append_response(&mut self, text: &str, status: StepStatus) {
        self.push(ExecutionStep::new(StepKind::Response, text, Some(status)));
    }

    /// Remove trailing pending placeholders. Returns how many were removed.
    pub fn clear_pending(&mut self) -> usize {
        self.assert_open();
        let before = self.steps.len();
        while self.steps.last().is_some_and(ExecutionStep::is_pending) {
            self.steps.pop();
        }
        let removed = before - self.steps.len();
        if removed > 0 {
            self.notify();
        }
        removed
    }

    /// Close the trace. Further mutation is a programming error.
    pub fn finalize(&mut self) {
        self.assert_open();
        self.finalized = true;
        self.notify();
    }

    fn push(&mut self, step: ExecutionStep) {
        self.assert_open();
        self.steps.push(step);
        self.notify();
    }

    fn assert_open(&self) {
        assert!(!self.finalized, "execution trace mutated after finalize");
    }

    fn notify(&mut self) {
        let Some(observer) = &self.observer else {
            return;
        };
        let update = TraceUpdate {
            steps: self.steps.clone(),
            finalized: self.finalized,
        };
        if observer.send(update).is_err() {
            // Receiver gone; stop cloning snapshots for nobody.
            self.observer = None;
        }
    }

    // ── Queries ──

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn state(&self) -> TraceState {
        if self.finalized {
            TraceState::Finalized
        } else if self.steps.is_empty() {
            TraceState::Empty
        } else {
            TraceState::Accumulating
        }
    }

    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }

    /// Consume the trace, yielding its steps.
    pub fn into_steps(self) -> Vec<ExecutionStep> {
        self.steps
    }

    // ── Rendering ──

    /// Render as human-readable text, one `[Kind] content` line per step.
    pub fn render(&self) -> String {
        render_steps(&self.steps)
    }
}

/// Render steps as `[Kind] content` lines, with a status marker where set.
pub fn render_steps(steps: &[ExecutionStep]) -> String {
    let mut out = String::new();
    for step in steps {
        let marker = match step.status {
            Some(StepStatus::Success) => " ✓",
            Some(StepStatus::Error) => " ✗",
            Some(StepStatus::Pending) => " …",
            None => "",
        };
        out.push_str(&format!("[{}]{} {}\n", step.kind.label(), marker, step.content));
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────
