//! Execution steps — the unit of an agent turn's trace.
//!
//! A step is one of thought / action / observation / response. The ordered
//! list of steps for a turn is stored verbatim on the finalized assistant
//! message so it can be replayed without re-deriving it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefixes that mark a tool result as a failure.
const ERROR_PREFIXES: [&str; 2] = ["Error:", "Unknown error"];

/// The kind of a trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Thought,
    Action,
    Observation,
    Response,
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Thought => "Thought",
            Self::Action => "Action",
            Self::Observation => "Observation",
            Self::Response => "Response",
        }
    }
}

/// Status of an observation or response step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Error,
}

impl StepStatus {
    /// Derive a status from tool result text.
    ///
    /// `Error` iff the text starts with `Error:` or `Unknown error`.
    pub fn from_result_text(text: &str) -> Self {
        if ERROR_PREFIXES.iter().any(|p| text.starts_with(p)) {
            Self::Error
        } else {
            Self::Success
        }
    }
}

/// A single entry in an execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

impl ExecutionStep {
    pub fn new(kind: StepKind, content: impl Into<String>, status: Option<StepStatus>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(StepKind::Thought, content, None)
    }

    pub fn action(content: impl Into<String>) -> Self {
        Self::new(StepKind::Action, content, None)
    }

    /// An observation whose status follows the `Error:` prefix rule.
    pub fn observation(content: impl Into<String>) -> Self {
        let content = content.into();
        let status = StepStatus::from_result_text(&content);
        Self::new(StepKind::Observation, content, Some(status))
    }

    pub fn is_pending(&self) -> bool {
        self.status == Some(StepStatus::Pending)
    }
}
