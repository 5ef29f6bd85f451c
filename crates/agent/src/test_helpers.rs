//! Shared test doubles for controller and history tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use stepwise_core::error::{ProviderError, StoreError, ToolError};
use stepwise_core::message::{Conversation, ConversationId, Message};
use stepwise_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use stepwise_core::retrieval::RetrievalCollaborator;
use stepwise_core::store::{ConversationStore, ConversationSummary};
use stepwise_core::tool::{Tool, ToolOutcome, ToolRegistry};
use tokio::sync::mpsc;

use crate::cancel::StopHandle;

/// One scripted model call.
pub enum Reply {
    /// Stream this text in two chunks, then a done chunk with usage.
    Text(String),
    /// Open the stream, then yield this error.
    Fail(ProviderError),
    /// Refuse to open the stream at all.
    Refuse(ProviderError),
    /// Send `partial`, set the stop flag once the controller has read it,
    /// and hold the stream open until the receiver is dropped.
    StopMidStream { partial: String, handle: StopHandle },
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

fn scripted_usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A provider that streams a sequence of scripted replies.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The `n`th request received.
    pub fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }

    fn next_reply(&self, request: ProviderRequest) -> Reply {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more replies (call #{})",
                requests.len()
            )
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        match self.next_reply(request) {
            Reply::Text(text) => Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: Some(scripted_usage()),
                model,
            }),
            Reply::Fail(e) | Reply::Refuse(e) => Err(e),
            Reply::StopMidStream { partial, handle } => {
                handle.stop();
                Ok(ProviderResponse {
                    message: Message::assistant(partial),
                    usage: None,
                    model,
                })
            }
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (tx, rx) = mpsc::channel(8);
        match self.next_reply(request) {
            Reply::Text(text) => {
                let mut split = text.len() / 2;
                while !text.is_char_boundary(split) {
                    split += 1;
                }
                let (head, tail) = text.split_at(split);
                for part in [head, tail] {
                    let _ = tx.try_send(Ok(StreamChunk {
                        content: Some(part.to_string()),
                        ..Default::default()
                    }));
                }
                let _ = tx.try_send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: Some(scripted_usage()),
                }));
            }
            Reply::Fail(e) => {
                let _ = tx.try_send(Ok(StreamChunk {
                    content: Some("partial ".into()),
                    ..Default::default()
                }));
                let _ = tx.try_send(Err(e));
            }
            Reply::Refuse(e) => return Err(e),
            Reply::StopMidStream { partial, handle } => {
                let _ = tx.try_send(Ok(StreamChunk {
                    content: Some(partial),
                    ..Default::default()
                }));
                tokio::spawn(async move {
                    // The buffered chunk frees its slot when the receiver takes it.
                    while tx.capacity() < tx.max_capacity() {
                        tokio::task::yield_now().await;
                    }
                    handle.stop();
                    tx.closed().await;
                });
            }
        }
        Ok(rx)
    }
}

/// A tool that always answers with the same result.
pub struct StaticTool {
    name: &'static str,
    result: Result<String, String>,
}

impl StaticTool {
    pub fn ok(name: &'static str, output: &str) -> Self {
        Self {
            name,
            result: Ok(output.to_string()),
        }
    }

    pub fn failing(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            result: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Scripted test tool"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        match &self.result {
            Ok(output) => Ok(ToolOutcome::success(output.clone())),
            Err(reason) => Err(ToolError::ExecutionFailed {
                tool_name: self.name.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// `get_weather` answering "18°C, clear" and `flaky` that always fails.
pub fn weather_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StaticTool::ok("get_weather", "18°C, clear")));
    registry.register(Box::new(StaticTool::failing("flaky", "service unavailable")));
    registry
}

/// A retriever that always returns the same context.
pub struct FixedRetriever(pub String);

#[async_trait]
impl RetrievalCollaborator for FixedRetriever {
    async fn retrieve(&self, _query: &str) -> stepwise_core::Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// A store that keeps a copy of every save.
#[derive(Default)]
pub struct RecordingStore {
    saves: Mutex<Vec<Conversation>>,
}

impl RecordingStore {
    /// Message count of each save, in order.
    pub fn saves(&self) -> Vec<usize> {
        self.saves.lock().unwrap().iter().map(Conversation::len).collect()
    }

    pub fn last_saved(&self) -> Option<Conversation> {
        self.saves.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ConversationStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.saves.lock().unwrap().push(conversation.clone());
        Ok(())
    }

    async fn load(&self, _id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        Ok(vec![])
    }
}

/// Drain every event currently buffered in a channel.
pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
