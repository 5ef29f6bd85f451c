//! Rebuild execution traces from a persisted flat message log.
//!
//! Used when redisplaying past conversations. Stateless: every call builds a
//! fresh step list and never touches the messages it reads.

use stepwise_core::message::{Message, Role};
use stepwise_core::step::{ExecutionStep, StepKind, StepStatus};
use tracing::debug;

use crate::protocol;

/// Rebuild the steps of one tool-calling chain.
///
/// `chain` is a contiguous run of assistant messages interleaved with
/// `Tool <name> result: <text>` system messages. Unlike live parsing, every
/// fenced tool call in an assistant message becomes an action step. The
/// result is best-effort and may diverge from the live trace.
pub fn reconstruct(chain: &[Message]) -> Vec<ExecutionStep> {
    let mut steps = Vec::new();
    for message in chain {
        match message.role {
            Role::System => {
                if let Some((_, result)) = message.tool_result_parts() {
                    steps.push(ExecutionStep::observation(result));
                }
            }
            Role::Assistant => {
                if let Some(thought) = protocol::extract_thought(&message.content) {
                    steps.push(ExecutionStep::thought(thought));
                }
                steps.extend(
                    protocol::parse_all(&message.content)
                        .iter()
                        .map(|call| ExecutionStep::action(call.render())),
                );
            }
            Role::User => {}
        }
    }
    steps
}

/// Collapse each tool-calling chain into one synthetic assistant message.
///
/// A chain starts at an assistant message that carries a tool call and
/// absorbs the following tool results and assistant messages, up to and
/// including the first assistant message without a tool call. The synthetic
/// message carries the final answer and the saved trace when one was
/// persisted, or a reconstructed one otherwise. A chain cut short (its last
/// message still holds a tool call) shows the scaffolding-free remainder.
///
/// Messages outside any chain pass through unchanged.
pub fn group_for_display(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let message = &messages[i];
        if message.role != Role::Assistant || !protocol::detect(&message.content) {
            out.push(message.clone());
            i += 1;
            continue;
        }

        let end = chain_end(messages, i);
        out.push(collapse(&messages[i..end]));
        i = end;
    }

    out
}

/// Index one past the last message of the chain starting at `start`.
fn chain_end(messages: &[Message], start: usize) -> usize {
    let mut end = start + 1;
    while let Some(next) = messages.get(end) {
        match next.role {
            Role::System if next.is_tool_result() => end += 1,
            Role::Assistant => {
                end += 1;
                if !protocol::detect(&next.content) {
                    break;
                }
            }
            _ => break,
        }
    }
    end
}

fn collapse(chain: &[Message]) -> Message {
    // Chains always start with an assistant message.
    let last = chain
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .unwrap_or(&chain[0]);

    let cut_short = protocol::detect(&last.content);
    let answer = if cut_short {
        protocol::extract_final_answer(&last.content)
    } else {
        last.content.clone()
    };

    let steps = match last.execution_steps.as_ref().filter(|s| !s.is_empty()) {
        Some(saved) => saved.clone(),
        None => {
            let mut steps = reconstruct(chain);
            if !cut_short && !answer.trim().is_empty() {
                steps.push(ExecutionStep::new(
                    StepKind::Response,
                    answer.clone(),
                    Some(StepStatus::Success),
                ));
            }
            steps
        }
    };
    debug!(
        messages = chain.len(),
        steps = steps.len(),
        cut_short,
        "Collapsed tool-calling chain"
    );

    Message {
        content: answer,
        execution_steps: Some(steps),
        ..last.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CALL: &str = "Thought: let me check\n\
                        ```json\n{\"name\":\"get_weather\",\"arguments\":{\"city\":\"Rome\"}}\n```";

    fn weather_chain() -> Vec<Message> {
        vec![
            Message::assistant(CALL),
            Message::tool_result("get_weather", "18°C, clear"),
            Message::assistant("It's 18°C and clear in Rome."),
        ]
    }

    #[test]
    fn observation_status_from_result_text() {
        let ok = reconstruct(&[Message::tool_result("search", "5 items found")]);
        assert_eq!(ok[0].kind, StepKind::Observation);
        assert_eq!(ok[0].content, "5 items found");
        assert_eq!(ok[0].status, Some(StepStatus::Success));

        let err = reconstruct(&[Message::system("Tool search result: Error: timeout")]);
        assert_eq!(err[0].status, Some(StepStatus::Error));

        let unknown = reconstruct(&[Message::system("Tool search result: Unknown error")]);
        assert_eq!(unknown[0].status, Some(StepStatus::Error));
    }

    #[test]
    fn observation_without_space_after_colon() {
        let steps = reconstruct(&[Message::system("Tool search result:Error: timeout")]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].content, "Error: timeout");
        assert_eq!(steps[0].status, Some(StepStatus::Error));
    }

    #[test]
    fn reconstructs_thought_action_observation() {
        let steps = reconstruct(&weather_chain());
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Thought, StepKind::Action, StepKind::Observation]
        );
        assert_eq!(steps[0].content, "let me check");
        assert_eq!(steps[1].content, r#"get_weather({"city":"Rome"})"#);
    }

    #[test]
    fn every_fenced_call_becomes_an_action() {
        let text = "```json\n{\"name\":\"a\",\"arguments\":{}}\n```\n\
                    ```json\n{\"tool\":\"b\",\"arguments\":{\"x\":1}}\n```";
        let steps = reconstruct(&[Message::assistant(text)]);
        let contents: Vec<&str> = steps.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["a({})", r#"b({"x":1})"#]);
    }

    #[test]
    fn non_tool_system_messages_are_ignored() {
        let steps = reconstruct(&[Message::system("You are helpful.")]);
        assert!(steps.is_empty());
    }

    #[test]
    fn groups_chain_into_one_message() {
        let mut messages = vec![Message::user("What's the weather in Rome?")];
        messages.extend(weather_chain());
        messages.push(Message::user("Thanks"));
        messages.push(Message::assistant("You're welcome."));

        let grouped = group_for_display(&messages);
        assert_eq!(grouped.len(), 4);
        assert_eq!(grouped[1].content, "It's 18°C and clear in Rome.");

        let steps = grouped[1].execution_steps.as_ref().unwrap();
        assert_eq!(steps.last().unwrap().kind, StepKind::Response);
        assert_eq!(
            steps.iter().filter(|s| s.kind == StepKind::Observation).count(),
            1
        );
        assert!(grouped[3].execution_steps.is_none());
    }

    #[test]
    fn saved_steps_win_over_reconstruction() {
        let mut chain = weather_chain();
        let saved = vec![ExecutionStep::action("saved_call({})")];
        chain[2].execution_steps = Some(saved.clone());

        let grouped = group_for_display(&chain);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].execution_steps.as_ref().unwrap(), &saved);
        assert_eq!(grouped[0].id, chain[2].id);
    }

    #[test]
    fn chain_cut_short_shows_clean_answer() {
        let chain = vec![
            Message::user("weather?"),
            Message::assistant(CALL),
            Message::tool_result("get_weather", "18°C, clear"),
        ];

        let grouped = group_for_display(&chain);
        assert_eq!(grouped.len(), 2);
        assert!(grouped[1].content.trim().is_empty());
        let steps = grouped[1].execution_steps.as_ref().unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.kind != StepKind::Response));
    }

    #[test]
    fn grouping_never_mutates_input() {
        let chain = weather_chain();
        let before = serde_json::to_string(&chain).unwrap();
        let _ = group_for_display(&chain);
        assert_eq!(serde_json::to_string(&chain).unwrap(), before);
    }

    #[test]
    fn plain_conversation_passes_through() {
        let messages = vec![
            Message::system("Tool orphan result: ok"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let grouped = group_for_display(&messages);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].content, "Tool orphan result: ok");
    }
}
