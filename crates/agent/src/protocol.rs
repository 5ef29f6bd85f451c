//! Text tool-call protocol.
//!
//! The model requests a tool by emitting a fenced JSON object anywhere in
//! its free-text output:
//!
//! ````text
//! Thought: I should look this up.
//! ```json
//! { "name": "get_weather", "arguments": { "city": "Rome" } }
//! ```
//! ````
//!
//! `"tool"` is accepted as a synonym for `"name"`. Blocks that fail to parse
//! or carry no name are ordinary text, never errors.
//!
//! Scanning is a small finite scanner over fences (find fence, attempt parse,
//! advance) so the "first valid call wins" rule stays explicit.

use serde_json::{Map, Value};
use stepwise_core::tool::ToolDefinition;

const FENCE: &str = "```";
const THOUGHT_LABEL: &str = "Thought:";
const ACTION_LABEL: &str = "Action:";

/// A tool invocation parsed from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Arguments as compact JSON text.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    /// `name(argsJson)` — the form used for action steps.
    pub fn render(&self) -> String {
        format!("{}({})", self.name, self.arguments_json())
    }
}

/// A fenced block located in a piece of text.
#[derive(Debug, Clone, Copy)]
struct FencedBlock<'a> {
    /// Byte offset of the opening fence.
    start: usize,
    /// Byte offset just past the closing fence.
    end: usize,
    lang: &'a str,
    body: &'a str,
}

impl FencedBlock<'_> {
    /// Untagged or `json`-tagged, with an object-shaped body.
    fn is_json_object(&self) -> bool {
        let body = self.body.trim();
        (self.lang.is_empty() || self.lang.eq_ignore_ascii_case("json"))
            && body.starts_with('{')
            && body.ends_with('}')
    }

    fn tool_call(&self) -> Option<ToolCallRequest> {
        if !self.is_json_object() {
            return None;
        }
        let value: Value = serde_json::from_str(self.body.trim()).ok()?;
        let obj = value.as_object()?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| obj.get("tool").and_then(Value::as_str))?
            .trim();
        if name.is_empty() {
            return None;
        }
        let arguments = match obj.get("arguments") {
            Some(Value::Object(args)) => args.clone(),
            _ => Map::new(),
        };
        Some(ToolCallRequest {
            name: name.to_string(),
            arguments,
        })
    }
}

/// Iterator over the complete fenced blocks of a text, in order.
///
/// An unterminated fence ends the scan. A block whose body is not a JSON
/// object hands its closing fence back to the scanner, so a stray fence in
/// prose cannot pair up with (and hide) the opening fence of a later call.
struct FenceScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> FenceScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for FenceScanner<'a> {
    type Item = FencedBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        let start = self.pos + text.get(self.pos..)?.find(FENCE)?;
        let info_start = start + FENCE.len();

        // The info string runs to the end of the line, or to an inline '{'.
        let info_len = text[info_start..].find(['\n', '{'])?;
        let lang = text[info_start..info_start + info_len].trim();
        let body_start = info_start + info_len;

        let close = body_start + text[body_start..].find(FENCE)?;
        let end = close + FENCE.len();

        let block = FencedBlock {
            start,
            end,
            lang,
            body: &text[body_start..close],
        };
        self.pos = if block.is_json_object() { end } else { close };
        Some(block)
    }
}

/// Whether `text` contains at least one valid tool-call block.
pub fn detect(text: &str) -> bool {
    parse(text).is_some()
}

/// The first valid tool call in `text`.
///
/// Only the first call is executed per model turn even when several are
/// present.
pub fn parse(text: &str) -> Option<ToolCallRequest> {
    FenceScanner::new(text).find_map(|block| block.tool_call())
}

/// Every valid tool call in `text`, in order. Used for history replay.
pub fn parse_all(text: &str) -> Vec<ToolCallRequest> {
    FenceScanner::new(text)
        .filter_map(|block| block.tool_call())
        .collect()
}

/// The `Thought:` segment of `text`, up to the next `Action:`, fence, or end.
pub fn extract_thought(text: &str) -> Option<String> {
    let (start, end) = thought_span(text, 0)?;
    let thought = text[start + THOUGHT_LABEL.len()..end].trim();
    (!thought.is_empty()).then(|| thought.to_string())
}

/// Strip protocol scaffolding from `text`, leaving a best-effort final answer.
///
/// Removes every fenced JSON block, every `Thought:` segment, and bare
/// `Action:` labels, then trims.
pub fn extract_final_answer(text: &str) -> String {
    let mut without_blocks = String::with_capacity(text.len());
    let mut last = 0;
    for block in FenceScanner::new(text).filter(FencedBlock::is_json_object) {
        without_blocks.push_str(&text[last..block.start]);
        last = block.end;
    }
    without_blocks.push_str(&text[last..]);

    let mut without_thoughts = String::with_capacity(without_blocks.len());
    let mut pos = 0;
    while let Some((start, end)) = thought_span(&without_blocks, pos) {
        without_thoughts.push_str(&without_blocks[pos..start]);
        pos = end;
    }
    without_thoughts.push_str(&without_blocks[pos..]);

    without_thoughts.replace(ACTION_LABEL, "").trim().to_string()
}

/// Byte span `[label start, segment end)` of the next thought at or after `from`.
fn thought_span(text: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + text[from..].find(THOUGHT_LABEL)?;
    let after = start + THOUGHT_LABEL.len();
    let rest = &text[after..];
    let len = [rest.find(ACTION_LABEL), rest.find(FENCE)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    Some((start, after + len))
}

/// System prompt section describing the available tools and the call format.
pub fn render_tool_catalog(tools: &[ToolDefinition]) -> String {
    let mut out = String::from("## Tools\n\nYou can call the following tools:\n\n");
    for tool in tools {
        out.push_str(&format!("### {}\n{}\n", tool.name, tool.description));
        out.push_str(&format!("Parameters (JSON Schema): {}\n\n", tool.parameters));
    }
    out.push_str(
        "To call a tool, first explain your reasoning on a line starting with \
         `Thought:`, then output exactly one fenced JSON block:\n\n\
         ```json\n{ \"name\": \"<tool_name>\", \"arguments\": { \"<arg>\": <value> } }\n```\n\n\
         Only the first tool call in a response is executed. The result arrives as a \
         system message `Tool <tool_name> result: <result>`; results starting with \
         `Error:` mean the call failed. When you have enough information, answer the \
         user in plain text without any tool-call block.\n",
    );
    out
}
