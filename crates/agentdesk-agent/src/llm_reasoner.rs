//! Reasoner backed by an LLM provider
//!
//! Handoff targets are advertised as `transfer_to_<agent>` tools next to the
//! agent's own tools. The model's first tool call decides; plain text is a
//! reply.

use crate::reasoner::{Decision, HandoffRequest, Reasoner, ReasoningRequest, ToolInvocation};
use agentdesk_core::{Error, LlmConfig, Result, Slots, Speaker, Turn};
use agentdesk_llm::{
    AccumulatedToolCall, ContentBlock, LlmContent, LlmError, LlmMessage, LlmProvider, LlmRequest,
    LlmStream, LlmTool, StreamDelta,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

const RETRY_BACKOFF_MS: u64 = 500;
const MAX_RETRY_WAIT_MS: u64 = 5_000;

pub struct LlmReasoner {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    retries: u32,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
            retries: 1,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self::new(provider, config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_retries(config.retries)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Open the completion stream, retrying transient failures. Nothing has
    /// been streamed yet at this point, so a retry cannot duplicate output.
    async fn open(&self, request: LlmRequest, cancel: &CancellationToken) -> Result<LlmStream> {
        let mut attempt = 0;
        loop {
            match self.provider.complete_stream(request.clone(), Some(cancel.clone())).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let wait = e
                        .retry_after_ms()
                        .unwrap_or(RETRY_BACKOFF_MS * u64::from(attempt))
                        .min(MAX_RETRY_WAIT_MS);
                    warn!(provider = self.provider.name(), attempt, wait_ms = wait, error = %e, "retrying reasoning call");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
                    }
                }
                Err(e) => return Err(map_llm_error(e)),
            }
        }
    }

    fn build_request(&self, request: &ReasoningRequest) -> LlmRequest {
        let tools = advertised_tools(request);
        LlmRequest {
            model: self.model.clone(),
            messages: history_to_messages(&request.history),
            tools: if tools.is_empty() { None } else { Some(tools) },
            max_tokens: Some(self.max_tokens),
            system: Some(system_prompt(request)),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl Reasoner for LlmReasoner {
    async fn decide(&self, request: ReasoningRequest, cancel: &CancellationToken) -> Result<Decision> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let llm_request = self.build_request(&request);
        let mut stream = self.open(llm_request, cancel).await?;

        let mut text = String::new();
        let mut tool_calls: Vec<AccumulatedToolCall> = Vec::new();
        let mut current_tool: Option<AccumulatedToolCall> = None;

        loop {
            let delta = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                delta = stream.next() => delta,
            };
            match delta {
                Some(Ok(StreamDelta::Text(t))) => text.push_str(&t),
                Some(Ok(StreamDelta::Thinking(_))) => {}
                Some(Ok(StreamDelta::ToolCallStart { id, name })) => {
                    current_tool = Some(AccumulatedToolCall { id, name, arguments: String::new() });
                }
                Some(Ok(StreamDelta::ToolCallDelta { arguments, .. })) => {
                    if let Some(ref mut tool) = current_tool {
                        tool.arguments.push_str(&arguments);
                    }
                }
                Some(Ok(StreamDelta::ToolCallEnd { .. })) => {
                    if let Some(tool) = current_tool.take() {
                        tool_calls.push(tool);
                    }
                }
                Some(Ok(StreamDelta::Done { stop_reason, usage })) => {
                    debug!(agent = %request.agent, ?stop_reason, ?usage, "reasoning call finished");
                }
                Some(Ok(StreamDelta::Error(e))) => return Err(Error::Reasoning(e)),
                Some(Err(e)) => return Err(map_llm_error(e)),
                None => break,
            }
        }

        decode(&text, &tool_calls)
    }
}

fn map_llm_error(error: LlmError) -> Error {
    match error {
        LlmError::Cancelled => Error::Cancelled,
        other => Error::Reasoning(other.to_string()),
    }
}

/// Turn one model response into a decision.
pub(crate) fn decode(text: &str, tool_calls: &[AccumulatedToolCall]) -> Result<Decision> {
    if let Some(call) = tool_calls.first() {
        if tool_calls.len() > 1 {
            debug!(kept = %call.name, dropped = tool_calls.len() - 1, "ignoring extra tool calls");
        }
        let arguments = call
            .parse_arguments()
            .map_err(|e| Error::MalformedDecision(format!("arguments for '{}': {}", call.name, e)))?;

        if let Some(target) = call.name.strip_prefix(HANDOFF_TOOL_PREFIX) {
            let reason = arguments
                .get("reason")
                .and_then(|r| r.as_str())
                .map(String::from);
            let carry: Slots = arguments
                .get("context")
                .and_then(|c| c.as_object())
                .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            return Ok(Decision::Handoff(HandoffRequest {
                target: target.to_string(),
                reason,
                carry,
            }));
        }

        return Ok(Decision::CallTool(ToolInvocation {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }));
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(Error::MalformedDecision("empty response".into()));
    }
    Ok(Decision::Reply(text.to_string()))
}

fn system_prompt(request: &ReasoningRequest) -> String {
    let mut prompt = request.instructions.trim().to_string();
    prompt.push_str(&format!("\n\nYou are currently acting as the '{}' agent.", request.agent));
    if !request.handoffs.is_empty() {
        prompt.push_str(&format!(
            " If the caller needs another agent, call the matching {}<agent> tool instead of answering.",
            HANDOFF_TOOL_PREFIX
        ));
    }
    if !request.slots.is_empty() {
        prompt.push_str("\n\nKnown about the caller:");
        for (key, value) in &request.slots {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            prompt.push_str(&format!("\n- {}: {}", key, value));
        }
    }
    prompt
}

fn advertised_tools(request: &ReasoningRequest) -> Vec<LlmTool> {
    let own = request.tools.iter().map(|t| LlmTool {
        name: t.name.clone(),
        description: t.description.clone(),
        input_schema: t.input_schema.clone(),
    });
    let transfers = request.handoffs.iter().map(|target| LlmTool {
        name: format!("{}{}", HANDOFF_TOOL_PREFIX, target.name),
        description: if target.description.is_empty() {
            format!("Transfer the caller to the {} agent.", target.name)
        } else {
            format!("Transfer the caller to the {} agent: {}", target.name, target.description)
        },
        input_schema: json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Why the caller is being transferred" },
                "context": { "type": "object", "description": "Facts the next agent should know" }
            }
        }),
    });
    own.chain(transfers).collect()
}

/// Map history onto alternating LLM messages. Consecutive turns with the
/// same role are merged into one message.
pub(crate) fn history_to_messages(history: &[Turn]) -> Vec<LlmMessage> {
    let mut messages: Vec<LlmMessage> = Vec::new();
    for turn in history {
        let (role, block) = match (turn.speaker, &turn.tool) {
            (Speaker::User, _) => ("user", ContentBlock::Text { text: turn.content.clone() }),
            (Speaker::Agent, Some(tool)) => (
                "assistant",
                ContentBlock::ToolUse {
                    id: tool.call_id.clone(),
                    name: tool.name.clone(),
                    input: tool.arguments.clone(),
                },
            ),
            (Speaker::Agent, None) => ("assistant", ContentBlock::Text { text: turn.content.clone() }),
            (Speaker::Tool, Some(tool)) => (
                "user",
                ContentBlock::ToolResult {
                    tool_use_id: tool.call_id.clone(),
                    content: turn.content.clone(),
                    is_error: tool.is_error.then_some(true),
                },
            ),
            (Speaker::Tool, None) => continue,
            (Speaker::System, _) => ("user", ContentBlock::Text { text: format!("[{}]", turn.content) }),
        };
        if matches!(&block, ContentBlock::Text { text } if text.is_empty()) {
            continue;
        }

        match messages.last_mut() {
            Some(last) if last.role == role => {
                let mut blocks = match std::mem::replace(&mut last.content, LlmContent::Blocks(Vec::new())) {
                    LlmContent::Text(text) => vec![ContentBlock::Text { text }],
                    LlmContent::Blocks(blocks) => blocks,
                };
                blocks.push(block);
                last.content = LlmContent::Blocks(blocks);
            }
            _ => {
                let content = match block {
                    ContentBlock::Text { text } => LlmContent::Text(text),
                    other => LlmContent::Blocks(vec![other]),
                };
                messages.push(LlmMessage { role: role.to_string(), content });
            }
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> AccumulatedToolCall {
        AccumulatedToolCall { id: "t1".into(), name: name.into(), arguments: arguments.into() }
    }

    #[test]
    fn text_only_is_reply() {
        assert_eq!(decode("  Hello there ", &[]).unwrap(), Decision::reply("Hello there"));
    }

    #[test]
    fn empty_response_is_malformed() {
        assert!(matches!(decode("   ", &[]), Err(Error::MalformedDecision(_))));
    }

    #[test]
    fn transfer_tool_is_handoff() {
        let decision = decode(
            "one moment",
            &[call("transfer_to_billing", r#"{"reason":"invoice","context":{"topic":"bill"}}"#)],
        )
        .unwrap();
        match decision {
            Decision::Handoff(h) => {
                assert_eq!(h.target, "billing");
                assert_eq!(h.reason.as_deref(), Some("invoice"));
                assert_eq!(h.carry["topic"], "bill");
            }
            other => panic!("Expected Handoff, got {:?}", other),
        }
    }

    #[test]
    fn first_tool_call_wins() {
        let decision = decode(
            "",
            &[call("lookup_balance", ""), call("transfer_to_support", "{}")],
        )
        .unwrap();
        assert!(matches!(decision, Decision::CallTool(ref c) if c.name == "lookup_balance" && c.arguments == json!({})));
    }

    #[test]
    fn bad_arguments_are_malformed() {
        assert!(matches!(
            decode("", &[call("record_payment", "{oops")]),
            Err(Error::MalformedDecision(_))
        ));
    }

    #[test]
    fn history_maps_tool_turns_to_blocks() {
        let history = vec![
            Turn::user("what do I owe?"),
            Turn::system("billing", "handoff triage -> billing"),
            Turn::tool_call("billing", "c1", "lookup_balance", json!({})),
            Turn::tool_result("billing", "c1", "lookup_balance", "$40", false),
            Turn::reply("billing", "You owe $40."),
        ];
        let messages = history_to_messages(&history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "user");
        match &messages[0].content {
            LlmContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("Expected merged blocks, got {:?}", other),
        }
        assert_eq!(messages[1].role, "assistant");
        assert!(matches!(&messages[1].content, LlmContent::Blocks(b) if matches!(b[0], ContentBlock::ToolUse { .. })));
        assert_eq!(messages[2].role, "user");
        assert!(matches!(&messages[3].content, LlmContent::Text(t) if t == "You owe $40."));
    }
}
