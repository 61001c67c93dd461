//! LLM types for requests and streaming responses

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// LLM request
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<LlmTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5-20251001".to_string(),
            messages: Vec::new(),
            tools: None,
            max_tokens: Some(1024),
            temperature: None,
            system: None,
        }
    }
}

/// Message in LLM conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: LlmContent,
}

impl LlmMessage {
    pub fn user(content: impl Into<LlmContent>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<LlmContent>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Message content - can be string or array of blocks
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl From<String> for LlmContent {
    fn from(s: String) -> Self { LlmContent::Text(s) }
}

impl From<&str> for LlmContent {
    fn from(s: &str) -> Self { LlmContent::Text(s.to_string()) }
}

impl From<Vec<ContentBlock>> for LlmContent {
    fn from(blocks: Vec<ContentBlock>) -> Self { LlmContent::Blocks(blocks) }
}

/// Content block types
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Streaming delta from LLM
#[derive(Clone, Debug)]
pub enum StreamDelta {
    Text(String),
    Thinking(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    ToolCallEnd { id: String },
    Done { stop_reason: Option<String>, usage: Option<Usage> },
    Error(String),
}

/// Token usage
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Accumulated tool call from streaming
#[derive(Clone, Debug, Default)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl AccumulatedToolCall {
    /// Empty argument text is an empty object (tools without parameters).
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Drop `tool_use` blocks that have no matching `tool_result` anywhere later
/// in the conversation (and vice versa). The API rejects unpaired blocks, and
/// a cancelled turn can leave one behind. Messages left empty are removed.
pub fn heal_tool_pairs(messages: &[LlmMessage]) -> Vec<LlmMessage> {
    let mut uses = HashSet::new();
    let mut results = HashSet::new();
    for message in messages {
        if let LlmContent::Blocks(blocks) = &message.content {
            for block in blocks {
                match block {
                    ContentBlock::ToolUse { id, .. } => {
                        uses.insert(id.clone());
                    }
                    ContentBlock::ToolResult { tool_use_id, .. } => {
                        results.insert(tool_use_id.clone());
                    }
                    ContentBlock::Text { .. } => {}
                }
            }
        }
    }

    messages
        .iter()
        .filter_map(|message| match &message.content {
            LlmContent::Text(_) => Some(message.clone()),
            LlmContent::Blocks(blocks) => {
                let kept: Vec<ContentBlock> = blocks
                    .iter()
                    .filter(|block| match block {
                        ContentBlock::ToolUse { id, .. } => results.contains(id),
                        ContentBlock::ToolResult { tool_use_id, .. } => uses.contains(tool_use_id),
                        ContentBlock::Text { .. } => true,
                    })
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(LlmMessage {
                        role: message.role.clone(),
                        content: LlmContent::Blocks(kept),
                    })
                }
            }
        })
        .collect()
}
