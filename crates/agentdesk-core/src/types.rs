//! Core types for Agentdesk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Carried context slots (e.g. a resolved customer id).
pub type Slots = BTreeMap<String, serde_json::Value>;

/// Who produced a turn in the conversation history.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
    Tool,
    System,
}

/// Tool call details attached to tool-call and tool-result turns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolTrace {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

/// One entry of the append-only conversation history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    /// Agent that was active when the turn was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolTrace>,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(speaker: Speaker, agent: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            speaker,
            agent: agent.map(String::from),
            content: content.into(),
            tool: None,
            at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, None, content)
    }

    pub fn reply(agent: &str, content: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, Some(agent), content)
    }

    pub fn system(agent: &str, content: impl Into<String>) -> Self {
        Self::new(Speaker::System, Some(agent), content)
    }

    /// The agent asked for a tool; content is left empty.
    pub fn tool_call(
        agent: &str,
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        let mut turn = Self::new(Speaker::Agent, Some(agent), "");
        turn.tool = Some(ToolTrace {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
            is_error: false,
        });
        turn
    }

    pub fn tool_result(
        agent: &str,
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let mut turn = Self::new(Speaker::Tool, Some(agent), content);
        turn.tool = Some(ToolTrace {
            call_id: call_id.into(),
            name: name.into(),
            arguments: serde_json::Value::Null,
            is_error,
        });
        turn
    }

    pub fn is_tool_call(&self) -> bool {
        self.speaker == Speaker::Agent && self.tool.is_some()
    }

    /// A reply the user actually hears.
    pub fn is_user_visible_reply(&self) -> bool {
        self.speaker == Speaker::Agent && self.tool.is_none()
    }
}

/// Tool description surfaced to the reasoning call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}
