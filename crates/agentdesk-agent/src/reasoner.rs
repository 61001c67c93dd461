//! The reasoning boundary: given the active agent and the conversation so far,
//! decide what happens next.

use agentdesk_core::{Result, SessionKey, Slots, ToolDefinition, Turn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// An agent another agent may hand off to.
#[derive(Clone, Debug, PartialEq)]
pub struct HandoffTarget {
    pub name: String,
    pub description: String,
}

/// Everything one reasoning call sees.
#[derive(Clone, Debug)]
pub struct ReasoningRequest {
    pub session: SessionKey,
    pub agent: String,
    pub instructions: String,
    /// Only the active agent's permitted tools.
    pub tools: Vec<ToolDefinition>,
    pub handoffs: Vec<HandoffTarget>,
    pub history: Vec<Turn>,
    pub slots: Slots,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandoffRequest {
    pub target: String,
    pub reason: Option<String>,
    /// Slots merged into the session when the handoff is accepted.
    pub carry: Slots,
}

impl HandoffRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: None,
            carry: Slots::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_slot(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.carry.insert(key.into(), value.into());
        self
    }
}

/// Exactly one of: answer the user, call a tool, or hand off.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Reply(String),
    CallTool(ToolInvocation),
    Handoff(HandoffRequest),
}

impl Decision {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    pub fn call_tool(name: impl Into<String>, arguments: Value) -> Self {
        Self::CallTool(ToolInvocation {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        })
    }

    pub fn handoff(target: impl Into<String>) -> Self {
        Self::Handoff(HandoffRequest::new(target))
    }
}

/// Pluggable decision maker. Implementations must be shareable across
/// sessions; per-session state lives in the request.
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    /// Returns `Error::Cancelled` if the token fires first,
    /// `Error::MalformedDecision` for unusable output and `Error::Reasoning`
    /// for anything else that went wrong.
    async fn decide(&self, request: ReasoningRequest, cancel: &CancellationToken) -> Result<Decision>;
}
