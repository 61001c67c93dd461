//! Error types for Agentdesk

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("duplicate agent: {0}")]
    DuplicateAgent(String),

    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("tool '{tool}' is not permitted for agent '{agent}'")]
    ToolNotPermitted { agent: String, tool: String },

    #[error("invalid handoff: '{from}' cannot hand off to '{to}'")]
    InvalidHandoff { from: String, to: String },

    #[error("tool error: {name} - {message}")]
    ToolExecution { name: String, message: String },

    #[error("turn exceeded {limit} internal iterations")]
    TurnBudgetExceeded { limit: usize },

    #[error("malformed reasoning output: {0}")]
    MalformedDecision(String),

    #[error("reasoning call failed: {0}")]
    Reasoning(String),

    #[error("cancelled")]
    Cancelled,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    pub fn tool_not_permitted(agent: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::ToolNotPermitted {
            agent: agent.into(),
            tool: tool.into(),
        }
    }

    pub fn invalid_handoff(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidHandoff {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn tool_execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Failures that end the current turn with a fallback reply but leave the
    /// session usable. Everything else is either fatal at startup or a
    /// transport-level condition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ToolNotPermitted { .. }
                | Self::InvalidHandoff { .. }
                | Self::UnknownTool(_)
                | Self::ToolExecution { .. }
                | Self::TurnBudgetExceeded { .. }
                | Self::MalformedDecision(_)
                | Self::Reasoning(_)
        )
    }
}
