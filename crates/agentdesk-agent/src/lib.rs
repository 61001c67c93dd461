//! Agentdesk Agent - agent definitions, session context and the handoff router

pub mod agent;
pub mod desk;
pub mod llm_reasoner;
pub mod reasoner;
pub mod router;
pub mod scripted;
pub mod session;

pub use agent::{AgentDefinition, AgentRegistry};
pub use desk::{Desk, DeskBuilder, SessionRegistry};
pub use llm_reasoner::{LlmReasoner, HANDOFF_TOOL_PREFIX};
pub use reasoner::{Decision, HandoffRequest, HandoffTarget, Reasoner, ReasoningRequest, ToolInvocation};
pub use router::{FallbackReason, Router, RouterConfig, TurnReply, TurnStatus};
pub use scripted::{ScriptStep, ScriptedReasoner};
pub use session::{SessionContext, SessionKey, SessionSnapshot};
pub use tokio_util::sync::CancellationToken;
