//! The handoff router - one user turn, end to end
//!
//! A turn loops over reasoning calls until the active agent replies. Tool
//! calls and accepted handoffs feed back into the loop; policy violations
//! and reasoning failures end the turn with a fallback reply. Only
//! cancellation surfaces as an error.

use crate::agent::{AgentDefinition, AgentRegistry};
use crate::reasoner::{Decision, HandoffRequest, HandoffTarget, Reasoner, ReasoningRequest, ToolInvocation};
use crate::session::SessionContext;
use agentdesk_core::{DeskConfig, Error, FallbackReplies, Result, SessionKey, Turn};
use agentdesk_tools::{Invocation, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Reasoning calls allowed per user turn.
    pub max_iterations: usize,
    pub history_window: Option<usize>,
    pub fallback: FallbackReplies,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            history_window: None,
            fallback: FallbackReplies::default(),
        }
    }
}

impl From<&DeskConfig> for RouterConfig {
    fn from(config: &DeskConfig) -> Self {
        Self {
            max_iterations: config.router.max_iterations,
            history_window: config.router.history_window,
            fallback: config.fallback.clone(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Configuration("max_iterations must be at least 1".into()));
        }
        if self.history_window == Some(0) {
            return Err(Error::Configuration("history_window must be at least 1".into()));
        }
        Ok(())
    }
}

/// Why a turn ended with a fallback reply instead of the agent's own answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    InvalidHandoff,
    ToolNotPermitted,
    UnknownTool,
    TurnBudgetExceeded,
    MalformedDecision,
    ReasoningFailed,
}

impl FallbackReason {
    fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidHandoff { .. } | Error::UnknownAgent(_) => Self::InvalidHandoff,
            Error::ToolNotPermitted { .. } => Self::ToolNotPermitted,
            Error::UnknownTool(_) => Self::UnknownTool,
            Error::TurnBudgetExceeded { .. } => Self::TurnBudgetExceeded,
            Error::MalformedDecision(_) => Self::MalformedDecision,
            _ => Self::ReasoningFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidHandoff => "invalid_handoff",
            Self::ToolNotPermitted => "tool_not_permitted",
            Self::UnknownTool => "unknown_tool",
            Self::TurnBudgetExceeded => "turn_budget_exceeded",
            Self::MalformedDecision => "malformed_decision",
            Self::ReasoningFailed => "reasoning_failed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Fallback(FallbackReason),
}

/// What the user hears at the end of a turn.
#[derive(Clone, Debug, Serialize)]
pub struct TurnReply {
    pub text: String,
    /// Agent active when the turn ended.
    pub agent: String,
    /// Agent active when the turn started.
    pub started_with: String,
    pub status: TurnStatus,
    /// Reasoning calls made during the turn.
    pub iterations: usize,
}

impl TurnReply {
    pub fn is_fallback(&self) -> bool {
        matches!(self.status, TurnStatus::Fallback(_))
    }

    /// `(from, to)` when the turn left the caller with a different agent.
    pub fn handoff(&self) -> Option<(&str, &str)> {
        (self.started_with != self.agent).then(|| (self.started_with.as_str(), self.agent.as_str()))
    }
}

enum Step {
    Continue,
    Done(TurnReply),
}

/// Drives one session. Shared registries are read-only; the session context
/// is owned exclusively.
pub struct Router {
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    reasoner: Arc<dyn Reasoner>,
    config: Arc<RouterConfig>,
    context: SessionContext,
}

impl Router {
    pub fn new(
        key: SessionKey,
        entry_agent: &str,
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        reasoner: Arc<dyn Reasoner>,
        config: Arc<RouterConfig>,
    ) -> Result<Self> {
        let entry = agents.resolve(entry_agent)?;
        Ok(Self {
            agents,
            tools,
            reasoner,
            config,
            context: SessionContext::new(key, entry),
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn active_agent(&self) -> &str {
        self.context.active_agent_name()
    }

    /// Run one user turn to completion.
    ///
    /// History is append-only: whatever was appended before a cancellation
    /// stays, and the active agent only changes through accepted handoffs.
    pub async fn handle_turn(&mut self, utterance: &str, cancel: &CancellationToken) -> Result<TurnReply> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.context.push(Turn::user(utterance));
        let started_with = self.active_agent().to_string();
        debug!(session = %self.context.key(), agent = self.active_agent(), "turn started");

        for iteration in 1..=self.config.max_iterations {
            let agent = self.context.active_agent().clone();
            let request = self.reasoning_request(&agent);

            let decision = match self.reasoner.decide(request, cancel).await {
                Ok(decision) => decision,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => return Ok(self.fallback(e, iteration, &started_with)),
            };

            let step = match decision {
                Decision::Reply(text) => {
                    self.context.push(Turn::reply(agent.name(), text.clone()));
                    Step::Done(TurnReply {
                        text,
                        agent: agent.name().to_string(),
                        started_with: started_with.clone(),
                        status: TurnStatus::Completed,
                        iterations: iteration,
                    })
                }
                Decision::CallTool(call) => match self.call_tool(&agent, call, cancel).await {
                    Ok(()) => Step::Continue,
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => Step::Done(self.fallback(e, iteration, &started_with)),
                },
                Decision::Handoff(request) => match self.handoff(&agent, request) {
                    Ok(()) => Step::Continue,
                    Err(e) => Step::Done(self.fallback(e, iteration, &started_with)),
                },
            };

            if let Step::Done(reply) = step {
                info!(
                    session = %self.context.key(),
                    agent = %reply.agent,
                    iterations = reply.iterations,
                    fallback = reply.is_fallback(),
                    "turn complete"
                );
                return Ok(reply);
            }
        }

        let limit = self.config.max_iterations;
        Ok(self.fallback(Error::TurnBudgetExceeded { limit }, limit, &started_with))
    }

    fn reasoning_request(&self, agent: &AgentDefinition) -> ReasoningRequest {
        let handoffs = agent
            .handoffs()
            .iter()
            .map(|name| HandoffTarget {
                name: name.clone(),
                description: self
                    .agents
                    .resolve(name)
                    .map(|a| a.description().to_string())
                    .unwrap_or_default(),
            })
            .collect();

        ReasoningRequest {
            session: self.context.key().clone(),
            agent: agent.name().to_string(),
            instructions: agent.instructions().to_string(),
            tools: self.tools.definitions_for(agent.tools()),
            handoffs,
            history: self.context.recent_history(self.config.history_window),
            slots: self.context.slots().clone(),
        }
    }

    /// Run a tool for the active agent. Handler failures are recorded as
    /// error results and the turn continues; permission and lookup failures
    /// end the turn.
    async fn call_tool(
        &mut self,
        agent: &AgentDefinition,
        call: ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let outcome = {
            let invocation = Invocation {
                session: self.context.key(),
                agent: agent.name(),
                permitted: agent.tools(),
                slots: self.context.slots(),
            };
            self.tools
                .invoke(&invocation, &call.name, call.arguments.clone(), cancel)
                .await
        };

        let (content, is_error, updates) = match outcome {
            Ok(outcome) => (outcome.result.to_content_string(), false, outcome.slot_updates),
            Err(Error::ToolExecution { message, .. }) => {
                warn!(session = %self.context.key(), agent = agent.name(), tool = %call.name, %message, "tool failed");
                (message, true, Default::default())
            }
            Err(e) => return Err(e),
        };

        self.context
            .push(Turn::tool_call(agent.name(), &call.id, &call.name, call.arguments));
        self.context
            .push(Turn::tool_result(agent.name(), &call.id, &call.name, content, is_error));
        self.context.merge_slots(updates);
        Ok(())
    }

    /// Accept a handoff only along a declared edge to a registered agent.
    fn handoff(&mut self, from: &AgentDefinition, request: HandoffRequest) -> Result<()> {
        if !from.can_hand_off_to(&request.target) {
            warn!(session = %self.context.key(), from = from.name(), to = %request.target, "handoff not declared");
            return Err(Error::invalid_handoff(from.name(), &request.target));
        }
        let target = self.agents.resolve(&request.target).map_err(|_| {
            warn!(session = %self.context.key(), from = from.name(), to = %request.target, "handoff target not registered");
            Error::invalid_handoff(from.name(), &request.target)
        })?;

        info!(session = %self.context.key(), from = from.name(), to = target.name(), "handoff");
        self.context
            .switch_agent(target, request.carry, request.reason.as_deref());
        Ok(())
    }

    /// End the turn with a canned reply. The active agent is left unchanged.
    fn fallback(&mut self, error: Error, iterations: usize, started_with: &str) -> TurnReply {
        let reason = FallbackReason::from_error(&error);
        if error.is_recoverable() {
            warn!(
                session = %self.context.key(),
                agent = self.active_agent(),
                reason = reason.as_str(),
                error = %error,
                "turn ended with fallback"
            );
        } else {
            // A reasoner or tool raised something outside the turn taxonomy
            error!(
                session = %self.context.key(),
                agent = self.active_agent(),
                error = %error,
                "unexpected error, turn ended with fallback"
            );
        }
        let text = match reason {
            FallbackReason::InvalidHandoff
            | FallbackReason::ToolNotPermitted
            | FallbackReason::UnknownTool => &self.config.fallback.apology,
            FallbackReason::TurnBudgetExceeded => &self.config.fallback.budget_exceeded,
            FallbackReason::MalformedDecision | FallbackReason::ReasoningFailed => {
                &self.config.fallback.failure
            }
        }
        .clone();

        let agent = self.active_agent().to_string();
        self.context.push(Turn::reply(&agent, text.clone()));
        TurnReply {
            text,
            agent,
            started_with: started_with.to_string(),
            status: TurnStatus::Fallback(reason),
            iterations,
        }
    }
}
