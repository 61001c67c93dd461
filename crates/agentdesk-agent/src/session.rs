//! Per-session conversation state

use crate::agent::AgentDefinition;
use agentdesk_core::{Slots, Speaker, Turn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub use agentdesk_core::SessionKey;

/// Everything one session knows: the active agent, the append-only history
/// and the carried slots.
///
/// Only the router mutates a context, and only one turn runs against it at a
/// time, so the mutators are crate-private and need no interior locking.
#[derive(Debug)]
pub struct SessionContext {
    key: SessionKey,
    active_agent: Arc<AgentDefinition>,
    previous_agent: Option<String>,
    history: Vec<Turn>,
    slots: Slots,
    created_at: DateTime<Utc>,
}

impl SessionContext {
    pub(crate) fn new(key: SessionKey, entry: Arc<AgentDefinition>) -> Self {
        info!(session = %key, agent = entry.name(), "session context created");
        Self {
            key,
            active_agent: entry,
            previous_agent: None,
            history: Vec::new(),
            slots: Slots::new(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &SessionKey { &self.key }
    pub fn active_agent(&self) -> &Arc<AgentDefinition> { &self.active_agent }
    pub fn active_agent_name(&self) -> &str { self.active_agent.name() }
    pub fn previous_agent(&self) -> Option<&str> { self.previous_agent.as_deref() }
    pub fn history(&self) -> &[Turn] { &self.history }
    pub fn slots(&self) -> &Slots { &self.slots }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn slot(&self, key: &str) -> Option<&Value> {
        self.slots.get(key)
    }

    /// The tail of the history handed to the reasoner.
    ///
    /// With a window, the slice always reaches back to the latest user turn,
    /// so the current utterance is never cut off mid-turn, and it never
    /// starts on a tool turn: a tool result without its call is meaningless
    /// to the reasoner.
    pub fn recent_history(&self, window: Option<usize>) -> Vec<Turn> {
        let Some(window) = window else {
            return self.history.clone();
        };
        let mut start = self.history.len().saturating_sub(window);
        if let Some(last_user) = self.history.iter().rposition(|t| t.speaker == Speaker::User) {
            start = start.min(last_user);
        }
        self.history[start..]
            .iter()
            .skip_while(|t| t.speaker == Speaker::Tool || t.is_tool_call())
            .cloned()
            .collect()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Merge slot writes; `null` removes the key.
    pub(crate) fn merge_slots(&mut self, updates: Slots) {
        for (key, value) in updates {
            if value.is_null() {
                self.slots.remove(&key);
            } else {
                self.slots.insert(key, value);
            }
        }
    }

    /// Make `target` the active agent and record the transition in history.
    pub(crate) fn switch_agent(
        &mut self,
        target: Arc<AgentDefinition>,
        carry: Slots,
        reason: Option<&str>,
    ) {
        let from = self.active_agent.name().to_string();
        let note = match reason {
            Some(reason) if !reason.trim().is_empty() => {
                format!("handoff {} -> {}: {}", from, target.name(), reason.trim())
            }
            _ => format!("handoff {} -> {}", from, target.name()),
        };
        self.merge_slots(carry);
        self.history.push(Turn::system(target.name(), note));
        self.active_agent = target;
        self.previous_agent = Some(from);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.key.to_string(),
            active_agent: self.active_agent.name().to_string(),
            previous_agent: self.previous_agent.clone(),
            history: self.history.clone(),
            slots: self.slots.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable copy of a session, for inspection endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub session: String,
    pub active_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_agent: Option<String>,
    pub history: Vec<Turn>,
    pub slots: Slots,
    pub created_at: DateTime<Utc>,
}
