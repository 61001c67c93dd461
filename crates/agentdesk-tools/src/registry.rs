//! Tool registry and trait definitions
//!
//! The registry is built once per desk and shared read-only by every
//! session. Invocation checks the calling agent's permitted set before the
//! handler is ever reached.

use agentdesk_core::{Error, Result, SessionKey, Slots, ToolDefinition};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Text(String),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }
    pub fn error(s: impl Into<String>) -> Self { Self::Error(s.into()) }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Error(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool { matches!(self, Self::Error(_)) }
}

/// What a handler sees of the session: identity, the active agent and a
/// read-only view of the carried slots. Slot writes are staged here and
/// merged by the router once the call returns.
pub struct ToolContext<'a> {
    session: &'a SessionKey,
    agent: &'a str,
    slots: &'a Slots,
    updates: Slots,
}

impl<'a> ToolContext<'a> {
    pub fn new(session: &'a SessionKey, agent: &'a str, slots: &'a Slots) -> Self {
        Self {
            session,
            agent,
            slots,
            updates: Slots::new(),
        }
    }

    pub fn session(&self) -> &SessionKey {
        self.session
    }

    pub fn agent(&self) -> &str {
        self.agent
    }

    /// Current value of a slot, including writes staged by this call.
    pub fn slot(&self, key: &str) -> Option<&Value> {
        match self.updates.get(key) {
            Some(Value::Null) => None,
            Some(v) => Some(v),
            None => self.slots.get(key),
        }
    }

    pub fn slot_str(&self, key: &str) -> Option<&str> {
        self.slot(key).and_then(|v| v.as_str())
    }

    pub fn set_slot(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.updates.insert(key.into(), value.into());
    }

    /// Staged as `null`; the merge removes the key.
    pub fn clear_slot(&mut self, key: impl Into<String>) {
        self.updates.insert(key.into(), Value::Null);
    }

    pub fn into_updates(self) -> Slots {
        self.updates
    }
}

/// The Tool trait - implement this to add a new capability.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "schedule_appointment").
    fn name(&self) -> &str;

    /// Human-readable description sent to the reasoning call.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether this tool only reads state (no side effects).
    fn is_read_only(&self) -> bool { false }

    /// Execute the tool. Returning `ToolResult::Error` reports a handler
    /// failure; it is surfaced to the agent, never retried.
    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Who is calling: the session, its active agent and that agent's permitted set.
#[derive(Clone, Copy, Debug)]
pub struct Invocation<'a> {
    pub session: &'a SessionKey,
    pub agent: &'a str,
    pub permitted: &'a BTreeSet<String>,
    pub slots: &'a Slots,
}

/// Successful tool call.
#[derive(Clone, Debug)]
pub struct ToolOutcome {
    pub result: ToolResult,
    /// Staged slot writes; `null` values mean removal.
    pub slot_updates: Slots,
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self { Self::new() }
}

impl ToolRegistry {
    pub fn new() -> Self { Self { tools: HashMap::new() } }

    /// Register a tool. Identifiers are unique.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invoke a tool on behalf of an agent.
    ///
    /// Fails with `UnknownTool` if unregistered, `ToolNotPermitted` if the
    /// agent may not call it (the handler is not reached), `ToolExecution` on
    /// missing required arguments or handler failure, and `Cancelled` if the
    /// token fires first.
    pub async fn invoke(
        &self,
        call: &Invocation<'_>,
        name: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        if !call.permitted.contains(name) {
            warn!(session = %call.session, agent = call.agent, tool = name, "tool not permitted");
            return Err(Error::tool_not_permitted(call.agent, name));
        }

        if let Err(message) = check_required(&tool.input_schema(), &args) {
            return Err(Error::tool_execution(name, message));
        }

        debug!(session = %call.session, agent = call.agent, tool = name, "invoking tool");
        let mut ctx = ToolContext::new(call.session, call.agent, call.slots);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tool.execute(args, &mut ctx) => Some(result),
        };

        match result {
            None => Err(Error::Cancelled),
            Some(ToolResult::Error(message)) => Err(Error::tool_execution(name, message)),
            Some(result) => Ok(ToolOutcome {
                result,
                slot_updates: ctx.into_updates(),
            }),
        }
    }

    /// Definitions for the permitted subset, in name order.
    pub fn definitions_for(&self, permitted: &BTreeSet<String>) -> Vec<ToolDefinition> {
        permitted
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// List only read-only tools.
    pub fn list_read_only(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.iter()
            .filter(|(_, t)| t.is_read_only())
            .map(|(k, _)| k.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// Every name in the schema's `required` list must be present and non-null.
fn check_required(schema: &Value, args: &Value) -> std::result::Result<(), String> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    let missing: Vec<&str> = required
        .iter()
        .filter_map(|r| r.as_str())
        .filter(|key| args.get(*key).map_or(true, |v| v.is_null()))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required argument(s): {}", missing.join(", ")))
    }
}
