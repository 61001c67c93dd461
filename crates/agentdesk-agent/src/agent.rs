//! Agent definitions and the process-wide agent registry

use agentdesk_core::{Error, Result};
use agentdesk_tools::ToolRegistry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A named bundle of instructions, permitted tools and handoff targets.
///
/// Instructions are opaque: they are handed to the reasoning call verbatim
/// and never interpreted here.
#[derive(Clone, Debug)]
pub struct AgentDefinition {
    name: String,
    description: String,
    instructions: String,
    tools: BTreeSet<String>,
    handoffs: BTreeSet<String>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            tools: BTreeSet::new(),
            handoffs: BTreeSet::new(),
        }
    }

    /// One-line summary shown to other agents that can hand off here.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.insert(tool.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn with_handoff(mut self, target: impl Into<String>) -> Self {
        self.handoffs.insert(target.into());
        self
    }

    pub fn with_handoffs<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn instructions(&self) -> &str { &self.instructions }
    pub fn tools(&self) -> &BTreeSet<String> { &self.tools }
    pub fn handoffs(&self) -> &BTreeSet<String> { &self.handoffs }

    pub fn can_use(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    pub fn can_hand_off_to(&self, target: &str) -> bool {
        self.handoffs.contains(target)
    }
}

/// Registry of agent definitions. Filled at startup, then shared read-only
/// (behind an `Arc`) by every session.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<AgentDefinition>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: AgentDefinition) -> Result<()> {
        if self.agents.contains_key(agent.name()) {
            return Err(Error::DuplicateAgent(agent.name().to_string()));
        }
        self.agents.insert(agent.name().to_string(), Arc::new(agent));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<AgentDefinition>> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Check the transition table is closed: every declared tool is
    /// registered, every handoff target is a registered agent, and no agent
    /// hands off to itself.
    pub fn validate(&self, tools: &ToolRegistry) -> Result<()> {
        for name in self.list() {
            let agent = &self.agents[name];
            if let Some(tool) = agent.tools().iter().find(|t| !tools.contains(t)) {
                return Err(Error::UnknownTool(format!("{} (declared by agent '{}')", tool, name)));
            }
            for target in agent.handoffs() {
                if target == name {
                    return Err(Error::Configuration(format!(
                        "agent '{}' declares a handoff to itself",
                        name
                    )));
                }
                if !self.contains(target) {
                    return Err(Error::UnknownAgent(format!(
                        "{} (handoff target of agent '{}')",
                        target, name
                    )));
                }
            }
        }
        Ok(())
    }
}
