//! A desk bundles the agents, tools and reasoner of one deployment; the
//! session registry runs many conversations against it.

use crate::agent::{AgentDefinition, AgentRegistry};
use crate::reasoner::Reasoner;
use crate::router::{Router, RouterConfig, TurnReply};
use crate::session::SessionSnapshot;
use agentdesk_core::{Error, Result, SessionKey};
use agentdesk_tools::{Tool, ToolRegistry};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Immutable after `build`. Cloning shares everything.
#[derive(Clone)]
pub struct Desk {
    name: String,
    entry: String,
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    reasoner: Arc<dyn Reasoner>,
    config: Arc<RouterConfig>,
}

impl Desk {
    pub fn builder(name: impl Into<String>) -> DeskBuilder {
        DeskBuilder::new(name)
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn entry_agent(&self) -> &str { &self.entry }
    pub fn agents(&self) -> &Arc<AgentRegistry> { &self.agents }
    pub fn tools(&self) -> &Arc<ToolRegistry> { &self.tools }
    pub fn config(&self) -> &Arc<RouterConfig> { &self.config }

    /// A fresh router for a new session, starting at the entry agent.
    pub fn open_router(&self, key: SessionKey) -> Result<Router> {
        Router::new(
            key,
            &self.entry,
            self.agents.clone(),
            self.tools.clone(),
            self.reasoner.clone(),
            self.config.clone(),
        )
    }
}

pub struct DeskBuilder {
    name: String,
    entry: Option<String>,
    agents: AgentRegistry,
    tools: ToolRegistry,
    config: RouterConfig,
}

impl DeskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            agents: AgentRegistry::new(),
            tools: ToolRegistry::new(),
            config: RouterConfig::default(),
        }
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    pub fn agent(mut self, agent: AgentDefinition) -> Result<Self> {
        self.agents.register(agent)?;
        Ok(self)
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails if the entry agent is missing, a declared tool or handoff
    /// target is unregistered, or the router settings are unusable.
    pub fn build(self, reasoner: Arc<dyn Reasoner>) -> Result<Desk> {
        let entry = self
            .entry
            .ok_or_else(|| Error::Configuration(format!("desk '{}' has no entry agent", self.name)))?;
        self.agents.resolve(&entry)?;
        self.agents.validate(&self.tools)?;
        self.config.validate()?;

        info!(
            desk = %self.name,
            entry = %entry,
            agents = self.agents.len(),
            tools = self.tools.list().len(),
            "desk ready"
        );
        Ok(Desk {
            name: self.name,
            entry,
            agents: Arc::new(self.agents),
            tools: Arc::new(self.tools),
            reasoner,
            config: Arc::new(self.config),
        })
    }
}

struct SessionSlot {
    router: Mutex<Router>,
    cancel: CancellationToken,
}

/// Live sessions of one desk.
///
/// Turns of one session are serialized by its router lock; different
/// sessions proceed independently.
pub struct SessionRegistry {
    desk: Arc<Desk>,
    sessions: DashMap<SessionKey, Arc<SessionSlot>>,
}

impl SessionRegistry {
    pub fn new(desk: Arc<Desk>) -> Self {
        Self {
            desk,
            sessions: DashMap::new(),
        }
    }

    pub fn desk(&self) -> &Arc<Desk> {
        &self.desk
    }

    /// Open a session under `key`. Opening an existing key is a no-op.
    pub fn open(&self, key: &SessionKey) -> Result<()> {
        if self.sessions.contains_key(key) {
            return Ok(());
        }
        let router = self.desk.open_router(key.clone())?;
        self.sessions.entry(key.clone()).or_insert_with(|| {
            Arc::new(SessionSlot {
                router: Mutex::new(router),
                cancel: CancellationToken::new(),
            })
        });
        Ok(())
    }

    /// Open a session under a generated key.
    pub fn open_new(&self) -> Result<SessionKey> {
        let key = SessionKey::new(uuid::Uuid::new_v4().to_string());
        self.open(&key)?;
        Ok(key)
    }

    fn slot(&self, key: &SessionKey) -> Result<Arc<SessionSlot>> {
        self.sessions
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))
    }

    /// Run one user turn. Waits for any turn already running in this session.
    pub async fn turn(&self, key: &SessionKey, utterance: &str) -> Result<TurnReply> {
        let slot = self.slot(key)?;
        let mut router = slot.router.lock().await;
        router.handle_turn(utterance, &slot.cancel).await
    }

    pub async fn snapshot(&self, key: &SessionKey) -> Result<SessionSnapshot> {
        let slot = self.slot(key)?;
        let router = slot.router.lock().await;
        Ok(router.context().snapshot())
    }

    /// Remove the session and cancel any turn still running in it.
    pub fn close(&self, key: &SessionKey) -> bool {
        match self.sessions.remove(key) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                debug!(session = %key, "session closed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn list(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
