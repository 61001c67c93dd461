//! Desk configuration
//!
//! Loaded from TOML once at startup, read-only afterwards. Every section
//! falls back to defaults so an absent file is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MODEL_ENV: &str = "AGENTDESK_MODEL";
pub const GATEWAY_TOKEN_ENV: &str = "AGENTDESK_GATEWAY_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub llm: LlmConfig,
    pub router: RouterSettings,
    pub fallback: FallbackReplies,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    pub max_tokens: u32,
    /// Override for the provider endpoint (proxies, test servers).
    pub base_url: Option<String>,
    /// Environment variable holding the credential.
    pub api_key_env: String,
    /// Credential given inline. Takes precedence over the environment.
    pub api_key: Option<String>,
    /// Extra attempts after a transient provider failure.
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5-20251001".to_string(),
            max_tokens: 1024,
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            retries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Reasoning calls allowed per user turn.
    pub max_iterations: usize,
    /// Most recent turns sent to the reasoning call. `None` sends everything.
    pub history_window: Option<usize>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            history_window: None,
        }
    }
}

/// Replies used when a turn cannot produce a normal answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackReplies {
    /// Policy violation: invalid handoff or forbidden tool.
    pub apology: String,
    /// Tool/handoff recursion hit the iteration limit.
    pub budget_exceeded: String,
    /// Reasoning call failed or returned something unusable.
    pub failure: String,
}

impl Default for FallbackReplies {
    fn default() -> Self {
        Self {
            apology: "I'm sorry, I can't help with that here. Could you tell me a bit more about what you need?".to_string(),
            budget_exceeded: "I'm sorry, that is taking longer than expected. Could you say that again?".to_string(),
            failure: "I'm sorry, something went wrong on my side. Could you repeat that?".to_string(),
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    18790
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lan" | "0.0.0.0" => BindMode::Lan,
            _ => BindMode::Loopback,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub token: Option<String>,
}

/// Authentication mode
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Token,
    None,
}

impl DeskConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `AGENTDESK_*` environment overrides. Set variables beat the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.is_empty()) {
            self.llm.model = model;
        }
        if let Some(token) = lookup(GATEWAY_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.gateway.auth.token = Some(token);
        }
        self
    }

    /// Resolve the reasoning-call credential. Missing credential is fatal.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.llm.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Configuration(format!("{} not set", self.llm.api_key_env)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.router.max_iterations == 0 {
            return Err(Error::Configuration(
                "router.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.router.history_window == Some(0) {
            return Err(Error::Configuration(
                "router.history_window must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
