//! Agent prompts, embedded at compile time from `prompts/*.yaml`

use agentdesk_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Prompt {
    pub instructions: String,
    #[serde(default)]
    pub description: String,
}

pub const MEDICAL_TRIAGE: &str = include_str!("../prompts/medical/triage.yaml");
pub const MEDICAL_SUPPORT: &str = include_str!("../prompts/medical/support.yaml");
pub const MEDICAL_BILLING: &str = include_str!("../prompts/medical/billing.yaml");

pub const SHOPPER_TRIAGE: &str = include_str!("../prompts/shopper/triage.yaml");
pub const SHOPPER_SALES: &str = include_str!("../prompts/shopper/sales.yaml");
pub const SHOPPER_RETURNS: &str = include_str!("../prompts/shopper/returns.yaml");

/// Parse a prompt file. A file without usable `instructions` is a
/// configuration error.
pub fn load_prompt(name: &str, yaml: &str) -> Result<Prompt> {
    let prompt: Prompt = serde_yaml::from_str(yaml)
        .map_err(|e| Error::Configuration(format!("prompt '{}': {}", name, e)))?;
    if prompt.instructions.trim().is_empty() {
        return Err(Error::Configuration(format!("prompt '{}' has empty instructions", name)));
    }
    Ok(prompt)
}
