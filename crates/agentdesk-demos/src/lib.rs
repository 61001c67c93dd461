//! Agentdesk Demos - the medical office and personal shopper desks

pub mod medical;
pub mod prompts;
pub mod shopper;

use agentdesk_agent::{Desk, Reasoner, RouterConfig};
use agentdesk_core::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeskKind {
    Medical,
    Shopper,
}

impl DeskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Shopper => "shopper",
        }
    }
}

impl fmt::Display for DeskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "medical" | "clinic" => Ok(Self::Medical),
            "shopper" | "shop" => Ok(Self::Shopper),
            other => Err(Error::Configuration(format!(
                "unknown desk '{}' (expected medical or shopper)",
                other
            ))),
        }
    }
}

/// Build a demo desk with a fresh in-memory store.
pub async fn build_desk(
    kind: DeskKind,
    config: RouterConfig,
    reasoner: Arc<dyn Reasoner>,
    seed_orders: bool,
) -> Result<Desk> {
    match kind {
        DeskKind::Medical => medical::desk(Arc::new(medical::ClinicStore::new()), config, reasoner),
        DeskKind::Shopper => {
            let store = Arc::new(shopper::CustomerStore::new());
            if seed_orders {
                store.seed_test_orders().await;
            }
            shopper::desk(store, config, reasoner)
        }
    }
}
