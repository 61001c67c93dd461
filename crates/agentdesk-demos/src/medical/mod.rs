//! Medical office triage: a front desk routing callers to patient support
//! or billing.

mod store;
mod tools;

pub use store::{format_cents, Appointment, ClinicStore, Reissue};
pub use tools::{ListAppointments, LookupBalance, RecordPayment, ReissuePrescription, ScheduleAppointment};

use crate::prompts::{self, load_prompt};
use agentdesk_agent::{AgentDefinition, Desk, Reasoner, RouterConfig};
use agentdesk_core::Result;
use std::sync::Arc;

pub const TRIAGE: &str = "triage";
pub const SUPPORT: &str = "support";
pub const BILLING: &str = "billing";

pub fn agents() -> Result<Vec<AgentDefinition>> {
    let triage = load_prompt("medical/triage", prompts::MEDICAL_TRIAGE)?;
    let support = load_prompt("medical/support", prompts::MEDICAL_SUPPORT)?;
    let billing = load_prompt("medical/billing", prompts::MEDICAL_BILLING)?;

    Ok(vec![
        AgentDefinition::new(TRIAGE, triage.instructions)
            .with_description(triage.description)
            .with_handoffs([SUPPORT, BILLING]),
        AgentDefinition::new(SUPPORT, support.instructions)
            .with_description(support.description)
            .with_tools(["schedule_appointment", "reissue_prescription", "list_appointments"])
            .with_handoffs([TRIAGE, BILLING]),
        AgentDefinition::new(BILLING, billing.instructions)
            .with_description(billing.description)
            .with_tools(["lookup_balance", "record_payment"])
            .with_handoffs([TRIAGE, SUPPORT]),
    ])
}

pub fn desk(store: Arc<ClinicStore>, config: RouterConfig, reasoner: Arc<dyn Reasoner>) -> Result<Desk> {
    let mut builder = Desk::builder("medical")
        .tool(ScheduleAppointment::new(store.clone()))?
        .tool(ListAppointments::new(store.clone()))?
        .tool(ReissuePrescription::new(store.clone()))?
        .tool(LookupBalance::new(store.clone()))?
        .tool(RecordPayment::new(store))?;
    for agent in agents()? {
        builder = builder.agent(agent)?;
    }
    builder.entry(TRIAGE).config(config).build(reasoner)
}
