//! Medical desk tools

use super::store::{format_cents, ClinicStore};
use agentdesk_tools::{Tool, ToolContext, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;

const PATIENT_SLOT: &str = "patient_name";

/// Patient named in the call, else the one already on file for this session.
/// A name given explicitly is remembered for later calls.
fn resolve_patient(args: &Value, ctx: &mut ToolContext<'_>) -> Option<String> {
    match args.get(PATIENT_SLOT).and_then(|v| v.as_str()).map(str::trim) {
        Some(name) if !name.is_empty() => {
            ctx.set_slot(PATIENT_SLOT, name);
            Some(name.to_string())
        }
        _ => ctx.slot_str(PATIENT_SLOT).map(String::from),
    }
}

fn ask_for_patient() -> ToolResult {
    ToolResult::text("I need the patient's full name first. Ask the caller for it and call again with patient_name.")
}

fn patient_property() -> Value {
    json!({
        "type": "string",
        "description": "Patient's full name. May be omitted once given earlier in the conversation."
    })
}

pub struct ScheduleAppointment {
    store: Arc<ClinicStore>,
}

impl ScheduleAppointment {
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ScheduleAppointment {
    fn name(&self) -> &str {
        "schedule_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment for the patient on a given date."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patient_name": patient_property(),
                "date": { "type": "string", "description": "Requested date, e.g. 2026-11-02" },
                "reason": { "type": "string", "description": "Reason for the visit" }
            },
            "required": ["date", "reason"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(patient) = resolve_patient(&args, ctx) else {
            return ask_for_patient();
        };
        let date = args["date"].as_str().unwrap_or_default();
        let reason = args["reason"].as_str().unwrap_or_default();
        if date.trim().is_empty() {
            return ToolResult::error("date must not be empty");
        }
        let appointment = self.store.schedule(&patient, date, reason).await;
        ToolResult::text(format!(
            "Appointment #{} booked for {} on {} ({}).",
            appointment.id, appointment.patient, appointment.date, appointment.reason
        ))
    }
}

pub struct ListAppointments {
    store: Arc<ClinicStore>,
}

impl ListAppointments {
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ListAppointments {
    fn name(&self) -> &str {
        "list_appointments"
    }

    fn description(&self) -> &str {
        "List the patient's booked appointments."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "patient_name": patient_property() }
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(patient) = resolve_patient(&args, ctx) else {
            return ask_for_patient();
        };
        let appointments = self.store.appointments_for(&patient).await;
        if appointments.is_empty() {
            return ToolResult::text(format!("{} has no appointments booked.", patient));
        }
        let mut out = format!("Appointments for {}:\n", patient);
        for a in appointments {
            out.push_str(&format!("- #{} on {}: {}\n", a.id, a.date, a.reason));
        }
        ToolResult::text(out)
    }
}

pub struct ReissuePrescription {
    store: Arc<ClinicStore>,
}

impl ReissuePrescription {
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ReissuePrescription {
    fn name(&self) -> &str {
        "reissue_prescription"
    }

    fn description(&self) -> &str {
        "Reissue an existing prescription, identified by the drug id on its label."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "drug_id": { "type": "string", "description": "Drug identifier from the label" },
                "patient_name": patient_property()
            },
            "required": ["drug_id"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let drug_id = args["drug_id"].as_str().unwrap_or_default();
        if drug_id.trim().is_empty() {
            return ToolResult::error("drug_id must not be empty");
        }
        let patient = resolve_patient(&args, ctx);
        let reissue = self.store.reissue(drug_id, patient.as_deref()).await;
        ToolResult::text(format!(
            "Prescription {} reissued, reference {}.",
            reissue.drug_id, reissue.reference
        ))
    }
}

pub struct LookupBalance {
    store: Arc<ClinicStore>,
}

impl LookupBalance {
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for LookupBalance {
    fn name(&self) -> &str {
        "lookup_balance"
    }

    fn description(&self) -> &str {
        "Look up the patient's outstanding balance."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "patient_name": patient_property() }
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(patient) = resolve_patient(&args, ctx) else {
            return ask_for_patient();
        };
        let cents = self.store.balance(&patient).await;
        ToolResult::text(format!("{} has an outstanding balance of {}.", patient, format_cents(cents)))
    }
}

pub struct RecordPayment {
    store: Arc<ClinicStore>,
}

impl RecordPayment {
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for RecordPayment {
    fn name(&self) -> &str {
        "record_payment"
    }

    fn description(&self) -> &str {
        "Record a payment against the patient's balance."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patient_name": patient_property(),
                "amount": { "type": "number", "description": "Amount paid, in dollars" }
            },
            "required": ["amount"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(amount) = args["amount"].as_f64() else {
            return ToolResult::error("amount must be a number");
        };
        if !amount.is_finite() || amount <= 0.0 {
            return ToolResult::error("amount must be positive");
        }
        let Some(patient) = resolve_patient(&args, ctx) else {
            return ask_for_patient();
        };
        let cents = (amount * 100.0).round() as i64;
        let remaining = self.store.record_payment(&patient, cents).await;
        ToolResult::text(format!(
            "Payment of {} recorded for {}. Remaining balance: {}.",
            format_cents(cents),
            patient,
            format_cents(remaining)
        ))
    }
}
