//! In-memory clinic records shared by the medical desk's tools

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Appointment {
    pub id: u64,
    pub patient: String,
    pub date: String,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Reissue {
    pub reference: String,
    pub drug_id: String,
    pub patient: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct Records {
    appointments: Vec<Appointment>,
    reissues: Vec<Reissue>,
    /// Outstanding balance per patient, in cents.
    balances: HashMap<String, i64>,
    next_appointment: u64,
}

#[derive(Default)]
pub struct ClinicStore {
    records: RwLock<Records>,
}

/// Patient names are matched case-insensitively.
fn patient_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn schedule(&self, patient: &str, date: &str, reason: &str) -> Appointment {
        let mut records = self.records.write().await;
        records.next_appointment += 1;
        let appointment = Appointment {
            id: records.next_appointment,
            patient: patient.trim().to_string(),
            date: date.trim().to_string(),
            reason: reason.trim().to_string(),
        };
        records.appointments.push(appointment.clone());
        info!(id = appointment.id, patient = %appointment.patient, "appointment scheduled");
        appointment
    }

    pub async fn appointments_for(&self, patient: &str) -> Vec<Appointment> {
        let key = patient_key(patient);
        self.records
            .read()
            .await
            .appointments
            .iter()
            .filter(|a| patient_key(&a.patient) == key)
            .cloned()
            .collect()
    }

    pub async fn reissue(&self, drug_id: &str, patient: Option<&str>) -> Reissue {
        let mut records = self.records.write().await;
        let reissue = Reissue {
            reference: format!("RX-{:04}", records.reissues.len() + 1),
            drug_id: drug_id.trim().to_string(),
            patient: patient.map(|p| p.trim().to_string()),
            at: Utc::now(),
        };
        records.reissues.push(reissue.clone());
        info!(reference = %reissue.reference, drug = %reissue.drug_id, "prescription reissued");
        reissue
    }

    pub async fn reissues(&self) -> Vec<Reissue> {
        self.records.read().await.reissues.clone()
    }

    pub async fn set_balance(&self, patient: &str, cents: i64) {
        self.records
            .write()
            .await
            .balances
            .insert(patient_key(patient), cents);
    }

    /// Unknown patients owe nothing.
    pub async fn balance(&self, patient: &str) -> i64 {
        self.records
            .read()
            .await
            .balances
            .get(&patient_key(patient))
            .copied()
            .unwrap_or(0)
    }

    /// Apply a payment and return the remaining balance. Overpayment leaves a
    /// credit (negative balance).
    pub async fn record_payment(&self, patient: &str, cents: i64) -> i64 {
        let mut records = self.records.write().await;
        let balance = records.balances.entry(patient_key(patient)).or_insert(0);
        *balance -= cents;
        info!(patient = patient.trim(), paid = cents, remaining = *balance, "payment recorded");
        *balance
    }
}

/// `1234` cents renders as `$12.34`; credits get a leading minus.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(4050), "$40.50");
        assert_eq!(format_cents(-5), "-$0.05");
    }

    #[tokio::test]
    async fn patients_match_case_insensitively() {
        let store = ClinicStore::new();
        store.schedule("Jane Doe", "2026-11-02", "checkup").await;
        assert_eq!(store.appointments_for("jane doe ").await.len(), 1);

        store.set_balance("Jane Doe", 12000).await;
        assert_eq!(store.record_payment("JANE DOE", 2000).await, 10000);
        assert_eq!(store.balance("jane doe").await, 10000);
    }
}
