//! Incident tickets opened by the alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Severity;
use crate::simulator::FailurePayload;

/// Ticket identifier, formatted `INC-<year>-<seq>`.
pub type TicketId = String;

/// Lifecycle of a ticket. Only the triage orchestrator changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InTriage,
    Resolved,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::InTriage => write!(f, "IN_TRIAGE"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Record of one detected simulated failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub service: String,
    pub error_code: String,
    pub severity: Severity,
    pub opened_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub summary: String,
    pub symptoms: Vec<String>,
    raw_payload: FailurePayload,
}

impl Ticket {
    pub fn new(id: TicketId, severity: Severity, payload: FailurePayload) -> Self {
        let mut symptoms = vec![format!("{}: {}", payload.error_code, payload.message)];
        symptoms.extend(payload.symptoms.iter().cloned());
        Self {
            id,
            service: payload.service.clone(),
            error_code: payload.error_code.clone(),
            severity,
            opened_at: Utc::now(),
            status: TicketStatus::Open,
            summary: format!("Checkout failures affecting {}", payload.service),
            symptoms,
            raw_payload: payload,
        }
    }

    /// The failure payload as observed. Never changes after creation.
    pub fn raw_payload(&self) -> &FailurePayload {
        &self.raw_payload
    }

    /// Fields the backend reported missing, if any.
    pub fn missing_fields(&self) -> &[String] {
        &self.raw_payload.details.missing_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::FailureDetails;

    #[test]
    fn test_ticket_from_payload() {
        let payload = FailurePayload {
            service: "billing".into(),
            error_code: "BILLING_400".into(),
            message: "Missing required field: currency".into(),
            details: FailureDetails {
                missing_fields: vec!["currency".into()],
                extra: Default::default(),
            },
            kind: None,
            rule_id: None,
            symptoms: vec!["High 400 error rate".into()],
            trace_id: "abc".into(),
        };
        let ticket = Ticket::new("INC-2026-0001".into(), Severity::Critical, payload);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.missing_fields(), ["currency".to_string()]);
        assert_eq!(ticket.symptoms.len(), 2);
        assert!(ticket.summary.contains("billing"));
    }

    #[test]
    fn test_status_serializes_upper() {
        let json = serde_json::to_string(&TicketStatus::InTriage).unwrap();
        assert_eq!(json, "\"IN_TRIAGE\"");
    }
}
