//! Initial assessment from the raw ticket only.

use incident_core::{AgentRole, Finding, Ticket};

use super::TriageAgent;

const ASSESSMENT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Default)]
pub struct MainAgent;

impl TriageAgent for MainAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Main
    }

    fn owns(&self, _service: &str) -> bool {
        true
    }

    fn analyze(&self, ticket: &Ticket, _findings_so_far: &[Finding]) -> Finding {
        let payload = ticket.raw_payload();
        let mut summary = format!(
            "Initial assessment: primary error pattern `{}` ({}).\n\
             - Affected service: {}\n- Severity: {}\n",
            ticket.error_code, payload.message, ticket.service, ticket.severity
        );
        if let Some(kind) = payload.kind {
            summary.push_str(&format!("- Error type: {kind}\n"));
        }

        let hypothesis = if ticket.missing_fields().is_empty() {
            format!(
                "{} is rejecting checkout requests; owning domain agents should confirm.",
                ticket.service
            )
        } else {
            format!(
                "request contract drift: {} rejects requests missing {}.",
                ticket.service,
                ticket.missing_fields().join(", ")
            )
        };
        summary.push_str(&format!("Hypothesis: {hypothesis}"));

        Finding::new(AgentRole::Main, &ticket.id, summary, ASSESSMENT_CONFIDENCE)
    }
}
