//! Incident commander for a triage call.
//!
//! The chair decides who speaks next and words the call narration from
//! its runbook's response templates. It never produces findings and never
//! touches the state machine directly; the orchestrator does that.

use std::collections::BTreeMap;

use incident_core::runbook::SharedRunbookStore;
use incident_core::{AgentRole, Finding, Ticket, TriageCall};

pub struct ChairAgent {
    runbooks: SharedRunbookStore,
    routing: BTreeMap<String, Vec<AgentRole>>,
}

impl ChairAgent {
    pub fn new(runbooks: SharedRunbookStore, routing: BTreeMap<String, Vec<AgentRole>>) -> Self {
        Self { runbooks, routing }
    }

    /// Roles consulted while ASSESSING, in order.
    pub fn opening_sequence(&self) -> [AgentRole; 2] {
        [AgentRole::Main, AgentRole::Sre]
    }

    /// Domain roles consulted while DIAGNOSING. Unknown services route nowhere.
    pub fn route(&self, ticket: &Ticket) -> Vec<AgentRole> {
        let routes: Vec<AgentRole> = self
            .routing
            .get(&ticket.service)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|role| !matches!(role, AgentRole::Chair | AgentRole::Main | AgentRole::Sre))
            .collect();
        tracing::debug!(ticket = %ticket.id, service = %ticket.service, ?routes, "Chair routing");
        routes
    }

    /// The suggestion to hand to the frontend agent, if the best one
    /// points into frontend code.
    pub fn frontend_target<'a>(&self, call: &'a TriageCall) -> Option<&'a Finding> {
        call.best_suggestion().filter(|f| {
            f.suggested_action
                .as_ref()
                .is_some_and(|a| a.implicates_frontend())
        })
    }

    /// Render a chair response template. `{name}` placeholders are filled
    /// from `vars`; a missing template falls back to the key itself.
    pub fn narrate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let template = self
            .runbooks
            .snapshot(AgentRole::Chair)
            .and_then(|rb| rb.template(key).map(str::to_string))
            .unwrap_or_else(|| key.to_string());
        vars.iter().fold(template, |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
    }

    /// Opening announcement for a ticket.
    pub fn open_line(&self, ticket: &Ticket) -> String {
        let severity = ticket.severity.to_string().to_uppercase();
        let symptom = ticket.symptoms.first().map(String::as_str).unwrap_or("none");
        self.narrate(
            "open",
            &[
                ("ticket_id", ticket.id.as_str()),
                ("severity", severity.as_str()),
                ("summary", ticket.summary.as_str()),
                ("symptom", symptom),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::ticket;
    use incident_core::runbook::RunbookStore;
    use incident_core::{SuggestedAction, TriageCall};

    fn chair() -> ChairAgent {
        let routing = BTreeMap::from([
            ("billing".to_string(), vec![AgentRole::Billing, AgentRole::Ordering]),
            ("frontend".to_string(), vec![AgentRole::Sre, AgentRole::Frontend]),
        ]);
        ChairAgent::new(RunbookStore::builtin().unwrap().shared(), routing)
    }

    #[test]
    fn test_route_by_service() {
        let chair = chair();
        assert_eq!(
            chair.route(&ticket("billing", "BILLING_400", &[])),
            vec![AgentRole::Billing, AgentRole::Ordering]
        );
        assert_eq!(
            chair.route(&ticket("frontend", "FE_TIMEOUT", &[])),
            vec![AgentRole::Frontend]
        );
        assert!(chair.route(&ticket("inventory", "INV_500", &[])).is_empty());
    }

    #[test]
    fn test_open_line() {
        let line = chair().open_line(&ticket("billing", "BILLING_400", &["currency"]));
        assert!(line.starts_with("Opening triage for INC-2026-0001 [CRITICAL]"));
        assert!(line.contains("Missing required field: currency"));
    }

    #[test]
    fn test_narrate_missing_template_falls_back() {
        assert_eq!(chair().narrate("nonexistent", &[]), "nonexistent");
    }

    #[test]
    fn test_frontend_target_requires_frontend_path() {
        let chair = chair();
        let mut call = TriageCall::new("INC-1", "billing", "BILLING_400");
        call.record_finding(
            Finding::new(AgentRole::Billing, "INC-1", "backend fix", 0.9).with_action(SuggestedAction {
                description: "Relax validation".into(),
                code_path: Some("backend/billing/validate.py".into()),
            }),
        );
        assert!(chair.frontend_target(&call).is_none());

        call.record_finding(
            Finding::new(AgentRole::Ordering, "INC-1", "frontend fix", 0.95).with_action(SuggestedAction {
                description: "Add currency".into(),
                code_path: Some("frontend/src/checkout/createOrder.ts".into()),
            }),
        );
        assert_eq!(
            chair.frontend_target(&call).unwrap().agent_role,
            AgentRole::Ordering
        );
    }
}
