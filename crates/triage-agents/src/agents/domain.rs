//! Billing and ordering domain experts.
//!
//! Both map the ticket's error code to guidance in their own runbook and
//! suggest a fix when the entry carries a fix template.

use incident_core::runbook::SharedRunbookStore;
use incident_core::simulator::{BILLING, ORDERING};
use incident_core::{AgentRole, Finding, Ticket};

use super::{knowledge_finding, not_owned, TriageAgent};

pub struct DomainAgent {
    role: AgentRole,
    service: &'static str,
    runbooks: SharedRunbookStore,
}

impl DomainAgent {
    pub fn billing(runbooks: SharedRunbookStore) -> Self {
        Self {
            role: AgentRole::Billing,
            service: BILLING,
            runbooks,
        }
    }

    pub fn ordering(runbooks: SharedRunbookStore) -> Self {
        Self {
            role: AgentRole::Ordering,
            service: ORDERING,
            runbooks,
        }
    }
}

impl TriageAgent for DomainAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn owns(&self, service: &str) -> bool {
        service == self.service
    }

    fn analyze(&self, ticket: &Ticket, _findings_so_far: &[Finding]) -> Finding {
        if !self.owns(&ticket.service) {
            return not_owned(self.role, ticket);
        }
        knowledge_finding(self.role, &self.runbooks, ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::ticket;
    use incident_core::runbook::{Runbook, RunbookStore};

    fn store() -> SharedRunbookStore {
        RunbookStore::builtin().unwrap().shared()
    }

    #[test]
    fn test_billing_suggests_currency_fix() {
        let agent = DomainAgent::billing(store());
        let finding = agent.analyze(&ticket("billing", "BILLING_400", &["currency"]), &[]);

        assert!(finding.confidence > 0.8);
        let action = finding.suggested_action.unwrap();
        assert!(action.description.contains("\"currency\""));
        assert!(action.implicates_frontend());
    }

    #[test]
    fn test_unknown_code_degrades() {
        let agent = DomainAgent::billing(store());
        let finding = agent.analyze(&ticket("billing", "BILLING_999", &[]), &[]);
        assert_eq!(finding.confidence, 0.0);
        assert!(finding.suggested_action.is_none());
        assert!(finding.summary.starts_with("No matching guidance"));
    }

    #[test]
    fn test_not_owned_service() {
        let agent = DomainAgent::ordering(store());
        let finding = agent.analyze(&ticket("billing", "BILLING_400", &["currency"]), &[]);
        assert_eq!(finding.confidence, 0.0);
        assert!(finding.suggested_action.is_none());
        assert!(finding.summary.contains("does not own the billing service"));
    }

    #[test]
    fn test_guidance_without_template_has_no_action() {
        let agent = DomainAgent::billing(store());
        let finding = agent.analyze(&ticket("billing", "BILLING_503", &[]), &[]);
        assert!(finding.confidence > 0.0);
        assert!(finding.suggested_action.is_none());
    }

    #[test]
    fn test_picks_up_runbook_edit() {
        let runbooks = store();
        let agent = DomainAgent::ordering(runbooks.clone());
        let before = agent.analyze(&ticket("ordering", "ORDER_409", &[]), &[]);
        assert!(before.confidence > 0.0);

        runbooks.replace(Runbook::new(AgentRole::Ordering)).unwrap();
        let finding = agent.analyze(&ticket("ordering", "ORDER_409", &[]), &[]);
        assert_eq!(finding.confidence, 0.0);
    }
}
