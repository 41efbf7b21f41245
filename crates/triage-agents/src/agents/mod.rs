//! Triage agent roles.
//!
//! Every Finding-producing role implements [`TriageAgent`]. Roles differ
//! in which runbook they read and which services they claim; the chair is
//! a separate controller ([`chair::ChairAgent`]) and never analyzes.
//!
//! Agents take a fresh runbook snapshot on every invocation, so an edit
//! made between two turns is picked up by the next one.

pub mod chair;
pub mod domain;
pub mod frontend;
pub mod main_agent;
pub mod sre;

use incident_core::runbook::{Runbook, SharedRunbookStore, TemplateContext};
use incident_core::{AgentRole, Finding, SuggestedAction, Ticket};

use crate::prompts;

pub use chair::ChairAgent;
pub use domain::DomainAgent;
pub use frontend::{FrontendAgent, Remediation};
pub use main_agent::MainAgent;
pub use sre::SreAgent;

/// What an agent sees when it is invoked.
#[derive(Debug, Clone, Copy)]
pub struct TriageContext<'a> {
    pub ticket: &'a Ticket,
    pub findings: &'a [Finding],
}

/// Capability shared by every analyzing role.
pub trait TriageAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    /// Whether this role claims tickets from `service`.
    fn owns(&self, service: &str) -> bool;

    /// Analysis prompt for an external generation backend.
    fn build_prompt(&self, runbook: &Runbook, ctx: &TriageContext<'_>) -> String {
        prompts::analysis_prompt(runbook, ctx.ticket, ctx.findings)
    }

    /// Produce exactly one finding. Never fails: a role with nothing to
    /// say returns a zero-confidence finding instead.
    fn analyze(&self, ticket: &Ticket, findings_so_far: &[Finding]) -> Finding;
}

/// Finding for a role invoked on a ticket from a service it does not own.
pub(crate) fn not_owned(role: AgentRole, ticket: &Ticket) -> Finding {
    Finding::new(
        role,
        &ticket.id,
        format!(
            "{} does not own the {} service; no findings for {}. Deferring to other agents.",
            role, ticket.service, ticket.error_code
        ),
        0.0,
    )
}

/// Look `ticket.error_code` up in the role's runbook knowledge.
///
/// A matching entry yields its guidance and confidence, plus a suggested
/// action when the entry carries a fix template. A missing runbook or
/// missing entry degrades to a zero-confidence finding.
pub(crate) fn knowledge_finding(
    role: AgentRole,
    runbooks: &SharedRunbookStore,
    ticket: &Ticket,
) -> Finding {
    let Some(runbook) = runbooks.snapshot(role) else {
        return Finding::degraded(role, &ticket.id, &format!("no runbook loaded for {role}"));
    };
    let Some(entry) = runbook.lookup(&ticket.error_code) else {
        return Finding::degraded(
            role,
            &ticket.id,
            &format!("{} is not in the {} runbook", ticket.error_code, role),
        );
    };

    let summary = format!(
        "Root cause identified: `{}` {}. {}",
        ticket.error_code,
        ticket.raw_payload().message,
        entry.guidance
    );
    let finding = Finding::new(role, &ticket.id, summary, entry.confidence);

    match &entry.fix_template {
        Some(template) => {
            let ctx = TemplateContext {
                error_code: &ticket.error_code,
                service: &ticket.service,
                missing_fields: ticket.missing_fields(),
            };
            finding.with_action(SuggestedAction {
                description: template.render(&ctx),
                code_path: template.code_path.clone(),
            })
        }
        None => finding,
    }
}

/// The analyzing agents, built over one shared runbook store.
pub struct AgentRoster {
    main: MainAgent,
    sre: SreAgent,
    billing: DomainAgent,
    ordering: DomainAgent,
    frontend: FrontendAgent,
}

impl AgentRoster {
    pub fn new(runbooks: SharedRunbookStore) -> Self {
        Self {
            main: MainAgent,
            sre: SreAgent::new(runbooks.clone()),
            billing: DomainAgent::billing(runbooks.clone()),
            ordering: DomainAgent::ordering(runbooks.clone()),
            frontend: FrontendAgent::new(runbooks),
        }
    }

    /// The analyzing agent for `role`; `None` for the chair.
    pub fn get(&self, role: AgentRole) -> Option<&dyn TriageAgent> {
        match role {
            AgentRole::Chair => None,
            AgentRole::Main => Some(&self.main),
            AgentRole::Sre => Some(&self.sre),
            AgentRole::Billing => Some(&self.billing),
            AgentRole::Ordering => Some(&self.ordering),
            AgentRole::Frontend => Some(&self.frontend),
        }
    }

    pub fn frontend(&self) -> &FrontendAgent {
        &self.frontend
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use incident_core::simulator::{FailureDetails, FailurePayload};
    use incident_core::{Severity, Ticket};

    pub fn ticket(service: &str, code: &str, missing: &[&str]) -> Ticket {
        Ticket::new(
            "INC-2026-0001".into(),
            Severity::Critical,
            FailurePayload {
                service: service.into(),
                error_code: code.into(),
                message: match missing.first() {
                    Some(f) => format!("Missing required field: {f}"),
                    None => "Request failed".into(),
                },
                details: FailureDetails {
                    missing_fields: missing.iter().map(|s| s.to_string()).collect(),
                    extra: Default::default(),
                },
                kind: None,
                rule_id: None,
                symptoms: vec![],
                trace_id: "trace".into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ticket;
    use super::*;
    use incident_core::runbook::RunbookStore;

    #[test]
    fn test_roster_has_no_chair() {
        let roster = AgentRoster::new(RunbookStore::builtin().unwrap().shared());
        assert!(roster.get(AgentRole::Chair).is_none());
        for role in [
            AgentRole::Main,
            AgentRole::Sre,
            AgentRole::Billing,
            AgentRole::Ordering,
            AgentRole::Frontend,
        ] {
            assert_eq!(roster.get(role).unwrap().role(), role);
        }
    }

    #[test]
    fn test_knowledge_finding_missing_runbook_degrades() {
        let store = RunbookStore::new(vec![]).unwrap().shared();
        let finding = knowledge_finding(AgentRole::Billing, &store, &ticket("billing", "BILLING_400", &["currency"]));
        assert_eq!(finding.confidence, 0.0);
        assert!(finding.suggested_action.is_none());
        assert!(finding.summary.contains("no runbook loaded"));
    }

    #[test]
    fn test_build_prompt_uses_runbook() {
        let store = RunbookStore::builtin().unwrap().shared();
        let roster = AgentRoster::new(store.clone());
        let t = ticket("billing", "BILLING_400", &["currency"]);
        let runbook = store.snapshot(AgentRole::Billing).unwrap();
        let agent = roster.get(AgentRole::Billing).unwrap();
        let prompt = agent.build_prompt(
            &runbook,
            &TriageContext {
                ticket: &t,
                findings: &[],
            },
        );
        assert!(prompt.contains("You are BillingAgent"));
        assert!(prompt.contains("Error code: BILLING_400"));
    }
}
