//! Infrastructure context: recent deploys and similar past incidents.
//!
//! Both tables are static; the demo has no deploy system to query.

use incident_core::runbook::SharedRunbookStore;
use incident_core::{AgentRole, Finding, Ticket};

use super::TriageAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deploy {
    pub component: &'static str,
    pub version: &'static str,
    pub deployed_at: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PastIncident {
    pub id: &'static str,
    pub title: &'static str,
}

/// Newest first.
const RECENT_DEPLOYS: &[Deploy] = &[
    Deploy {
        component: "backend/orders",
        version: "v1.3.2",
        deployed_at: "2026-02-08 13:58",
        note: "Added validation rules",
    },
    Deploy {
        component: "frontend",
        version: "v2.8.0",
        deployed_at: "2026-02-08 13:55",
        note: "Checkout flow update",
    },
    Deploy {
        component: "billing",
        version: "v4.1.0",
        deployed_at: "2026-02-07 09:30",
        note: "Stripe SDK upgrade",
    },
];

const PAST_INCIDENTS: &[(&str, &[PastIncident])] = &[
    (
        "BILLING_400",
        &[
            PastIncident {
                id: "INC-2026-015",
                title: "API contract mismatch after backend deploy",
            },
            PastIncident {
                id: "INC-2026-012",
                title: "Frontend/backend version skew",
            },
        ],
    ),
    (
        "BILLING_422",
        &[PastIncident {
            id: "INC-2025-101",
            title: "Amount sent as decimal string after SDK upgrade",
        }],
    ),
    (
        "ORDER_409",
        &[PastIncident {
            id: "INC-2025-088",
            title: "Duplicate orders during client retry storm",
        }],
    ),
    (
        "FE_TIMEOUT",
        &[PastIncident {
            id: "INC-2025-077",
            title: "Checkout spinner hang during billing brownout",
        }],
    ),
];

const BASE_CONFIDENCE: f32 = 0.3;
const MATCHED_CONFIDENCE: f32 = 0.6;

pub struct SreAgent {
    runbooks: SharedRunbookStore,
}

impl SreAgent {
    pub fn new(runbooks: SharedRunbookStore) -> Self {
        Self { runbooks }
    }

    pub fn recent_deploys(&self) -> &'static [Deploy] {
        RECENT_DEPLOYS
    }

    pub fn past_incidents(&self, error_code: &str) -> &'static [PastIncident] {
        PAST_INCIDENTS
            .iter()
            .find(|(code, _)| *code == error_code)
            .map(|(_, incidents)| *incidents)
            .unwrap_or(&[])
    }

    /// Whether a backend deploy landed after the latest frontend deploy.
    fn backend_after_frontend(&self) -> bool {
        let latest = |pred: fn(&Deploy) -> bool| {
            RECENT_DEPLOYS
                .iter()
                .filter(|d| pred(d))
                .map(|d| d.deployed_at)
                .max()
        };
        match (
            latest(|d| d.component != "frontend"),
            latest(|d| d.component == "frontend"),
        ) {
            (Some(backend), Some(frontend)) => backend > frontend,
            _ => false,
        }
    }
}

impl TriageAgent for SreAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Sre
    }

    fn owns(&self, _service: &str) -> bool {
        true
    }

    fn analyze(&self, ticket: &Ticket, _findings_so_far: &[Finding]) -> Finding {
        let mut summary = String::from("Recent deployments:\n");
        for d in self.recent_deploys() {
            summary.push_str(&format!(
                "- `{}` {} ({}): {}\n",
                d.component, d.version, d.deployed_at, d.note
            ));
        }
        if self.backend_after_frontend() {
            summary.push_str("Note: backend deployed after frontend, possible contract mismatch.\n");
        }

        let incidents = self.past_incidents(&ticket.error_code);
        if incidents.is_empty() {
            summary.push_str(&format!("No similar past incidents for {}.", ticket.error_code));
        } else {
            summary.push_str("Similar past incidents:\n");
            for i in incidents {
                summary.push_str(&format!("- {}: {}\n", i.id, i.title));
            }
        }

        if let Some(entry) = self
            .runbooks
            .snapshot(AgentRole::Sre)
            .and_then(|rb| rb.lookup(&ticket.error_code).cloned())
        {
            summary.push_str(&format!("\nInfra note: {}", entry.guidance));
        }

        let confidence = if incidents.is_empty() {
            BASE_CONFIDENCE
        } else {
            MATCHED_CONFIDENCE
        };
        Finding::new(AgentRole::Sre, &ticket.id, summary.trim_end(), confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::ticket;
    use incident_core::runbook::RunbookStore;

    fn agent() -> SreAgent {
        SreAgent::new(RunbookStore::builtin().unwrap().shared())
    }

    #[test]
    fn test_past_incident_lookup() {
        let sre = agent();
        assert_eq!(sre.past_incidents("BILLING_400").len(), 2);
        assert!(sre.past_incidents("BILLING_999").is_empty());
    }

    #[test]
    fn test_flags_deploy_order() {
        assert!(agent().backend_after_frontend());
    }

    #[test]
    fn test_finding_with_history() {
        let finding = agent().analyze(&ticket("billing", "BILLING_400", &["currency"]), &[]);
        assert_eq!(finding.confidence, MATCHED_CONFIDENCE);
        assert!(finding.summary.contains("INC-2026-015"));
        assert!(finding.summary.contains("Infra note:"));
        assert!(finding.suggested_action.is_none());
    }

    #[test]
    fn test_finding_without_history() {
        let finding = agent().analyze(&ticket("billing", "BILLING_999", &[]), &[]);
        assert_eq!(finding.confidence, BASE_CONFIDENCE);
        assert!(finding.summary.ends_with("No similar past incidents for BILLING_999."));
    }
}
