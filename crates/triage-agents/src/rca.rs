//! RCA synthesis from a closed triage call.
//!
//! [`synthesize`] is a pure function of the call: the same ordered
//! findings, actions and transitions always give the same report.

use chrono::{DateTime, Utc};
use incident_core::report::UNDETERMINED;
use incident_core::{ActionKind, RcaReport, TriageCall};

/// Build the report for `call`.
///
/// Root cause is the suggested action of the highest-confidence finding
/// that carries one; without such a finding it is `undetermined`.
pub fn synthesize(call: &TriageCall) -> RcaReport {
    let resolved = call.is_resolved();
    let best = call.best_suggestion();

    let root_cause = match best.and_then(|f| f.suggested_action.as_ref().map(|a| (f, a))) {
        Some((finding, action)) => format!(
            "{} (identified by {})",
            action.description, finding.agent_role
        ),
        None => UNDETERMINED.to_string(),
    };

    let remediation_summary = if resolved {
        let steps: Vec<String> = call
            .actions
            .iter()
            .filter(|a| a.is_remediation())
            .map(|a| format!("{} {}", a.kind, a.target))
            .collect();
        format!("Applied: {}.", steps.join("; "))
    } else {
        match best.and_then(|f| f.suggested_action.as_ref()) {
            Some(action) => format!(
                "Call closed unresolved; suggested fix was not applied: {}",
                action.description
            ),
            None => "Call closed unresolved; no actionable finding was produced.".to_string(),
        }
    };

    let agents: Vec<String> = call
        .agent_sequence
        .iter()
        .map(|r| r.agent_name().to_string())
        .collect();
    let what_happened = format!(
        "Checkout requests to {} failed with {}. {} agent turn(s) were used ({}).",
        call.service,
        call.error_code,
        call.turns_used,
        if agents.is_empty() { "none".to_string() } else { agents.join(", ") }
    );

    let customer_impact = if resolved {
        format!(
            "Customers could not complete checkout while {} persisted; impact ended once the fix was deployed.",
            call.error_code
        )
    } else {
        format!(
            "Customers may still be unable to complete checkout while {} persists.",
            call.error_code
        )
    };

    let mut preventive_actions = vec![
        format!("Add monitoring alert for {} errors", call.error_code),
        format!("Add a contract test for {} request payloads", call.service),
    ];
    if call
        .actions
        .iter()
        .any(|a| a.kind == ActionKind::Deploy && a.applied)
    {
        preventive_actions.push("Gate frontend deploys on backend contract changes".to_string());
    }
    if !resolved {
        preventive_actions.push(format!("Add a runbook entry for {}", call.error_code));
    }

    RcaReport {
        ticket_id: call.ticket_id.clone(),
        service: call.service.clone(),
        error_code: call.error_code.clone(),
        root_cause,
        contributing_findings: call
            .findings
            .iter()
            .filter(|f| f.confidence > 0.0)
            .cloned()
            .collect(),
        remediation_summary,
        resolved,
        what_happened,
        customer_impact,
        preventive_actions,
        timeline: timeline(call),
        generated_at: call.closed_at.unwrap_or(call.opened_at),
    }
}

/// Transitions and findings merged by timestamp. Transitions sort before
/// findings stamped at the same instant.
fn timeline(call: &TriageCall) -> Vec<String> {
    let mut entries: Vec<(DateTime<Utc>, String)> = call
        .transitions()
        .iter()
        .map(|t| (t.at, format!("{} {} → {}", t.at.format("%H:%M:%S%.3f"), t.from, t.to)))
        .collect();
    entries.extend(call.findings.iter().map(|f| {
        (
            f.timestamp,
            format!(
                "{} {}: {}",
                f.timestamp.format("%H:%M:%S%.3f"),
                f.agent_role,
                f.summary.lines().next().unwrap_or_default()
            ),
        )
    }));
    entries.sort_by_key(|(at, _)| *at);
    entries.into_iter().map(|(_, line)| line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_core::{Action, AgentRole, CallState, Finding, SuggestedAction};

    fn diagnosed_call() -> TriageCall {
        let mut call = TriageCall::new("INC-2026-0001", "billing", "BILLING_400");
        call.advance(CallState::Assessing, None).unwrap();
        call.agent_sequence.extend([AgentRole::Main, AgentRole::Billing]);
        call.turns_used = 2;
        call.record_finding(Finding::new(AgentRole::Main, "INC-2026-0001", "Initial", 0.5));
        call.advance(CallState::Diagnosing, None).unwrap();
        call.record_finding(
            Finding::new(AgentRole::Billing, "INC-2026-0001", "Missing currency", 0.9).with_action(
                SuggestedAction {
                    description: "Add the missing field(s) \"currency\"".into(),
                    code_path: Some("frontend/src/checkout/createOrder.ts".into()),
                },
            ),
        );
        call.record_finding(Finding::degraded(AgentRole::Ordering, "INC-2026-0001", "n/a"));
        call
    }

    #[test]
    fn test_resolved_report() {
        let mut call = diagnosed_call();
        call.advance(CallState::Remediating, None).unwrap();
        call.record_action(Action {
            kind: ActionKind::Patch,
            target: "frontend/src/checkout/createOrder.ts".into(),
            diff_or_description: "+ currency".into(),
            applied: true,
        });
        call.record_action(Action {
            kind: ActionKind::Deploy,
            target: "frontend".into(),
            diff_or_description: "deployed".into(),
            applied: true,
        });
        call.advance(CallState::Deployed, None).unwrap();
        call.advance(CallState::Closed, None).unwrap();

        let report = synthesize(&call);
        assert!(report.resolved);
        assert!(report.root_cause.contains("\"currency\""));
        assert!(report.root_cause.contains("BillingAgent"));
        assert_eq!(
            report.remediation_summary,
            "Applied: PATCH frontend/src/checkout/createOrder.ts; DEPLOY frontend."
        );
        assert_eq!(report.contributing_findings.len(), 2);
        assert_eq!(report.generated_at, call.closed_at.unwrap());
        assert!(report
            .preventive_actions
            .contains(&"Add monitoring alert for BILLING_400 errors".to_string()));
        assert_eq!(report.timeline.len(), 5 + 3);
        assert!(report.timeline[0].ends_with("OPEN → ASSESSING"));
    }

    #[test]
    fn test_unresolved_without_suggestion() {
        let mut call = TriageCall::new("INC-2026-0002", "billing", "BILLING_999");
        call.advance(CallState::Assessing, None).unwrap();
        call.record_finding(Finding::degraded(AgentRole::Billing, "INC-2026-0002", "unknown"));
        call.advance(CallState::Closed, Some("no actionable finding")).unwrap();

        let report = synthesize(&call);
        assert!(report.is_undetermined());
        assert!(!report.resolved);
        assert!(report.remediation_summary.contains("unresolved"));
        assert!(report.contributing_findings.is_empty());
        assert!(report.what_happened.contains("none"));
    }

    #[test]
    fn test_unapplied_suggestion_is_reported() {
        let mut call = diagnosed_call();
        call.advance(CallState::Closed, Some("turn budget exhausted")).unwrap();
        let report = synthesize(&call);
        assert!(!report.resolved);
        assert!(!report.is_undetermined());
        assert!(report.remediation_summary.contains("was not applied"));
    }

    #[test]
    fn test_synthesis_is_pure() {
        let mut call = diagnosed_call();
        call.advance(CallState::Closed, None).unwrap();
        assert_eq!(synthesize(&call), synthesize(&call));
    }
}
