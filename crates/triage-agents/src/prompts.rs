//! Prompt templates for triage agents.
//!
//! Pure text templating over a runbook snapshot and the call context; no
//! generation backend is involved here.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever template content changes.

use std::fmt::Write as _;

use incident_core::runbook::Runbook;
use incident_core::{CodeLocation, Finding, Ticket};

/// Prompt version. Bump on any template change.
pub const PROMPT_VERSION: &str = "1.3.0";

/// Known failure patterns and escalation rules listed per prompt.
const MAX_LISTED: usize = 5;

const SYSTEM_RULES: &str = "\
You must:
- Follow your runbook precisely
- Use the ticket evidence to support conclusions
- Speak concisely and professionally
- Escalate when your runbook requires it
- Avoid speculation without data";

/// System prompt for an agent, built from its runbook.
pub fn system_prompt(runbook: &Runbook) -> String {
    let mut out = format!(
        "You are {}, an AI agent participating in a live production incident.\n\n{}\n\n",
        runbook.role.agent_name(),
        SYSTEM_RULES
    );

    let _ = writeln!(out, "Your role: {}\n", or_dash(&runbook.description));

    out.push_str("Your objectives:\n");
    push_list(&mut out, runbook.objectives.iter().map(|o| format!("- {o}")), "- None listed");

    out.push_str("\nYour triage steps:\n");
    push_list(
        &mut out,
        runbook
            .triage_steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1)),
        "1. Follow the chair's instructions",
    );

    out.push_str("\nKnown failure patterns:\n");
    push_list(
        &mut out,
        runbook
            .knowledge
            .iter()
            .take(MAX_LISTED)
            .map(|(code, entry)| format!("- {code}: {}", entry.guidance)),
        "- No known patterns",
    );

    out.push_str("\nEscalation rules:\n");
    push_list(
        &mut out,
        runbook
            .escalation_rules
            .iter()
            .take(MAX_LISTED)
            .map(|e| format!("- If {} → escalate to {}", e.condition, e.escalate_to)),
        "- No escalation rules",
    );

    out
}

/// Analysis prompt: the ticket plus every finding recorded so far.
pub fn analysis_prompt(runbook: &Runbook, ticket: &Ticket, findings: &[Finding]) -> String {
    let mut out = system_prompt(runbook);
    let _ = write!(
        out,
        "\n---\nAnalyze the following incident:\n\n\
         Ticket: {} [{}]\nService: {}\nError code: {}\nSummary: {}\n",
        ticket.id, ticket.severity, ticket.service, ticket.error_code, ticket.summary
    );
    if !ticket.missing_fields().is_empty() {
        let _ = writeln!(out, "Missing fields: {}", ticket.missing_fields().join(", "));
    }

    out.push_str("\nSymptoms:\n");
    push_list(&mut out, ticket.symptoms.iter().map(|s| format!("- {s}")), "- None reported");

    out.push_str("\nFindings so far:\n");
    push_list(
        &mut out,
        findings.iter().map(|f| {
            format!(
                "- {} ({:.2}): {}",
                f.agent_role,
                f.confidence,
                f.summary.lines().next().unwrap_or_default()
            )
        }),
        "- None yet",
    );

    out.push_str(
        "\nBased on your runbook and the evidence above:\n\
         1. Which of your known failure modes matches?\n\
         2. What is your hypothesis?\n\
         3. Who should you escalate to (if any)?\n\
         4. What is your recommended action?\n",
    );
    out
}

/// Fix prompt for the frontend role: diagnosis, location and current code.
pub fn fix_prompt(diagnosis: &str, location: &CodeLocation, current_code: &str) -> String {
    format!(
        "Based on the diagnosis:\n{diagnosis}\n\n\
         Defect located at {location}: {}\n\n\
         Current code:\n```\n{current_code}\n```\n\n\
         Generate the minimal fix required. Show only the corrected code.",
        location.pattern
    )
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

fn push_list(out: &mut String, items: impl Iterator<Item = String>, empty: &str) {
    let mut any = false;
    for item in items {
        out.push_str(&item);
        out.push('\n');
        any = true;
    }
    if !any {
        out.push_str(empty);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_core::runbook::RunbookStore;
    use incident_core::simulator::{FailureDetails, FailurePayload};
    use incident_core::{AgentRole, Severity};

    fn billing_ticket() -> Ticket {
        Ticket::new(
            "INC-2026-0001".into(),
            Severity::Critical,
            FailurePayload {
                service: "billing".into(),
                error_code: "BILLING_400".into(),
                message: "Missing required field: currency".into(),
                details: FailureDetails {
                    missing_fields: vec!["currency".into()],
                    extra: Default::default(),
                },
                kind: None,
                rule_id: None,
                symptoms: vec![],
                trace_id: "t".into(),
            },
        )
    }

    #[test]
    fn test_system_prompt_from_runbook() {
        let store = RunbookStore::builtin().unwrap();
        let runbook = store.snapshot(AgentRole::Billing).unwrap();
        let prompt = system_prompt(&runbook);
        assert!(prompt.starts_with("You are BillingAgent"));
        assert!(prompt.contains("1. Match the error code against known billing failures"));
        assert!(prompt.contains("- BILLING_400: "));
        assert!(prompt.contains("→ escalate to frontend"));
    }

    #[test]
    fn test_empty_runbook_uses_placeholders() {
        let prompt = system_prompt(&Runbook::new(AgentRole::Main));
        assert!(prompt.contains("- No known patterns"));
        assert!(prompt.contains("- No escalation rules"));
        assert!(prompt.contains("Your role: -"));
    }

    #[test]
    fn test_analysis_prompt_includes_ticket_and_findings() {
        let runbook = Runbook::new(AgentRole::Sre);
        let ticket = billing_ticket();
        let findings = vec![Finding::new(AgentRole::Main, &ticket.id, "Primary error BILLING_400\nmore", 0.7)];
        let prompt = analysis_prompt(&runbook, &ticket, &findings);
        assert!(prompt.contains("Error code: BILLING_400"));
        assert!(prompt.contains("Missing fields: currency"));
        assert!(prompt.contains("- MainAgent (0.70): Primary error BILLING_400\n"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let runbook = RunbookStore::builtin()
            .unwrap()
            .snapshot(AgentRole::Ordering)
            .unwrap();
        let ticket = billing_ticket();
        assert_eq!(
            analysis_prompt(&runbook, &ticket, &[]),
            analysis_prompt(&runbook, &ticket, &[])
        );
    }
}
