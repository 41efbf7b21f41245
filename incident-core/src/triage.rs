//! Triage data model: roles, findings, actions and the call record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state_machine::{CallState, IllegalTransition, StateMachine, TransitionRecord};
use crate::ticket::TicketId;

/// Agent roles taking part in a triage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Chair,
    Main,
    Sre,
    Billing,
    Ordering,
    Frontend,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        Self::Chair,
        Self::Main,
        Self::Sre,
        Self::Billing,
        Self::Ordering,
        Self::Frontend,
    ];

    /// Lowercase key used in runbook files and config.
    pub fn key(self) -> &'static str {
        match self {
            Self::Chair => "chair",
            Self::Main => "main",
            Self::Sre => "sre",
            Self::Billing => "billing",
            Self::Ordering => "ordering",
            Self::Frontend => "frontend",
        }
    }

    /// Name used in narration, e.g. `BillingAgent`.
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Chair => "ChairAgent",
            Self::Main => "MainAgent",
            Self::Sre => "SREAgent",
            Self::Billing => "BillingAgent",
            Self::Ordering => "OrderingAgent",
            Self::Frontend => "FrontendAgent",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

impl FromStr for AgentRole {
    type Err = ConfigError;

    /// Accepts `billing`, `BillingAgent` and `billing_agent` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        let base = normalized.strip_suffix("agent").unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|role| role.key() == base)
            .ok_or_else(|| ConfigError::UnknownRole(s.to_string()))
    }
}

/// A remediation an agent proposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub description: String,
    /// Source path the fix lands in, e.g. `frontend/src/checkout/createOrder.ts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_path: Option<String>,
}

impl SuggestedAction {
    /// Whether the fix lives in frontend code.
    pub fn implicates_frontend(&self) -> bool {
        self.code_path
            .as_deref()
            .is_some_and(|p| p.starts_with("frontend/"))
    }
}

/// One agent's analysis output for a ticket. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub agent_role: AgentRole,
    pub ticket_id: TicketId,
    pub summary: String,
    /// 0.0 ..= 1.0
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<SuggestedAction>,
    pub timestamp: DateTime<Utc>,
    /// Text from the generation backend, when one is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl Finding {
    pub fn new(
        agent_role: AgentRole,
        ticket_id: impl Into<TicketId>,
        summary: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            agent_role,
            ticket_id: ticket_id.into(),
            summary: summary.into(),
            confidence: confidence.clamp(0.0, 1.0),
            suggested_action: None,
            timestamp: Utc::now(),
            narrative: None,
        }
    }

    pub fn with_action(mut self, action: SuggestedAction) -> Self {
        self.suggested_action = Some(action);
        self
    }

    /// Placeholder for an agent that could not say anything substantive.
    pub fn degraded(agent_role: AgentRole, ticket_id: impl Into<TicketId>, reason: &str) -> Self {
        Self::new(
            agent_role,
            ticket_id,
            format!("No matching guidance: {reason}"),
            0.0,
        )
    }

    pub fn is_actionable(&self) -> bool {
        self.suggested_action.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Patch,
    Deploy,
    None,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "PATCH"),
            Self::Deploy => write!(f, "DEPLOY"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// A concrete remediation step recorded by the frontend role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub target: String,
    pub diff_or_description: String,
    pub applied: bool,
}

impl Action {
    /// Applied PATCH or DEPLOY.
    pub fn is_remediation(&self) -> bool {
        self.applied && matches!(self.kind, ActionKind::Patch | ActionKind::Deploy)
    }
}

/// Where a known defect lives in the frontend source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file: String,
    pub function: String,
    /// Region of the function, e.g. "order-creation request body".
    pub region: String,
    pub line: u32,
    /// Defect signature, e.g. "missing field in request body".
    pub pattern: String,
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({}, {})", self.file, self.line, self.function, self.region)
    }
}

/// Live record of one triage call. Owned by the orchestrator until archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageCall {
    pub ticket_id: TicketId,
    pub error_code: String,
    pub service: String,
    machine: StateMachine,
    pub agent_sequence: Vec<AgentRole>,
    pub findings: Vec<Finding>,
    pub actions: Vec<Action>,
    pub turns_used: u32,
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl TriageCall {
    pub fn new(
        ticket_id: impl Into<TicketId>,
        service: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            error_code: error_code.into(),
            service: service.into(),
            machine: StateMachine::new(),
            agent_sequence: Vec::new(),
            findings: Vec::new(),
            actions: Vec::new(),
            turns_used: 0,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn state(&self) -> CallState {
        self.machine.current()
    }

    pub fn is_terminal(&self) -> bool {
        self.machine.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        self.machine.transitions()
    }

    /// Advance the call, stamping `closed_at` on entering a terminal state.
    pub fn advance(
        &mut self,
        to: CallState,
        reason: Option<&str>,
    ) -> Result<TransitionRecord, IllegalTransition> {
        let record = self.machine.advance(to, reason)?.clone();
        if to.is_terminal() {
            self.closed_at = Some(record.at);
        }
        Ok(record)
    }

    pub fn record_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn record_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn has_actionable_finding(&self) -> bool {
        self.findings.iter().any(Finding::is_actionable)
    }

    /// Whether an applied PATCH or DEPLOY has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.actions.iter().any(Action::is_remediation)
    }

    /// Highest-confidence finding with a suggested action; earliest wins ties.
    pub fn best_suggestion(&self) -> Option<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.is_actionable())
            .fold(None, |best: Option<&Finding>, f| match best {
                Some(b) if b.confidence >= f.confidence => Some(b),
                _ => Some(f),
            })
    }

    pub fn summary(&self) -> String {
        self.machine.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("billing".parse::<AgentRole>().unwrap(), AgentRole::Billing);
        assert_eq!("SREAgent".parse::<AgentRole>().unwrap(), AgentRole::Sre);
        assert_eq!("frontend_agent".parse::<AgentRole>().unwrap(), AgentRole::Frontend);
        assert!(matches!(
            "payments".parse::<AgentRole>(),
            Err(ConfigError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_implicates_frontend() {
        let fe = SuggestedAction {
            description: "add currency".into(),
            code_path: Some("frontend/src/checkout/createOrder.ts".into()),
        };
        let be = SuggestedAction {
            description: "retry".into(),
            code_path: Some("services/billing/handler.rs".into()),
        };
        assert!(fe.implicates_frontend());
        assert!(!be.implicates_frontend());
    }

    #[test]
    fn test_best_suggestion_prefers_confidence_then_order() {
        let mut call = TriageCall::new("INC-1", "billing", "BILLING_400");
        let action = |d: &str| SuggestedAction {
            description: d.into(),
            code_path: None,
        };
        call.record_finding(Finding::new(AgentRole::Main, "INC-1", "summary", 0.9));
        call.record_finding(Finding::new(AgentRole::Billing, "INC-1", "a", 0.7).with_action(action("first")));
        call.record_finding(Finding::new(AgentRole::Ordering, "INC-1", "b", 0.7).with_action(action("second")));
        call.record_finding(Finding::new(AgentRole::Ordering, "INC-1", "c", 0.4).with_action(action("third")));

        let best = call.best_suggestion().unwrap();
        assert_eq!(best.suggested_action.as_ref().unwrap().description, "first");
    }

    #[test]
    fn test_terminal_sets_closed_at() {
        let mut call = TriageCall::new("INC-1", "billing", "BILLING_400");
        call.advance(CallState::Assessing, None).unwrap();
        assert!(call.closed_at.is_none());
        call.advance(CallState::Aborted, Some("cancelled")).unwrap();
        assert!(call.closed_at.is_some());
        assert!(call.advance(CallState::Closed, None).is_err());
    }

    #[test]
    fn test_resolved_requires_applied_remediation() {
        let mut call = TriageCall::new("INC-1", "billing", "BILLING_400");
        call.record_action(Action {
            kind: ActionKind::Patch,
            target: "frontend".into(),
            diff_or_description: "diff".into(),
            applied: false,
        });
        assert!(!call.is_resolved());
        call.record_action(Action {
            kind: ActionKind::Deploy,
            target: "frontend".into(),
            diff_or_description: "deploy".into(),
            applied: true,
        });
        assert!(call.is_resolved());
    }

    #[test]
    fn test_degraded_finding_has_zero_confidence() {
        let f = Finding::degraded(AgentRole::Billing, "INC-1", "BILLING_999 not in runbook");
        assert_eq!(f.confidence, 0.0);
        assert!(f.suggested_action.is_none());
    }
}
