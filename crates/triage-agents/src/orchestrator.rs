//! Triage orchestrator: drives one call through the state machine.
//!
//! ## Lifecycle
//!
//! ```text
//! OPEN ─▶ ASSESSING    MainAgent, SREAgent
//!      ─▶ DIAGNOSING   domain agents routed by the chair
//!      ─▶ REMEDIATING  FrontendAgent patch + deploy (frontend paths only)
//!      ─▶ DEPLOYED
//!      ─▶ CLOSED       ticket RESOLVED or back to OPEN, RCA synthesized
//!
//! any non-terminal state ─▶ ABORTED on cancellation (no RCA)
//! ```
//!
//! Agents run strictly one at a time. Every transition, finding and action
//! is published on the event bus before the next agent is invoked; the bus
//! never blocks the call.

use std::time::Duration;

use incident_core::events::{SharedEventBus, TriageEvent};
use incident_core::ledger::SharedLedger;
use incident_core::runbook::SharedRunbookStore;
use incident_core::{
    Action, AgentRole, CallState, Finding, RcaReport, Ticket, TicketStatus, TransitionRecord,
    TriageCall,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::{AgentRoster, ChairAgent, TriageContext};
use crate::config::TriageConfig;
use crate::error::OrchestrationError;
use crate::generator::{self, SharedGenerator};
use crate::prompts;
use crate::rca;

/// Result of one triage call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub call: TriageCall,
    /// `None` for an aborted call.
    pub report: Option<RcaReport>,
}

impl CallOutcome {
    pub fn is_aborted(&self) -> bool {
        self.call.state() == CallState::Aborted
    }
}

/// How the forward pass ended.
#[derive(Debug)]
enum Ending {
    Resolved,
    Unresolved(&'static str),
    Aborted(&'static str),
}

/// Per-call mutable state.
struct Session {
    call: TriageCall,
    sequence: u64,
}

impl Session {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

pub struct TriageOrchestrator {
    chair: ChairAgent,
    roster: AgentRoster,
    runbooks: SharedRunbookStore,
    ledger: SharedLedger,
    events: SharedEventBus,
    generator: Option<SharedGenerator>,
    max_agent_turns: u32,
    pacing: Duration,
    generator_timeout: Duration,
}

impl TriageOrchestrator {
    pub fn new(
        config: &TriageConfig,
        runbooks: SharedRunbookStore,
        ledger: SharedLedger,
        events: SharedEventBus,
    ) -> Self {
        Self {
            chair: ChairAgent::new(runbooks.clone(), config.routing.clone()),
            roster: AgentRoster::new(runbooks.clone()),
            runbooks,
            ledger,
            events,
            generator: None,
            max_agent_turns: config.max_agent_turns,
            pacing: config.pacing(),
            generator_timeout: config.generator_timeout(),
        }
    }

    /// Attach a text backend; each finding then carries a narrative.
    pub fn with_generator(mut self, generator: SharedGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Triage a ticket already recorded in the ledger.
    pub async fn run_ticket(
        &self,
        ticket_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CallOutcome, OrchestrationError> {
        let ticket = self
            .ledger
            .ticket(ticket_id)
            .ok_or_else(|| OrchestrationError::UnknownTicket(ticket_id.to_string()))?;
        self.run(ticket, cancel).await
    }

    /// Run one call to a terminal state.
    ///
    /// Only an illegal transition (a bug) is an error; agent degradation,
    /// generator failures and cancellation all end in a terminal call.
    pub async fn run(
        &self,
        ticket: Ticket,
        cancel: &CancellationToken,
    ) -> Result<CallOutcome, OrchestrationError> {
        if self.ledger.ticket(&ticket.id).is_none() {
            self.ledger.record_ticket(ticket.clone());
        }
        let ticket = self
            .ledger
            .set_status(&ticket.id, TicketStatus::InTriage)
            .unwrap_or(ticket);

        info!(
            ticket = %ticket.id,
            service = %ticket.service,
            error_code = %ticket.error_code,
            severity = %ticket.severity,
            "Triage call opened"
        );

        let mut session = Session {
            call: TriageCall::new(&ticket.id, &ticket.service, &ticket.error_code),
            sequence: 0,
        };

        let ending = if cancel.is_cancelled() {
            Ending::Aborted("cancelled before the call opened")
        } else {
            self.drive(&ticket, &mut session, cancel).await?
        };

        match ending {
            Ending::Aborted(reason) => self.abort(&ticket, session, reason),
            Ending::Resolved => self.close(&ticket, session, None),
            Ending::Unresolved(reason) => self.close(&ticket, session, Some(reason)),
        }
    }

    async fn drive(
        &self,
        ticket: &Ticket,
        s: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<Ending, OrchestrationError> {
        // ── ASSESSING ──────────────────────────────────────────────────
        let open = self.chair.open_line(ticket);
        self.transition(s, CallState::Assessing, Some(&open))?;
        for role in self.chair.opening_sequence() {
            if let Some(end) = self.agent_turn(ticket, s, role, cancel).await {
                return Ok(end);
            }
        }

        // ── DIAGNOSING ─────────────────────────────────────────────────
        let routes = self.chair.route(ticket);
        let names: Vec<&str> = routes.iter().map(|r| r.agent_name()).collect();
        let agents = names.join(", ");
        let route_line = self.chair.narrate("route", &[("agents", agents.as_str())]);
        self.transition(s, CallState::Diagnosing, Some(&route_line))?;
        for role in routes {
            if let Some(end) = self.agent_turn(ticket, s, role, cancel).await {
                return Ok(end);
            }
        }

        if !s.call.has_actionable_finding() {
            return Ok(Ending::Unresolved("no actionable finding"));
        }

        // ── REMEDIATING ────────────────────────────────────────────────
        let fix_line = self.chair.narrate("fix", &[]);
        self.transition(s, CallState::Remediating, Some(&fix_line))?;
        let Some(suggestion) = self
            .chair
            .frontend_target(&s.call)
            .and_then(|f| f.suggested_action.clone())
        else {
            return Ok(Ending::Unresolved("suggested fix is outside frontend code"));
        };

        if let Some(end) = self.gate(s, cancel).await {
            return Ok(end);
        }
        s.call.agent_sequence.push(AgentRole::Frontend);
        s.call.turns_used += 1;

        let frontend = self.roster.frontend();
        let mut remediation = frontend.remediate(ticket, Some(&suggestion));
        if let (Some(generator), Some(location), Some(current)) = (
            &self.generator,
            remediation.location.as_ref(),
            frontend.current_code(&ticket.error_code),
        ) {
            let prompt = prompts::fix_prompt(&suggestion.description, location, &current);
            remediation.finding.narrative = self.narrative(generator, &prompt, cancel).await;
        }
        self.record_finding(s, remediation.finding);

        let Some(patch) = remediation.patch else {
            return Ok(Ending::Unresolved("no known defect signature"));
        };
        let deploy = frontend.deploy(&patch);
        self.record_action(s, patch);
        self.record_action(s, deploy);

        // ── DEPLOYED ───────────────────────────────────────────────────
        let deployed = self.chair.narrate("deployed", &[]);
        self.transition(s, CallState::Deployed, Some(&deployed))?;
        Ok(Ending::Resolved)
    }

    /// Cancellation, budget and pacing check before an agent turn.
    async fn gate(&self, s: &Session, cancel: &CancellationToken) -> Option<Ending> {
        if cancel.is_cancelled() {
            return Some(Ending::Aborted("cancelled"));
        }
        if s.call.turns_used >= self.max_agent_turns {
            warn!(
                ticket = %s.call.ticket_id,
                turns = s.call.turns_used,
                "Agent turn budget exhausted"
            );
            return Some(Ending::Unresolved("agent turn budget exhausted"));
        }
        if !self.pacing.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Some(Ending::Aborted("cancelled")),
                _ = tokio::time::sleep(self.pacing) => {}
            }
        }
        None
    }

    /// Invoke one analyzing agent and record its finding.
    async fn agent_turn(
        &self,
        ticket: &Ticket,
        s: &mut Session,
        role: AgentRole,
        cancel: &CancellationToken,
    ) -> Option<Ending> {
        if let Some(end) = self.gate(s, cancel).await {
            return Some(end);
        }
        let agent = self.roster.get(role)?;

        s.call.agent_sequence.push(role);
        s.call.turns_used += 1;
        debug!(ticket = %ticket.id, agent = %role, turn = s.call.turns_used, "Agent turn");

        let mut finding = agent.analyze(ticket, &s.call.findings);
        if let (Some(generator), Some(runbook)) = (&self.generator, self.runbooks.snapshot(role)) {
            let ctx = TriageContext {
                ticket,
                findings: &s.call.findings,
            };
            let prompt = agent.build_prompt(&runbook, &ctx);
            finding.narrative = self.narrative(generator, &prompt, cancel).await;
        }
        self.record_finding(s, finding);
        None
    }

    async fn narrative(
        &self,
        generator: &SharedGenerator,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            text = generator::narrate(generator.as_ref(), prompt, self.generator_timeout) => text,
        }
    }

    // ── Recording + publishing ──────────────────────────────────────────

    fn transition(
        &self,
        s: &mut Session,
        to: CallState,
        reason: Option<&str>,
    ) -> Result<TransitionRecord, OrchestrationError> {
        let record = s.call.advance(to, reason)?;
        info!(
            ticket = %s.call.ticket_id,
            from = %record.from,
            to = %record.to,
            "Call transition"
        );
        let event = TriageEvent::StateTransition {
            ticket_id: s.call.ticket_id.clone(),
            sequence: s.next_sequence(),
            timestamp: record.at,
            payload: (&record).into(),
        };
        self.events.publish(event);
        Ok(record)
    }

    fn record_finding(&self, s: &mut Session, finding: Finding) {
        info!(
            ticket = %s.call.ticket_id,
            agent = %finding.agent_role,
            confidence = finding.confidence,
            actionable = finding.is_actionable(),
            "Finding recorded"
        );
        let event = TriageEvent::Finding {
            ticket_id: s.call.ticket_id.clone(),
            sequence: s.next_sequence(),
            timestamp: finding.timestamp,
            payload: finding.clone(),
        };
        s.call.record_finding(finding);
        self.events.publish(event);
    }

    fn record_action(&self, s: &mut Session, action: Action) {
        info!(
            ticket = %s.call.ticket_id,
            kind = %action.kind,
            target = %action.target,
            applied = action.applied,
            "Action recorded"
        );
        let event = TriageEvent::Action {
            ticket_id: s.call.ticket_id.clone(),
            sequence: s.next_sequence(),
            timestamp: chrono::Utc::now(),
            payload: action.clone(),
        };
        s.call.record_action(action);
        self.events.publish(event);
    }

    // ── Terminal states ─────────────────────────────────────────────────

    fn close(
        &self,
        ticket: &Ticket,
        mut s: Session,
        unresolved: Option<&str>,
    ) -> Result<CallOutcome, OrchestrationError> {
        let line = match unresolved {
            None => self.chair.narrate("close", &[]),
            Some(reason) => format!("{} ({reason})", self.chair.narrate("unresolved", &[])),
        };
        self.transition(&mut s, CallState::Closed, Some(&line))?;

        let status = if s.call.is_resolved() {
            TicketStatus::Resolved
        } else {
            TicketStatus::Open
        };
        self.ledger.set_status(&ticket.id, status);

        let report = rca::synthesize(&s.call);
        info!(
            ticket = %ticket.id,
            status = %status,
            root_cause = %report.root_cause,
            summary = %s.call.summary(),
            "Triage call closed"
        );
        self.ledger.record_report(report.clone());
        self.ledger.archive_call(s.call.clone());

        Ok(CallOutcome {
            call: s.call,
            report: Some(report),
        })
    }

    fn abort(
        &self,
        ticket: &Ticket,
        mut s: Session,
        reason: &str,
    ) -> Result<CallOutcome, OrchestrationError> {
        let line = format!("{} ({reason})", self.chair.narrate("aborted", &[]));
        self.transition(&mut s, CallState::Aborted, Some(&line))?;
        self.ledger.set_status(&ticket.id, TicketStatus::Open);
        warn!(ticket = %ticket.id, reason, summary = %s.call.summary(), "Triage call aborted");
        self.ledger.archive_call(s.call.clone());

        Ok(CallOutcome {
            call: s.call,
            report: None,
        })
    }
}
