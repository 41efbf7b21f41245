//! Alert engine: turns failure payloads into tickets.
//!
//! Every observed failure opens its own ticket. Repeated identical
//! failures are not deduplicated; a demo run carries one live incident.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ledger::SharedLedger;
use crate::simulator::{FailurePayload, ServiceOutcome};
use crate::ticket::Ticket;

/// Ticket severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

fn status_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|_)([1-5])\d{2}$").expect("static regex"))
}

/// Maps error codes to severities.
///
/// Resolution order: explicit override, schema errors (critical), the
/// HTTP-style status class in the code suffix (`5xx` critical, `4xx`
/// warning), then the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityMap {
    #[serde(default)]
    pub overrides: BTreeMap<String, Severity>,
    #[serde(default = "default_fallback")]
    pub fallback: Severity,
}

fn default_fallback() -> Severity {
    Severity::Warning
}

impl Default for SeverityMap {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            fallback: default_fallback(),
        }
    }
}

impl SeverityMap {
    pub fn with_override(mut self, error_code: impl Into<String>, severity: Severity) -> Self {
        self.overrides.insert(error_code.into(), severity);
        self
    }

    pub fn classify(&self, payload: &FailurePayload) -> Severity {
        if let Some(sev) = self.overrides.get(&payload.error_code) {
            return *sev;
        }
        if payload.kind.is_some_and(|k| k.is_schema_error()) {
            return Severity::Critical;
        }
        match status_class_re()
            .captures(&payload.error_code)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        {
            Some("5") => Severity::Critical,
            Some("4") => Severity::Warning,
            _ => self.fallback,
        }
    }
}

/// Observes service outcomes and opens tickets.
#[derive(Debug)]
pub struct AlertEngine {
    severity: SeverityMap,
    ledger: SharedLedger,
    sequence: AtomicU64,
}

impl AlertEngine {
    pub fn new(severity: SeverityMap, ledger: SharedLedger) -> Self {
        Self {
            severity,
            ledger,
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns a new ticket for a failure outcome, `None` for a success.
    pub fn observe(&self, service: &str, outcome: &ServiceOutcome) -> Option<Ticket> {
        let payload = outcome.failure()?;
        let severity = self.severity.classify(payload);
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("INC-{}-{:04}", Utc::now().year(), seq);

        let ticket = Ticket::new(id, severity, payload.clone());
        tracing::info!(
            ticket = %ticket.id,
            service,
            error_code = %ticket.error_code,
            severity = %severity,
            trace_id = %payload.trace_id,
            "Ticket opened"
        );
        self.ledger.record_ticket(ticket.clone());
        Some(ticket)
    }

    pub fn severity_map(&self) -> &SeverityMap {
        &self.severity
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }
}
