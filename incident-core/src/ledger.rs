//! Incident ledger: read access to current and past tickets, archived
//! calls and RCA reports.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::report::RcaReport;
use crate::ticket::{Ticket, TicketId, TicketStatus};
use crate::triage::TriageCall;

pub type SharedLedger = Arc<IncidentLedger>;

#[derive(Debug, Default)]
struct LedgerInner {
    tickets: BTreeMap<TicketId, Ticket>,
    calls: BTreeMap<TicketId, TriageCall>,
    reports: BTreeMap<TicketId, RcaReport>,
}

#[derive(Debug, Default)]
pub struct IncidentLedger {
    inner: RwLock<LedgerInner>,
}

impl IncidentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedLedger {
        Arc::new(self)
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerInner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerInner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn record_ticket(&self, ticket: Ticket) {
        self.write().tickets.insert(ticket.id.clone(), ticket);
    }

    /// All tickets, ordered by id.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.read().tickets.values().cloned().collect()
    }

    pub fn ticket(&self, id: &str) -> Option<Ticket> {
        self.read().tickets.get(id).cloned()
    }

    /// Update a ticket's status; returns the updated ticket.
    pub fn set_status(&self, id: &str, status: TicketStatus) -> Option<Ticket> {
        let mut inner = self.write();
        let ticket = inner.tickets.get_mut(id)?;
        ticket.status = status;
        Some(ticket.clone())
    }

    /// Store a finished call. A call is archived once and never changes.
    pub fn archive_call(&self, call: TriageCall) {
        self.write().calls.insert(call.ticket_id.clone(), call);
    }

    pub fn archived_call(&self, ticket_id: &str) -> Option<TriageCall> {
        self.read().calls.get(ticket_id).cloned()
    }

    pub fn record_report(&self, report: RcaReport) {
        self.write().reports.insert(report.ticket_id.clone(), report);
    }

    pub fn report(&self, ticket_id: &str) -> Option<RcaReport> {
        self.read().reports.get(ticket_id).cloned()
    }

    pub fn reports(&self) -> Vec<RcaReport> {
        self.read().reports.values().cloned().collect()
    }

    pub fn open_tickets(&self) -> Vec<Ticket> {
        self.read()
            .tickets
            .values()
            .filter(|t| t.status != TicketStatus::Resolved)
            .cloned()
            .collect()
    }
}
