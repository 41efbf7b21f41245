//! Incident Core Library
//!
//! Deterministic infrastructure for simulated incident triage:
//! - Failure policy store and probabilistic failure injection
//! - Billing/ordering/frontend service simulator
//! - Alert engine turning failure payloads into tickets
//! - Hot-editable per-role runbooks
//! - Triage call data model and state machine
//! - Broadcast event stream for live views
//! - Ledger of tickets, archived calls and RCA reports
//!
//! # Flow
//!
//! ```text
//! FailurePolicy ─▶ FailureInjector ─▶ ServiceSimulator ─▶ AlertEngine ─▶ Ticket
//!                                                                        │
//!                      RunbookStore ─▶ (agents, orchestrator) ◀──────────┘
//!                                             │
//!                                 EventBus ◀──┴──▶ IncidentLedger
//! ```
//!
//! The failure injector is the only nondeterministic component; its random
//! source is injected so tests can substitute a fixed sequence.

#![allow(clippy::uninlined_format_args)]

pub mod alert;
pub mod error;
pub mod events;
pub mod injector;
pub mod ledger;
pub mod policy;
pub mod random;
pub mod report;
pub mod runbook;
pub mod simulator;
pub mod state_machine;
pub mod ticket;
pub mod triage;

pub use alert::{AlertEngine, Severity, SeverityMap};
pub use error::{ConfigError, ConfigResult};
pub use events::{EventBus, SharedEventBus, TriageEvent};
pub use injector::FailureInjector;
pub use ledger::{IncidentLedger, SharedLedger};
pub use policy::{FailureKind, FailurePolicy, FailureRule, PolicyStore, SharedPolicyStore};
pub use random::{RandomSource, SeededSource, SequenceSource, SharedRandom};
pub use report::RcaReport;
pub use runbook::{Runbook, RunbookStore, SharedRunbookStore};
pub use simulator::{CheckoutRequest, FailurePayload, ServiceOutcome, ServiceSimulator};
pub use state_machine::{CallState, IllegalTransition, StateMachine, TransitionRecord};
pub use ticket::{Ticket, TicketId, TicketStatus};
pub use triage::{Action, ActionKind, AgentRole, CodeLocation, Finding, SuggestedAction, TriageCall};
