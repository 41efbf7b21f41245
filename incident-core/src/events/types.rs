//! Event types published during a triage call
//!
//! Serialized with a kebab-case `type` tag:
//!
//! ```json
//! { "type": "state-transition", "ticket_id": "INC-2026-0001",
//!   "sequence": 3, "timestamp": "...", "payload": { "from": "OPEN", "to": "ASSESSING" } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::{CallState, TransitionRecord};
use crate::ticket::TicketId;
use crate::triage::{Action, Finding};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub from: CallState,
    pub to: CallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&TransitionRecord> for TransitionPayload {
    fn from(record: &TransitionRecord) -> Self {
        Self {
            from: record.from,
            to: record.to,
            reason: record.reason.clone(),
        }
    }
}

/// One entry of the ordered event stream.
///
/// `sequence` increases by one per event within a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TriageEvent {
    StateTransition {
        ticket_id: TicketId,
        sequence: u64,
        timestamp: DateTime<Utc>,
        payload: TransitionPayload,
    },

    Finding {
        ticket_id: TicketId,
        sequence: u64,
        timestamp: DateTime<Utc>,
        payload: Finding,
    },

    Action {
        ticket_id: TicketId,
        sequence: u64,
        timestamp: DateTime<Utc>,
        payload: Action,
    },
}

impl TriageEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state-transition",
            Self::Finding { .. } => "finding",
            Self::Action { .. } => "action",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            Self::StateTransition { ticket_id, .. }
            | Self::Finding { ticket_id, .. }
            | Self::Action { ticket_id, .. } => ticket_id,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            Self::StateTransition { sequence, .. }
            | Self::Finding { sequence, .. }
            | Self::Action { sequence, .. } => *sequence,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::StateTransition { timestamp, .. }
            | Self::Finding { timestamp, .. }
            | Self::Action { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this event ends the call (transition into CLOSED or ABORTED).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StateTransition { payload, .. } if payload.to.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = TriageEvent::StateTransition {
            ticket_id: "INC-2026-0001".into(),
            sequence: 1,
            timestamp: Utc::now(),
            payload: TransitionPayload {
                from: CallState::Open,
                to: CallState::Assessing,
                reason: None,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state-transition");
        assert_eq!(json["ticket_id"], "INC-2026-0001");
        assert_eq!(json["payload"]["to"], "ASSESSING");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_detection() {
        let event = TriageEvent::StateTransition {
            ticket_id: "INC-2026-0001".into(),
            sequence: 9,
            timestamp: Utc::now(),
            payload: TransitionPayload {
                from: CallState::Diagnosing,
                to: CallState::Aborted,
                reason: Some("cancelled".into()),
            },
        };
        assert!(event.is_terminal());
        let back: TriageEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
