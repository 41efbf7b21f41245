//! Triage call state machine: explicit states and legal transition guards.
//!
//! A call is a single forward pass:
//!
//! ```text
//! Open → Assessing → Diagnosing → Remediating → Deployed → Closed
//! ```
//!
//! `Closed` is also reachable from `Assessing`, `Diagnosing` and
//! `Remediating` when the agent-turn budget runs out or no actionable
//! finding appears (the unresolved path). `Aborted` is reachable from any
//! non-terminal state on external cancellation. Nothing leaves a terminal
//! state and nothing moves backwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// States of a triage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    /// Call created, no agent invoked yet.
    Open,
    /// Main and SRE agents gather the initial picture.
    Assessing,
    /// Domain agents look up the error code in their runbooks.
    Diagnosing,
    /// A suggested action exists; the frontend agent may patch.
    Remediating,
    /// A patch was applied and (simulated) deployed.
    Deployed,
    /// Terminal: call finished, RCA follows.
    Closed,
    /// Terminal: run cancelled mid-triage.
    Aborted,
}

impl CallState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Assessing => write!(f, "ASSESSING"),
            Self::Diagnosing => write!(f, "DIAGNOSING"),
            Self::Remediating => write!(f, "REMEDIATING"),
            Self::Deployed => write!(f, "DEPLOYED"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

fn is_legal_transition(from: CallState, to: CallState) -> bool {
    use CallState::*;

    if to == Aborted && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Open, Assessing)
            | (Assessing, Diagnosing)
            | (Diagnosing, Remediating)
            | (Remediating, Deployed)
            | (Deployed, Closed)
            // unresolved / budget exhausted
            | (Assessing, Closed)
            | (Diagnosing, Closed)
            | (Remediating, Closed)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: CallState,
    pub to: CallState,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: CallState,
    pub to: CallState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal call transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state and the full transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachine {
    current: CallState,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// A machine in `Open`.
    pub fn new() -> Self {
        Self {
            current: CallState::Open,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> CallState {
        self.current
    }

    /// Attempt to advance to `to`, returning the new record on success.
    pub fn advance(
        &mut self,
        to: CallState,
        reason: Option<&str>,
    ) -> Result<&TransitionRecord, IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "Call state transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(&self.transitions[self.transitions.len() - 1])
    }

    /// Move to `Aborted` from any non-terminal state.
    pub fn abort(&mut self, reason: &str) -> Result<&TransitionRecord, IllegalTransition> {
        self.advance(CallState::Aborted, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// `OPEN → ASSESSING → ... (n transitions)`
    pub fn summary(&self) -> String {
        let mut states = vec![CallState::Open.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!("{} ({} transitions)", states.join(" → "), self.transitions.len())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), CallState::Open);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut sm = StateMachine::new();
        sm.advance(CallState::Assessing, None).unwrap();
        sm.advance(CallState::Diagnosing, None).unwrap();
        sm.advance(CallState::Remediating, Some("suggested action"))
            .unwrap();
        sm.advance(CallState::Deployed, Some("patch applied"))
            .unwrap();
        sm.advance(CallState::Closed, None).unwrap();

        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 5);
    }

    #[test]
    fn test_unresolved_close_from_diagnosing() {
        let mut sm = StateMachine::new();
        sm.advance(CallState::Assessing, None).unwrap();
        sm.advance(CallState::Diagnosing, None).unwrap();
        sm.advance(CallState::Closed, Some("no actionable finding"))
            .unwrap();
        assert_eq!(sm.current(), CallState::Closed);
    }

    #[test]
    fn test_abort_from_any_live_state() {
        for state in [
            CallState::Open,
            CallState::Assessing,
            CallState::Diagnosing,
            CallState::Remediating,
            CallState::Deployed,
        ] {
            let mut sm = StateMachine {
                current: state,
                transitions: Vec::new(),
            };
            assert!(sm.abort("cancelled").is_ok());
            assert_eq!(sm.current(), CallState::Aborted);
        }
    }

    #[test]
    fn test_cannot_leave_terminal() {
        let mut sm = StateMachine::new();
        sm.advance(CallState::Assessing, None).unwrap();
        sm.advance(CallState::Closed, None).unwrap();

        let err = sm.advance(CallState::Diagnosing, None).unwrap_err();
        assert_eq!(err.from, CallState::Closed);
        assert!(sm.abort("late").is_err());
    }

    #[test]
    fn test_no_backward_or_skipping() {
        let mut sm = StateMachine::new();
        assert!(sm.advance(CallState::Diagnosing, None).is_err());
        assert!(sm.advance(CallState::Closed, None).is_err());
        sm.advance(CallState::Assessing, None).unwrap();
        sm.advance(CallState::Diagnosing, None).unwrap();
        assert!(sm.advance(CallState::Assessing, None).is_err());
        assert!(sm.advance(CallState::Deployed, None).is_err());
    }

    #[test]
    fn test_record_keeps_reason() {
        let mut sm = StateMachine::new();
        let record = sm
            .advance(CallState::Assessing, Some("chair opened call"))
            .unwrap();
        assert_eq!(record.from, CallState::Open);
        assert_eq!(record.reason.as_deref(), Some("chair opened call"));
    }

    #[test]
    fn test_summary() {
        let mut sm = StateMachine::new();
        sm.advance(CallState::Assessing, None).unwrap();
        sm.abort("test").unwrap();
        let summary = sm.summary();
        assert!(summary.contains("ABORTED"));
        assert!(summary.contains("2 transitions"));
    }
}
