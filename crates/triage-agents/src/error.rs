//! Error taxonomy for the triage layer.
//!
//! Only configuration problems reach the operator as hard failures.
//! Agent degradation and generator failures are absorbed into findings;
//! cancellation ends the call in `ABORTED` and is reported as data.

use std::time::Duration;

use incident_core::{ConfigError, IllegalTransition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Failure policy or runbook input rejected at load time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The orchestrator attempted a transition its state table forbids.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// A ticket id with no ledger entry.
    #[error("unknown ticket {0}")]
    UnknownTicket(String),
}

/// Failures of the external text-generation backend.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator returned an empty response")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_core::CallState;

    #[test]
    fn test_transition_error_is_transparent() {
        let err: OrchestrationError = IllegalTransition {
            from: CallState::Closed,
            to: CallState::Assessing,
        }
        .into();
        assert_eq!(err.to_string(), "Illegal call transition: CLOSED → ASSESSING");
    }

    #[test]
    fn test_config_error_wraps() {
        let err: OrchestrationError = ConfigError::UnknownRole("payments".into()).into();
        assert!(err.to_string().contains("payments"));
    }
}
