//! Triage agents library
//!
//! Chair-driven multi-agent triage over tickets opened by `incident-core`:
//! agent roles and the chair controller, prompt templating, the optional
//! text-generation seam, the call orchestrator, RCA synthesis and the
//! end-to-end demo runner.

#![allow(clippy::uninlined_format_args)]

pub mod agents;
pub mod config;
pub mod demo;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod rca;

pub use agents::{AgentRoster, ChairAgent, TriageAgent};
pub use config::TriageConfig;
pub use demo::{DemoRunner, RunOutcome};
pub use error::{GeneratorError, OrchestrationError};
pub use generator::{SharedGenerator, TextGenerator};
pub use orchestrator::{CallOutcome, TriageOrchestrator};
