//! Event stream for live triage consumers
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Orchestrator │────▶│  Event Bus   │────▶│  Live views  │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The orchestrator publishes one event per state transition, finding and
//! action, in call order. Consumers connect and disconnect independently;
//! there is no history replay.

pub mod bus;
pub mod types;

pub use bus::{
    EventBus, EventBusExt, EventFilter, FilteredReceiver, SharedEventBus, CHANNEL_CAPACITY,
};
pub use types::{TransitionPayload, TriageEvent};
