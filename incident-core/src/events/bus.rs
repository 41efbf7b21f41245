//! Event bus for the live triage view
//!
//! Tokio broadcast fan-out. Publishing never blocks and never fails the
//! caller: with no subscribers the event is dropped, and a lagging
//! subscriber loses the oldest events rather than stalling the publisher.
//! A subscriber only sees events published after it subscribed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::TriageEvent;

/// Default channel capacity for broadcast
pub const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<TriageEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers, returning how many received it.
    pub fn publish(&self, event: TriageEvent) -> usize {
        let event_type = event.event_type();
        let sequence = event.sequence();
        self.published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, sequence, receivers = count, "Event published");
                count
            }
            Err(_) => {
                debug!(event_type, sequence, "Event published (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TriageEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since creation.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub ticket_id: Option<String>,
    pub event_types: Option<Vec<String>>,
    /// Let terminal transitions through regardless of the other criteria.
    pub keep_terminal: bool,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(mut self, ticket_id: &str) -> Self {
        self.ticket_id = Some(ticket_id.to_string());
        self
    }

    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    /// Always deliver the event that ends a call, so a consumer filtering
    /// by type still learns when to stop.
    pub fn until_terminal(mut self) -> Self {
        self.keep_terminal = true;
        self
    }

    pub fn matches(&self, event: &TriageEvent) -> bool {
        if self.keep_terminal && event.is_terminal() {
            return true;
        }

        if let Some(ref tid) = self.ticket_id {
            if event.ticket_id() != tid {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<TriageEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<TriageEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<TriageEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// Extension trait for subscribing with filters
pub trait EventBusExt {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

impl EventBusExt for SharedEventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::TransitionPayload;
    use crate::state_machine::CallState;
    use crate::triage::{AgentRole, Finding};
    use chrono::Utc;

    fn transition(ticket: &str, sequence: u64, to: CallState) -> TriageEvent {
        TriageEvent::StateTransition {
            ticket_id: ticket.to_string(),
            sequence,
            timestamp: Utc::now(),
            payload: TransitionPayload {
                from: CallState::Open,
                to,
                reason: None,
            },
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(transition("INC-1", 1, CallState::Assessing)), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "state-transition");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(transition("INC-1", 1, CallState::Assessing)), 0);
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_new_events() {
        let bus = EventBus::new().shared();
        bus.publish(transition("INC-1", 1, CallState::Assessing));

        let mut late = bus.subscribe();
        bus.publish(transition("INC-1", 2, CallState::Diagnosing));

        assert_eq!(late.recv().await.unwrap().sequence(), 2);
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_blocking() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for seq in 1..=5 {
            bus.publish(transition("INC-1", seq, CallState::Assessing));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap().sequence(), 4);
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::new().ticket("INC-1").types(vec!["finding"]);

        let finding = TriageEvent::Finding {
            ticket_id: "INC-1".into(),
            sequence: 3,
            timestamp: Utc::now(),
            payload: Finding::new(AgentRole::Main, "INC-1", "summary", 0.5),
        };

        assert!(filter.matches(&finding));
        assert!(!filter.matches(&transition("INC-1", 1, CallState::Assessing)));
        assert!(!EventFilter::new()
            .ticket("INC-2")
            .matches(&finding));
    }

    #[test]
    fn test_filter_keeps_terminal_transition() {
        let filter = EventFilter::new().types(vec!["action"]).until_terminal();
        assert!(filter.matches(&transition("INC-1", 9, CallState::Closed)));
        assert!(filter.matches(&transition("INC-1", 9, CallState::Aborted)));
        assert!(!filter.matches(&transition("INC-1", 2, CallState::Diagnosing)));
        assert!(!EventFilter::new()
            .types(vec!["action"])
            .matches(&transition("INC-1", 9, CallState::Closed)));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new().shared();
        let mut filtered = bus.subscribe_filtered(EventFilter::new().ticket("INC-2"));

        let publisher = Arc::clone(&bus);
        tokio::spawn(async move {
            publisher.publish(transition("INC-1", 1, CallState::Assessing));
            publisher.publish(transition("INC-2", 1, CallState::Assessing));
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.ticket_id(), "INC-2");
    }
}
