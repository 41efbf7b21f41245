//! End-to-end demo run: simulated checkouts until the first ticket, then
//! one triage call over it.

use std::io::Write;

use incident_core::events::{EventBus, FilteredReceiver, SharedEventBus};
use incident_core::ledger::{IncidentLedger, SharedLedger};
use incident_core::policy::{PolicyStore, SharedPolicyStore};
use incident_core::random::{SeededSource, SharedRandom};
use incident_core::runbook::{RunbookStore, SharedRunbookStore};
use incident_core::{
    AlertEngine, CheckoutRequest, ConfigError, FailureInjector, RcaReport, ServiceSimulator,
    Ticket,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::TriageConfig;
use crate::error::OrchestrationError;
use crate::generator::SharedGenerator;
use crate::orchestrator::{CallOutcome, TriageOrchestrator};

/// How a demo run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// No failure fired in `calls` simulated checkouts.
    Idle { calls: u32 },
    /// A ticket was opened and triaged (possibly aborted).
    Triaged(CallOutcome),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RcaReport> {
        match self {
            Self::Idle { .. } => None,
            Self::Triaged(outcome) => outcome.report.as_ref(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }
}

pub struct DemoRunner {
    policy: SharedPolicyStore,
    runbooks: SharedRunbookStore,
    simulator: ServiceSimulator,
    alerts: AlertEngine,
    orchestrator: TriageOrchestrator,
    services: Vec<String>,
    max_calls: u32,
}

impl DemoRunner {
    /// Load policy and runbooks named by `config` and seed the random
    /// source from `config.seed`, falling back to the policy's own seed.
    pub fn from_config(
        config: &TriageConfig,
        generator: Option<SharedGenerator>,
    ) -> Result<Self, OrchestrationError> {
        let policy = match &config.policy_path {
            Some(path) => PolicyStore::from_file(path)?,
            None => PolicyStore::builtin()?,
        }
        .shared();
        let seed = config
            .seed
            .or(policy.snapshot().global_settings.seed);
        info!(?seed, "Random source initialised");
        let rng = SeededSource::new(seed).shared();
        Self::with_random(config, policy, rng, generator)
    }

    /// Build with an explicit policy store and random source.
    pub fn with_random(
        config: &TriageConfig,
        policy: SharedPolicyStore,
        rng: SharedRandom,
        generator: Option<SharedGenerator>,
    ) -> Result<Self, OrchestrationError> {
        let runbooks = match &config.runbook_dir {
            Some(dir) => RunbookStore::from_dir(dir)?,
            None => RunbookStore::builtin()?,
        }
        .shared();
        let ledger = IncidentLedger::new().shared();
        let events = EventBus::with_capacity(config.event_capacity).shared();

        let mut orchestrator =
            TriageOrchestrator::new(config, runbooks.clone(), ledger.clone(), events);
        if let Some(generator) = generator {
            orchestrator = orchestrator.with_generator(generator);
        }

        Ok(Self {
            simulator: ServiceSimulator::new(FailureInjector::new(policy.clone(), rng)),
            alerts: AlertEngine::new(config.severity_map(), ledger),
            policy,
            runbooks,
            orchestrator,
            services: config.services.clone(),
            max_calls: config.max_calls,
        })
    }

    pub fn events(&self) -> &SharedEventBus {
        self.orchestrator.events()
    }

    pub fn ledger(&self) -> &SharedLedger {
        self.orchestrator.ledger()
    }

    pub fn policy(&self) -> &SharedPolicyStore {
        &self.policy
    }

    pub fn runbooks(&self) -> &SharedRunbookStore {
        &self.runbooks
    }

    /// Run the demo. With `force`, the named policy rule fires on the first
    /// call regardless of its probability.
    pub async fn run(
        &self,
        force: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestrationError> {
        let ticket = match force {
            Some(rule_id) => Some(self.forced_ticket(rule_id)?),
            None => self.first_ticket(cancel),
        };

        match ticket {
            Some(ticket) => {
                let outcome = self.orchestrator.run_ticket(&ticket.id, cancel).await?;
                Ok(RunOutcome::Triaged(outcome))
            }
            None => {
                info!(calls = self.max_calls, "Idle run: no failure detected");
                Ok(RunOutcome::Idle {
                    calls: self.max_calls,
                })
            }
        }
    }

    fn forced_ticket(&self, rule_id: &str) -> Result<Ticket, OrchestrationError> {
        let rule = self
            .policy
            .snapshot()
            .rule(rule_id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRule(rule_id.to_string()))?;
        let outcome =
            self.simulator
                .invoke_forced(&rule.service, &CheckoutRequest::demo(), rule_id);
        self.alerts
            .observe(&rule.service, &outcome)
            .ok_or_else(|| ConfigError::UnknownRule(rule_id.to_string()).into())
    }

    /// Simulated checkouts across every configured service until the first
    /// ticket opens.
    fn first_ticket(&self, cancel: &CancellationToken) -> Option<Ticket> {
        for call in 1..=self.max_calls {
            if cancel.is_cancelled() {
                return None;
            }
            let request = CheckoutRequest::demo();
            for service in &self.services {
                let outcome = self.simulator.invoke(service, &request);
                if let Some(ticket) = self.alerts.observe(service, &outcome) {
                    info!(call, service = %service, ticket = %ticket.id, "Failure detected");
                    return Some(ticket);
                }
            }
        }
        None
    }
}

/// Write matching events to `out` as JSON lines until the call's terminal
/// event or until the bus closes. Returns the number of lines written.
///
/// A receiver that falls behind skips the dropped events and keeps going.
pub async fn write_event_lines(mut rx: FilteredReceiver, mut out: impl Write) -> usize {
    let mut written = 0;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind, events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = writeln!(out, "{line}") {
                    warn!("Failed to write event: {e}");
                    break;
                }
                written += 1;
            }
            Err(e) => warn!("Failed to serialize event: {e}"),
        }
        if event.is_terminal() {
            break;
        }
    }
    written
}
