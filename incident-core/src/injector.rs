//! Failure injector: decides per simulated call whether a failure occurs.
//!
//! Each rule for the service gets its own independent draw. Rules are not
//! mutually exclusive; when several trigger, the first in policy order wins.
//! The injector keeps no state between calls beyond the shared random
//! source and does no logging or queueing.

use crate::policy::{FailureRule, SharedPolicyStore};
use crate::random::SharedRandom;

#[derive(Clone)]
pub struct FailureInjector {
    policy: SharedPolicyStore,
    rng: SharedRandom,
}

impl FailureInjector {
    pub fn new(policy: SharedPolicyStore, rng: SharedRandom) -> Self {
        Self { policy, rng }
    }

    /// Decide whether a call to `service` fails, and with which rule.
    pub fn sample(&self, service: &str) -> Option<FailureRule> {
        let policy = self.policy.snapshot();
        if !policy.enabled {
            return None;
        }

        let mut triggered: Option<&FailureRule> = None;
        for rule in policy.rules_for(service) {
            // Draw for every applicable rule so the number of draws per call
            // does not depend on which rule fired.
            let draw = self.rng.next_unit();
            if triggered.is_none() && draw < rule.probability {
                triggered = Some(rule);
            }
        }
        triggered.cloned()
    }

    /// Return the rule with `rule_id` regardless of its probability.
    pub fn force(&self, rule_id: &str) -> Option<FailureRule> {
        self.policy.snapshot().rule(rule_id).cloned()
    }

    pub fn policy(&self) -> &SharedPolicyStore {
        &self.policy
    }
}

impl std::fmt::Debug for FailureInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureInjector")
            .field("rules", &self.policy.snapshot().failure_modes.len())
            .finish()
    }
}
