//! Failure policy store
//!
//! Holds the injectable failure definitions. A policy is loaded from a
//! JSON or YAML document:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "failure_modes": [
//!     {
//!       "id": "billing_currency_missing",
//!       "service": "billing",
//!       "type": "schema_mismatch",
//!       "error_code": "BILLING_400",
//!       "message": "Missing required field: currency",
//!       "probability": 0.3,
//!       "missing_fields": ["currency"]
//!     }
//!   ]
//! }
//! ```
//!
//! Rules are kept in file order; that order is the priority the injector
//! uses when more than one rule triggers on the same call. Readers take an
//! `Arc` snapshot, and reloads swap the whole policy at once.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{parse_by_extension, read_file, ConfigError, ConfigResult};

const BUILTIN_POLICY: &str = include_str!("../policies/failure_policy.json");

/// Category of an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request payload is missing a field the backend requires.
    SchemaMismatch,
    /// Retried request was not deduplicated.
    DuplicateRequest,
    /// Client call has no timeout / abort handling.
    TimeoutHandling,
    /// Field was sent with the wrong type or unit.
    TypeMismatch,
    /// Downstream dependency unavailable.
    Unavailable,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl FailureKind {
    /// Whether the failure is a request-schema error (always critical).
    pub fn is_schema_error(self) -> bool {
        matches!(self, Self::SchemaMismatch | Self::TypeMismatch)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SchemaMismatch => "schema_mismatch",
            Self::DuplicateRequest => "duplicate_request",
            Self::TimeoutHandling => "timeout_handling",
            Self::TypeMismatch => "type_mismatch",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A single injectable failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRule {
    pub id: String,
    pub service: String,
    #[serde(rename = "type")]
    pub kind: FailureKind,
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Request fields the simulated backend reports as missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    /// Log-style symptom lines attached to tickets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symptoms: Vec<String>,
    /// Arbitrary extra metadata, copied into the failure payload details.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FailureRule {
    fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::empty("failure rule", "id"));
        }
        let ctx = || format!("failure rule '{}'", self.id);
        if self.service.trim().is_empty() {
            return Err(ConfigError::empty(ctx(), "service"));
        }
        if self.error_code.trim().is_empty() {
            return Err(ConfigError::empty(ctx(), "error_code"));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::InvalidProbability {
                rule_id: self.id.clone(),
                probability: self.probability,
            });
        }
        Ok(())
    }
}

/// Policy-wide knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Seed for the process-wide random source, when the policy pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

/// The full set of injectable failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// When false the injector never triggers.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub global_settings: GlobalSettings,
    #[serde(default, alias = "rules")]
    pub failure_modes: Vec<FailureRule>,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            global_settings: GlobalSettings::default(),
            failure_modes: Vec::new(),
        }
    }
}

impl FailurePolicy {
    /// Parse and validate a JSON policy document.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let policy: Self = serde_json::from_str(json).map_err(|source| ConfigError::Json {
            origin: "<inline>".to_string(),
            source,
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse and validate a YAML policy document.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let policy: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            origin: "<inline>".to_string(),
            source,
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy from a `.json`, `.yaml` or `.yml` file.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = read_file(path)?;
        let policy: Self = parse_by_extension(path, &content)?;
        policy.validate()?;
        Ok(policy)
    }

    /// The policy compiled into the crate (four demo failure modes).
    pub fn builtin() -> ConfigResult<Self> {
        Self::from_json(BUILTIN_POLICY)
    }

    /// A policy with no rules; every call succeeds.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Check probabilities, required fields and rule-id uniqueness.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for rule in &self.failure_modes {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(ConfigError::DuplicateRule(rule.id.clone()));
            }
        }
        Ok(())
    }

    /// Rules for a service, in priority (file) order.
    pub fn rules_for<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a FailureRule> {
        self.failure_modes.iter().filter(move |r| r.service == service)
    }

    /// Look up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&FailureRule> {
        self.failure_modes.iter().find(|r| r.id == id)
    }

    /// Ids of rules that carry no `fix_hint` for the demo presenter.
    pub fn rules_without_hint(&self) -> Vec<&str> {
        self.failure_modes
            .iter()
            .filter(|r| r.fix_hint.as_deref().map_or(true, |h| h.trim().is_empty()))
            .map(|r| r.id.as_str())
            .collect()
    }
}

/// Shared reference to a PolicyStore
pub type SharedPolicyStore = Arc<PolicyStore>;

/// Hot-reloadable holder of the current [`FailurePolicy`].
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<FailurePolicy>>,
}

impl PolicyStore {
    /// Wrap an already-validated policy.
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// Store holding the builtin policy.
    pub fn builtin() -> ConfigResult<Self> {
        Ok(Self::new(FailurePolicy::builtin()?))
    }

    /// Store loaded from a file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        Ok(Self::new(FailurePolicy::load_file(path)?))
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedPolicyStore {
        Arc::new(self)
    }

    /// Consistent view of the current policy.
    pub fn snapshot(&self) -> Arc<FailurePolicy> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Validate and atomically swap in a new policy.
    pub fn replace(&self, policy: FailurePolicy) -> ConfigResult<()> {
        policy.validate()?;
        let rules = policy.failure_modes.len();
        let next = Arc::new(policy);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        tracing::info!(rules, "Failure policy replaced");
        Ok(())
    }

    /// Re-read the policy from disk. On error the current policy is kept.
    pub fn reload_from_path(&self, path: &Path) -> ConfigResult<()> {
        let policy = FailurePolicy::load_file(path)?;
        self.replace(policy)
    }
}
