use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use incident_core::simulator::{BILLING, FRONTEND, ORDERING};
use incident_core::{AgentRole, Severity, SeverityMap};
use serde::{Deserialize, Serialize};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn default_routing() -> BTreeMap<String, Vec<AgentRole>> {
    BTreeMap::from([
        (BILLING.to_string(), vec![AgentRole::Billing, AgentRole::Ordering]),
        (ORDERING.to_string(), vec![AgentRole::Ordering, AgentRole::Billing]),
        (FRONTEND.to_string(), vec![AgentRole::Frontend]),
    ])
}

/// Top-level triage configuration.
///
/// Loaded from TOML; any field left out falls back to [`Default`], which
/// reads `TRIAGE_*` environment variables first. Environment variables
/// also override values set in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Seed for the process-wide random source (None = OS entropy).
    pub seed: Option<u64>,
    /// Failure policy JSON/YAML (None = builtin policy).
    pub policy_path: Option<PathBuf>,
    /// Runbook directory (None = builtin runbooks).
    pub runbook_dir: Option<PathBuf>,
    /// Agent invocations allowed per call before it closes unresolved.
    pub max_agent_turns: u32,
    /// Simulated checkouts per demo run.
    pub max_calls: u32,
    /// Services exercised per simulated checkout, in order.
    pub services: Vec<String>,
    /// Domain agents consulted per service, in order.
    pub routing: BTreeMap<String, Vec<AgentRole>>,
    pub severity_overrides: BTreeMap<String, Severity>,
    /// Broadcast buffer per subscriber.
    pub event_capacity: usize,
    /// Delay between agent turns, for narrated demos.
    pub pacing_ms: u64,
    /// Budget for one generator call.
    pub generator_timeout_ms: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            seed: env_parse("TRIAGE_SEED"),
            policy_path: env_path("TRIAGE_POLICY_PATH"),
            runbook_dir: env_path("TRIAGE_RUNBOOK_DIR"),
            max_agent_turns: env_parse("TRIAGE_MAX_AGENT_TURNS").unwrap_or(8),
            max_calls: env_parse("TRIAGE_MAX_CALLS").unwrap_or(50),
            services: vec![BILLING.into(), ORDERING.into(), FRONTEND.into()],
            routing: default_routing(),
            severity_overrides: BTreeMap::new(),
            event_capacity: incident_core::events::CHANNEL_CAPACITY,
            pacing_ms: 0,
            generator_timeout_ms: 5_000,
        }
    }
}

impl TriageConfig {
    /// Parse TOML, then let `TRIAGE_*` variables override it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse triage config TOML")?;
        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// `from_file` when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(seed) = env_parse("TRIAGE_SEED") {
            self.seed = Some(seed);
        }
        if let Some(path) = env_path("TRIAGE_POLICY_PATH") {
            self.policy_path = Some(path);
        }
        if let Some(dir) = env_path("TRIAGE_RUNBOOK_DIR") {
            self.runbook_dir = Some(dir);
        }
        if let Some(turns) = env_parse("TRIAGE_MAX_AGENT_TURNS") {
            self.max_agent_turns = turns;
        }
        if let Some(calls) = env_parse("TRIAGE_MAX_CALLS") {
            self.max_calls = calls;
        }
        self
    }

    pub fn severity_map(&self) -> SeverityMap {
        self.severity_overrides
            .iter()
            .fold(SeverityMap::default(), |map, (code, sev)| {
                map.with_override(code.clone(), *sev)
            })
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TriageConfig::default();
        assert_eq!(config.services, vec!["billing", "ordering", "frontend"]);
        assert_eq!(
            config.routing["billing"],
            vec![AgentRole::Billing, AgentRole::Ordering]
        );
        assert!(!config.routing.contains_key("inventory"));
        assert_eq!(config.pacing(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TriageConfig = toml::from_str(
            r#"
pacing_ms = 250
services = ["billing"]

[routing]
billing = ["billing", "frontend"]

[severity_overrides]
ORDER_409 = "critical"
"#,
        )
        .unwrap();

        assert_eq!(config.pacing_ms, 250);
        assert_eq!(config.services, vec!["billing"]);
        assert_eq!(
            config.routing["billing"],
            vec![AgentRole::Billing, AgentRole::Frontend]
        );
        assert_eq!(
            config.severity_map().overrides.get("ORDER_409"),
            Some(&Severity::Critical)
        );
        assert_eq!(config.event_capacity, incident_core::events::CHANNEL_CAPACITY);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.toml");
        std::fs::write(&path, "generator_timeout_ms = 750\n").unwrap();

        let config = TriageConfig::from_file(&path).unwrap();
        assert_eq!(config.generator_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(TriageConfig::from_toml("max_agent_turns = \"many\"").is_err());
        assert!(TriageConfig::from_file(Path::new("/nonexistent/triage.toml")).is_err());
    }
}
