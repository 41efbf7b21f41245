//! Runbook store: per-role knowledge documents, hot-editable.
//!
//! A runbook is loaded from YAML or JSON:
//!
//! ```yaml
//! role: billing
//! description: Billing and payment domain expert
//! knowledge:
//!   BILLING_400:
//!     guidance: Request reached billing without a required field.
//!     confidence: 0.9
//!     fix_template:
//!       description: Add the missing field(s) {missing_fields} to the request body
//!       code_path: frontend/src/checkout/createOrder.ts
//! escalation_rules:
//!   - condition: fix requires frontend change
//!     escalate_to: frontend
//! ```
//!
//! Edits are atomic replacements of whole documents. Readers hold an
//! `Arc<Runbook>` snapshot and never observe a half-applied edit.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{parse_by_extension, read_file, ConfigError, ConfigResult};
use crate::triage::AgentRole;

const BUILTIN_RUNBOOKS: [(&str, &str); 6] = [
    ("chair.yaml", include_str!("../runbooks/chair.yaml")),
    ("main.yaml", include_str!("../runbooks/main.yaml")),
    ("sre.yaml", include_str!("../runbooks/sre.yaml")),
    ("billing.yaml", include_str!("../runbooks/billing.yaml")),
    ("ordering.yaml", include_str!("../runbooks/ordering.yaml")),
    ("frontend.yaml", include_str!("../runbooks/frontend.yaml")),
];

fn default_confidence() -> f32 {
    0.8
}

fn de_role<'de, D>(deserializer: D) -> Result<AgentRole, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Values substituted into a fix template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    pub error_code: &'a str,
    pub service: &'a str,
    pub missing_fields: &'a [String],
}

/// A fix an agent may suggest when its knowledge entry matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixTemplate {
    /// Text with `{missing_fields}`, `{error_code}` and `{service}` placeholders.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_path: Option<String>,
}

impl FixTemplate {
    pub fn render(&self, ctx: &TemplateContext<'_>) -> String {
        let fields = if ctx.missing_fields.is_empty() {
            "(none reported)".to_string()
        } else {
            ctx.missing_fields
                .iter()
                .map(|f| format!("\"{f}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.description
            .replace("{missing_fields}", &fields)
            .replace("{error_code}", ctx.error_code)
            .replace("{service}", ctx.service)
    }
}

/// Guidance for one error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub guidance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_template: Option<FixTemplate>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub condition: String,
    pub escalate_to: String,
}

/// Knowledge and behaviour of one agent role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    #[serde(alias = "agent", deserialize_with = "de_role")]
    pub role: AgentRole,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub triage_steps: Vec<String>,
    /// error_code → guidance
    #[serde(default)]
    pub knowledge: BTreeMap<String, KnowledgeEntry>,
    /// Checked in order.
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub response_templates: BTreeMap<String, String>,
}

impl Runbook {
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            description: String::new(),
            objectives: Vec::new(),
            triage_steps: Vec::new(),
            knowledge: BTreeMap::new(),
            escalation_rules: Vec::new(),
            response_templates: BTreeMap::new(),
        }
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let runbook: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            origin: "runbook".to_string(),
            source,
        })?;
        runbook.validate()?;
        Ok(runbook)
    }

    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = read_file(path)?;
        let runbook: Self = parse_by_extension(path, &content)?;
        runbook.validate()?;
        Ok(runbook)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let context = format!("runbook {}", self.role);
        for (code, entry) in &self.knowledge {
            if code.trim().is_empty() {
                return Err(ConfigError::empty(&context, "knowledge.error_code"));
            }
            if entry.guidance.trim().is_empty() {
                return Err(ConfigError::empty(format!("{context} {code}"), "guidance"));
            }
            if !(0.0..=1.0).contains(&entry.confidence) {
                return Err(ConfigError::InvalidConfidence {
                    role: self.role.to_string(),
                    error_code: code.clone(),
                    confidence: entry.confidence,
                });
            }
        }
        for rule in &self.escalation_rules {
            if rule.escalate_to.trim().is_empty() {
                return Err(ConfigError::empty(&context, "escalate_to"));
            }
        }
        Ok(())
    }

    pub fn lookup(&self, error_code: &str) -> Option<&KnowledgeEntry> {
        self.knowledge.get(error_code)
    }

    pub fn template(&self, key: &str) -> Option<&str> {
        self.response_templates.get(key).map(String::as_str)
    }
}

type RunbookMap = HashMap<AgentRole, Arc<Runbook>>;

/// Shared handle passed to every agent.
pub type SharedRunbookStore = Arc<RunbookStore>;

#[derive(Debug)]
pub struct RunbookStore {
    books: RwLock<Arc<RunbookMap>>,
}

impl RunbookStore {
    /// Build a store from documents; two documents for one role is an error.
    pub fn new(runbooks: Vec<Runbook>) -> ConfigResult<Self> {
        Ok(Self {
            books: RwLock::new(Arc::new(index(runbooks)?)),
        })
    }

    /// Store holding the runbooks compiled into this crate.
    pub fn builtin() -> ConfigResult<Self> {
        Self::new(builtin_runbooks()?)
    }

    pub fn from_dir(dir: &Path) -> ConfigResult<Self> {
        Self::new(load_dir(dir)?)
    }

    pub fn shared(self) -> SharedRunbookStore {
        Arc::new(self)
    }

    fn current(&self) -> Arc<RunbookMap> {
        match self.books.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, next: RunbookMap) {
        self.update(|map| *map = next);
    }

    /// Apply `edit` to a copy of the map and publish it, all under the write lock.
    fn update(&self, edit: impl FnOnce(&mut RunbookMap)) {
        let mut guard = match self.books.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next: RunbookMap = (**guard).clone();
        edit(&mut next);
        *guard = Arc::new(next);
    }

    /// Consistent snapshot of one role's runbook.
    pub fn snapshot(&self, role: AgentRole) -> Option<Arc<Runbook>> {
        self.current().get(&role).cloned()
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        let mut roles: Vec<AgentRole> = self.current().keys().copied().collect();
        roles.sort();
        roles
    }

    /// Atomically replace (or add) one role's runbook.
    pub fn replace(&self, runbook: Runbook) -> ConfigResult<()> {
        runbook.validate()?;
        let role = runbook.role;
        self.update(|map| {
            map.insert(role, Arc::new(runbook));
        });
        tracing::info!(role = %role, "Runbook replaced");
        Ok(())
    }

    /// Parse every runbook in `dir` and swap them in as one unit.
    ///
    /// On error the store is left untouched.
    pub fn reload_dir(&self, dir: &Path) -> ConfigResult<usize> {
        let loaded = index(load_dir(dir)?)?;
        let count = loaded.len();
        self.swap(loaded);
        tracing::info!(dir = %dir.display(), runbooks = count, "Runbooks reloaded");
        Ok(count)
    }
}

fn index(runbooks: Vec<Runbook>) -> ConfigResult<RunbookMap> {
    let mut map = RunbookMap::new();
    for runbook in runbooks {
        let role = runbook.role;
        if map.insert(role, Arc::new(runbook)).is_some() {
            return Err(ConfigError::DuplicateRunbook(role.to_string()));
        }
    }
    Ok(map)
}

/// Parse the runbooks compiled into this crate.
pub fn builtin_runbooks() -> ConfigResult<Vec<Runbook>> {
    BUILTIN_RUNBOOKS
        .iter()
        .map(|(name, content)| {
            let runbook: Runbook = parse_by_extension(Path::new(name), content)?;
            runbook.validate()?;
            Ok(runbook)
        })
        .collect()
}

/// Load every `*.json`, `*.yaml` and `*.yml` file in `dir`, in file-name order.
pub fn load_dir(dir: &Path) -> ConfigResult<Vec<Runbook>> {
    if !dir.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_path_buf()));
    }
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let supported = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("json") | Some("yaml") | Some("yml")
        );
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort();

    paths.iter().map(|p| Runbook::load_file(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_role() {
        let store = RunbookStore::builtin().unwrap();
        assert_eq!(store.roles(), AgentRole::ALL.to_vec());
    }

    #[test]
    fn test_billing_knows_billing_400() {
        let store = RunbookStore::builtin().unwrap();
        let billing = store.snapshot(AgentRole::Billing).unwrap();
        let entry = billing.lookup("BILLING_400").unwrap();
        let template = entry.fix_template.as_ref().unwrap();
        assert!(template.code_path.as_deref().unwrap().starts_with("frontend/"));
    }

    #[test]
    fn test_render_fix_template() {
        let template = FixTemplate {
            description: "Add {missing_fields} before calling {service} ({error_code})".into(),
            code_path: None,
        };
        let fields = vec!["currency".to_string()];
        let text = template.render(&TemplateContext {
            error_code: "BILLING_400",
            service: "billing",
            missing_fields: &fields,
        });
        assert_eq!(text, "Add \"currency\" before calling billing (BILLING_400)");
    }

    #[test]
    fn test_role_accepts_agent_spelling() {
        let runbook = Runbook::from_yaml("agent: OrderingAgent\n").unwrap();
        assert_eq!(runbook.role, AgentRole::Ordering);
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(Runbook::from_yaml("role: payments\n").is_err());
    }

    #[test]
    fn test_empty_guidance_rejected() {
        let yaml = "role: billing\nknowledge:\n  BILLING_400:\n    guidance: \"\"\n";
        let err = Runbook::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyField { .. }));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let yaml = "role: billing\nknowledge:\n  BILLING_400:\n    guidance: g\n    confidence: 7.5\n";
        let err = Runbook::from_yaml(yaml).unwrap_err();
        match err {
            ConfigError::InvalidConfidence {
                error_code,
                confidence,
                ..
            } => {
                assert_eq!(error_code, "BILLING_400");
                assert_eq!(confidence, 7.5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nan_confidence_rejected_on_replace() {
        let store = RunbookStore::builtin().unwrap();
        let mut billing = (*store.snapshot(AgentRole::Billing).unwrap()).clone();
        if let Some(entry) = billing.knowledge.get_mut("BILLING_400") {
            entry.confidence = f32::NAN;
        }
        let err = store.replace(billing).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfidence { .. }));
        let kept = store.snapshot(AgentRole::Billing).unwrap();
        assert!(kept.lookup("BILLING_400").unwrap().confidence <= 1.0);
    }

    #[test]
    fn test_concurrent_replace_keeps_both_edits() {
        use std::sync::Barrier;

        for _ in 0..500 {
            let store = Arc::new(RunbookStore::new(Vec::new()).unwrap());
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [AgentRole::Billing, AgentRole::Ordering]
                .into_iter()
                .map(|role| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.replace(Runbook::new(role)).unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(store.roles(), vec![AgentRole::Billing, AgentRole::Ordering]);
        }
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = RunbookStore::builtin().unwrap();
        let before = store.snapshot(AgentRole::Billing).unwrap();

        let mut edited = (*before).clone();
        edited.knowledge.clear();
        store.replace(edited).unwrap();

        assert!(before.lookup("BILLING_400").is_some());
        let after = store.snapshot(AgentRole::Billing).unwrap();
        assert!(after.lookup("BILLING_400").is_none());
    }

    #[test]
    fn test_duplicate_roles_rejected() {
        let err = RunbookStore::new(vec![
            Runbook::new(AgentRole::Sre),
            Runbook::new(AgentRole::Sre),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRunbook(_)));
    }
}
