//! Frontend code and deployment agent.
//!
//! Besides analysis, this is the one role that writes: it maps an error
//! code to a known defect signature in the checkout source, renders a
//! minimal patch as a unified diff, and records the patch and a simulated
//! production deploy as applied actions.

use incident_core::runbook::SharedRunbookStore;
use incident_core::simulator::FRONTEND;
use incident_core::{Action, ActionKind, AgentRole, CodeLocation, Finding, SuggestedAction, Ticket};

use super::{knowledge_finding, TriageAgent};

const CHECKOUT_FILE: &str = "frontend/src/checkout/createOrder.ts";
const LOCATED_CONFIDENCE: f32 = 0.95;

/// How a defect is fixed.
#[derive(Debug, Clone, Copy)]
enum Fix {
    /// Insert one line per missing field after `after` (index into `original`).
    /// `{field}` in the template is replaced with the field name.
    InsertFields {
        after: usize,
        template: &'static str,
        default_fields: &'static [&'static str],
    },
    /// Replace the line at `index` with `with`.
    Replace {
        index: usize,
        with: &'static [&'static str],
    },
}

/// A known code-bug signature.
#[derive(Debug, Clone, Copy)]
struct DefectPattern {
    error_code: &'static str,
    function: &'static str,
    region: &'static str,
    /// First line of `original` in the file.
    line: u32,
    signature: &'static str,
    fix_summary: &'static str,
    original: &'static [&'static str],
    fix: Fix,
}

const DEFECTS: &[DefectPattern] = &[
    DefectPattern {
        error_code: "BILLING_400",
        function: "createOrder",
        region: "order-creation request body",
        line: 41,
        signature: "missing field in request body",
        fix_summary: "Add missing field(s) to the order-creation request body",
        original: &[
            "  const body = {",
            "    payment_intent_id: intent.id,",
            "    amount: cart.totalMinor,",
            "    items: cart.items,",
            "  };",
        ],
        fix: Fix::InsertFields {
            after: 2,
            template: "    {field}: cart.{field},",
            default_fields: &["currency"],
        },
    },
    DefectPattern {
        error_code: "ORDER_400",
        function: "submitOrder",
        region: "order request body",
        line: 68,
        signature: "missing field in request body",
        fix_summary: "Forward billing response field(s) into the order request body",
        original: &[
            "  const order = {",
            "    amount: cart.totalMinor,",
            "    items: cart.items,",
            "  };",
        ],
        fix: Fix::InsertFields {
            after: 0,
            template: "    {field}: billing.{field},",
            default_fields: &["payment_intent_id"],
        },
    },
    DefectPattern {
        error_code: "BILLING_422",
        function: "createOrder",
        region: "order-creation request body",
        line: 41,
        signature: "amount sent as decimal string",
        fix_summary: "Send amount as integer minor units",
        original: &[
            "  const body = {",
            "    payment_intent_id: intent.id,",
            "    amount: cart.total.toFixed(2),",
            "    currency: cart.currency,",
            "  };",
        ],
        fix: Fix::Replace {
            index: 2,
            with: &["    amount: Math.round(cart.total * 100),"],
        },
    },
    DefectPattern {
        error_code: "ORDER_409",
        function: "submitOrder",
        region: "order request headers",
        line: 74,
        signature: "missing Idempotency-Key header",
        fix_summary: "Send a per-attempt Idempotency-Key header",
        original: &[
            "  const res = await fetch(ORDERS_URL, {",
            "    method: \"POST\",",
            "    headers: { \"Content-Type\": \"application/json\" },",
            "    body: JSON.stringify(order),",
            "  });",
        ],
        fix: Fix::Replace {
            index: 2,
            with: &[
                "    headers: {",
                "      \"Content-Type\": \"application/json\",",
                "      \"Idempotency-Key\": attemptId,",
                "    },",
            ],
        },
    },
    DefectPattern {
        error_code: "FE_TIMEOUT",
        function: "createOrder",
        region: "billing fetch call",
        line: 47,
        signature: "fetch without timeout or abort handling",
        fix_summary: "Abort the checkout fetch after 10s",
        original: &[
            "  const res = await fetch(BILLING_URL, {",
            "    method: \"POST\",",
            "    body: JSON.stringify(body),",
            "  });",
        ],
        fix: Fix::InsertFields {
            after: 2,
            template: "    signal: AbortSignal.timeout({field}),",
            default_fields: &["10_000"],
        },
    },
];

const DEPLOY_LOG: &str = "\
> Building project...
  Compiled successfully
> Running tests...
  All tests passed
> Deploying to production...
  Deployment complete";

/// Output of one remediation turn.
#[derive(Debug, Clone)]
pub struct Remediation {
    pub finding: Finding,
    pub location: Option<CodeLocation>,
    pub patch: Option<Action>,
}

pub struct FrontendAgent {
    runbooks: SharedRunbookStore,
}

impl FrontendAgent {
    pub fn new(runbooks: SharedRunbookStore) -> Self {
        Self { runbooks }
    }

    fn pattern(error_code: &str) -> Option<&'static DefectPattern> {
        DEFECTS.iter().find(|d| d.error_code == error_code)
    }

    /// Deterministic lookup from error code to a known defect location.
    pub fn locate_defect(&self, error_code: &str) -> Option<CodeLocation> {
        Self::pattern(error_code).map(|d| CodeLocation {
            file: CHECKOUT_FILE.to_string(),
            function: d.function.to_string(),
            region: d.region.to_string(),
            line: d.line,
            pattern: d.signature.to_string(),
        })
    }

    /// Source lines at `location` before the fix.
    pub fn current_code(&self, error_code: &str) -> Option<String> {
        Self::pattern(error_code).map(|d| d.original.join("\n"))
    }

    /// Render the minimal patch for a located defect.
    ///
    /// `fields` fills insert-style templates; when empty the pattern's own
    /// defaults are used. Returns an unapplied PATCH action.
    pub fn generate_patch(&self, error_code: &str, location: &CodeLocation, fields: &[String]) -> Option<Action> {
        let pattern = Self::pattern(error_code)?;
        let fixed = apply_fix(pattern, fields);
        let diff = unified_diff(&location.file, location.line, pattern.function, pattern.original, &fixed);
        Some(Action {
            kind: ActionKind::Patch,
            target: location.file.clone(),
            diff_or_description: diff,
            applied: false,
        })
    }

    /// Locate, patch and mark applied. Always yields a finding.
    pub fn remediate(&self, ticket: &Ticket, suggestion: Option<&SuggestedAction>) -> Remediation {
        let Some(location) = self.locate_defect(&ticket.error_code) else {
            return Remediation {
                finding: Finding::degraded(
                    AgentRole::Frontend,
                    &ticket.id,
                    &format!("no known defect signature for {}", ticket.error_code),
                ),
                location: None,
                patch: None,
            };
        };

        let patch = self
            .generate_patch(&ticket.error_code, &location, ticket.missing_fields())
            .map(|mut action| {
                action.applied = true;
                action
            });

        let fix_summary = Self::pattern(&ticket.error_code)
            .map(|d| d.fix_summary)
            .unwrap_or_default();
        let mut summary = format!(
            "Bug found at {location}: {}.\nFix: {fix_summary}.",
            location.pattern
        );
        if let Some(s) = suggestion {
            summary.push_str(&format!("\nRequested by diagnosis: {}", s.description));
        }

        // The diagnosing finding stays the root-cause suggestion; this one
        // reports what was changed.
        let finding = Finding::new(AgentRole::Frontend, &ticket.id, summary, LOCATED_CONFIDENCE);

        Remediation {
            finding,
            location: Some(location),
            patch,
        }
    }

    /// Simulated production deploy of an applied patch.
    pub fn deploy(&self, patch: &Action) -> Action {
        Action {
            kind: ActionKind::Deploy,
            target: FRONTEND.to_string(),
            diff_or_description: format!("Deploy {} to production\n{DEPLOY_LOG}", patch.target),
            applied: patch.applied,
        }
    }
}

impl TriageAgent for FrontendAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Frontend
    }

    fn owns(&self, service: &str) -> bool {
        service == FRONTEND
    }

    fn analyze(&self, ticket: &Ticket, _findings_so_far: &[Finding]) -> Finding {
        if !self.owns(&ticket.service) {
            return super::not_owned(AgentRole::Frontend, ticket);
        }
        knowledge_finding(AgentRole::Frontend, &self.runbooks, ticket)
    }
}

fn apply_fix(pattern: &DefectPattern, fields: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = pattern.original.iter().map(|l| l.to_string()).collect();
    match pattern.fix {
        Fix::InsertFields {
            after,
            template,
            default_fields,
        } => {
            let fields: Vec<String> = if fields.is_empty() {
                default_fields.iter().map(|f| f.to_string()).collect()
            } else {
                fields.to_vec()
            };
            let at = (after + 1).min(lines.len());
            for (offset, field) in fields.iter().enumerate() {
                lines.insert(at + offset, template.replace("{field}", field));
            }
        }
        Fix::Replace { index, with } => {
            if index < lines.len() {
                lines.splice(index..=index, with.iter().map(|l| l.to_string()));
            }
        }
    }
    lines
}

/// Single-hunk unified diff between `before` and `after`.
fn unified_diff(file: &str, start: u32, function: &str, before: &[&str], after: &[String]) -> String {
    let prefix = before
        .iter()
        .zip(after.iter())
        .take_while(|(b, a)| **b == a.as_str())
        .count();
    let suffix = before[prefix..]
        .iter()
        .rev()
        .zip(after[prefix..].iter().rev())
        .take_while(|(b, a)| **b == a.as_str())
        .count();

    let mut out = format!(
        "--- a/{file}\n+++ b/{file}\n@@ -{start},{} +{start},{} @@ function {function}\n",
        before.len(),
        after.len()
    );
    for line in &before[..prefix] {
        out.push_str(&format!(" {line}\n"));
    }
    for line in &before[prefix..before.len() - suffix] {
        out.push_str(&format!("-{line}\n"));
    }
    for line in &after[prefix..after.len() - suffix] {
        out.push_str(&format!("+{line}\n"));
    }
    for line in &before[before.len() - suffix..] {
        out.push_str(&format!(" {line}\n"));
    }
    out
}
