//! Root cause analysis report. Derived from a closed call, read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::TicketId;
use crate::triage::Finding;

pub const UNDETERMINED: &str = "undetermined";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaReport {
    pub ticket_id: TicketId,
    pub service: String,
    pub error_code: String,
    /// Suggested action of the strongest finding, or `undetermined`.
    pub root_cause: String,
    pub contributing_findings: Vec<Finding>,
    pub remediation_summary: String,
    pub resolved: bool,
    pub what_happened: String,
    pub customer_impact: String,
    pub preventive_actions: Vec<String>,
    pub timeline: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl RcaReport {
    pub fn is_undetermined(&self) -> bool {
        self.root_cause == UNDETERMINED
    }

    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Root Cause Analysis: {}\n\n", self.ticket_id);
        md.push_str(&format!(
            "**Service:** {}  \n**Error:** `{}`  \n**Status:** {}\n\n",
            self.service,
            self.error_code,
            if self.resolved { "resolved" } else { "unresolved" }
        ));
        md.push_str(&format!("## What Happened\n{}\n\n", self.what_happened));
        md.push_str(&format!("## Root Cause\n{}\n\n", self.root_cause));
        md.push_str(&format!("## Customer Impact\n{}\n\n", self.customer_impact));
        md.push_str(&format!("## Remediation\n{}\n\n", self.remediation_summary));

        md.push_str("## Contributing Findings\n");
        for f in &self.contributing_findings {
            md.push_str(&format!(
                "- **{}** ({:.0}%): {}\n",
                f.agent_role,
                f.confidence * 100.0,
                f.summary.lines().next().unwrap_or_default()
            ));
        }

        md.push_str("\n## Preventive Actions\n");
        for action in &self.preventive_actions {
            md.push_str(&format!("- {action}\n"));
        }

        md.push_str("\n## Timeline\n");
        for entry in &self.timeline {
            md.push_str(&format!("- {entry}\n"));
        }
        md
    }
}
