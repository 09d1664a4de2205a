//! Structured compliance issues and the reports built from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Issue taxonomy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IssueClass {
    /// Missing required node or file.
    Structural,
    /// Field missing or malformed.
    Schema,
    /// Kind-specific or cross-entity contract not met.
    Semantic,
    /// Hash or signature mismatch.
    Integrity,
    /// Non-canonicalizable value.
    Encoding,
    /// A document was unreadable; checking stopped for that one leaf.
    Environment,
}

impl fmt::Display for IssueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueClass::Structural => "structural",
            IssueClass::Schema => "schema",
            IssueClass::Semantic => "semantic",
            IssueClass::Integrity => "integrity",
            IssueClass::Encoding => "encoding",
            IssueClass::Environment => "environment",
        };
        f.write_str(label)
    }
}

/// One compliance defect, attributable to a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub class: IssueClass,
    pub rule: String,
    pub location: String,
    pub message: String,
}

impl Issue {
    pub fn new(
        class: IssueClass,
        rule: &str,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class,
            rule: rule.to_string(),
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn structural(rule: &str, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueClass::Structural, rule, location, message)
    }

    pub fn schema(rule: &str, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueClass::Schema, rule, location, message)
    }

    pub fn semantic(rule: &str, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueClass::Semantic, rule, location, message)
    }

    /// CI annotation line: `::error file=<path>::<message> (violates <rule>)`.
    pub fn annotation(&self) -> String {
        format!(
            "::error file={}::{} (violates {})",
            self.location, self.message, self.rule
        )
    }
}

/// Accumulated issues for one validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub result: String,
    pub ruleset_version: String,
    pub rules: Vec<String>,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Build a report. Issue order is kept as produced by the validators.
    pub fn from_issues(ruleset_version: impl Into<String>, issues: Vec<Issue>) -> Self {
        let rules: Vec<String> = issues
            .iter()
            .map(|issue| issue.rule.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            result: if issues.is_empty() {
                "accepted".to_string()
            } else {
                "rejected".to_string()
            },
            ruleset_version: ruleset_version.into(),
            rules,
            issues,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.issues.is_empty()
    }

    /// Process exit code for a CLI run: 0 compliant, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_accepted() { 0 } else { 1 }
    }
}

/// Rule identifiers cited by every issue.
pub mod rule {
    pub const TREE_DOMAIN_PRESENT: &str = "TREE-1.1";
    pub const TREE_LAYER_PRESENT: &str = "TREE-1.2";
    pub const TREE_LEAF_PRESENT: &str = "TREE-1.3";
    pub const TREE_LEAF_NODE_TYPE: &str = "TREE-1.4";
    pub const TREE_FORBIDDEN_TERM: &str = "TREE-2.1";

    pub const LEAF_DOCUMENT_PRESENT: &str = "LEAF-1.1";
    pub const LEAF_FIELD_PRESENT: &str = "LEAF-1.2";
    pub const LEAF_DOCUMENT_READABLE: &str = "LEAF-1.3";
    pub const LEAF_ID_FORMAT: &str = "LEAF-2.1";
    pub const LEAF_KIND_TAG: &str = "LEAF-2.2";

    pub const CB_MAL_WCET: &str = "CB-3.1";
    pub const CB_MAL_SAFETY_FENCE: &str = "CB-3.2";

    pub const QB_CLASSICAL_FALLBACK: &str = "QB-3.1";
    pub const QB_DETERMINISTIC_SEED: &str = "QB-3.2";
    pub const QB_NO_VENDOR_SECRETS: &str = "QB-3.3";
    pub const QB_ADAPTER_ONLY: &str = "QB-3.4";
    pub const QB_BACKEND_PROVIDERS: &str = "QB-3.5";

    pub const FWD_QS_EVIDENCE: &str = "FWD-3.1";
    pub const FWD_DETERMINISTIC: &str = "FWD-3.2";
    pub const FWD_PERFORMANCE: &str = "FWD-3.3";

    pub const UE_ELEMENT_TYPE: &str = "UE-3.1";
    pub const UE_QS_EVIDENCE: &str = "UE-3.2";
    pub const UE_IDENTITY_PROFILE: &str = "UE-3.3";

    pub const FED_MEMBERS: &str = "FED-1";
    pub const FED_QUORUM: &str = "FED-2";
    pub const FED_CONSENSUS_MODE: &str = "FED-3";
    pub const FED_LATENCY_BUDGET: &str = "FED-4";
    pub const FED_MEMBER_ROLE: &str = "FED-5";
    pub const FED_SECURITY: &str = "FED-6";

    pub const COAL_REKEY_ON_EVENT: &str = "COAL-1";
    pub const COAL_EVENT_ORDER: &str = "COAL-2";
    pub const COAL_REKEY_INTERVAL: &str = "COAL-3";
    pub const COAL_MEMBERSHIP_TRANSITION: &str = "COAL-4";
    pub const COAL_TRUST_SCORE: &str = "COAL-5";

    pub const ORCH_FALLBACK: &str = "ORCH-1";
    pub const ORCH_MAX_GAP: &str = "ORCH-2";
    pub const ORCH_SOLVERS: &str = "ORCH-3";
    pub const ORCH_CONSTRAINTS: &str = "ORCH-4";

    pub const ANCHOR_INTEGRITY: &str = "ANC-1";
    pub const ANCHOR_ENCODING: &str = "ANC-2";
}
