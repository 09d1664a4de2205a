//! Federation contracts: membership, quorum, coordination, security.

use asit_kernel::{Issue, ValidationContext, rule};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Leader,
    Peer,
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Leader" => Ok(MemberRole::Leader),
            "Peer" => Ok(MemberRole::Peer),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMode {
    Majority,
    Supermajority,
    Unanimous,
}

impl ConsensusMode {
    /// Votes required among `members` for a consensus action.
    pub fn required_votes(self, members: usize) -> usize {
        match self {
            ConsensusMode::Majority => members / 2 + 1,
            ConsensusMode::Supermajority => (2 * members).div_ceil(3),
            ConsensusMode::Unanimous => members,
        }
    }
}

impl FromStr for ConsensusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Majority" => Ok(ConsensusMode::Majority),
            "Supermajority" => Ok(ConsensusMode::Supermajority),
            "Unanimous" => Ok(ConsensusMode::Unanimous),
            other => Err(format!("unknown consensus mode {other:?}")),
        }
    }
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederationMember {
    pub unit_id: String,
    pub role: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quorum {
    pub size: i64,
    pub consensus_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coordination {
    #[serde(default)]
    pub topics: Vec<String>,
    pub period_ms: f64,
    pub latency_budget_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub auth_scheme: String,
    pub integrity_scheme: String,
    pub replay_protection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FederationContract {
    pub federation_id: String,
    pub policy_tag: String,
    pub members: Vec<FederationMember>,
    pub quorum: Quorum,
    pub coordination: Coordination,
    pub security: SecurityPolicy,
}

impl FederationContract {
    /// Whether the distinct member approvals satisfy both the quorum size and
    /// the consensus mode. Unknown ids and duplicates do not count.
    pub fn quorum_reached(&self, approvals: &[&str]) -> bool {
        let Ok(mode) = self.quorum.consensus_mode.parse::<ConsensusMode>() else {
            return false;
        };
        let members: BTreeSet<&str> = self.members.iter().map(|m| m.unit_id.as_str()).collect();
        let votes = approvals
            .iter()
            .filter(|id| members.contains(**id))
            .collect::<BTreeSet<_>>()
            .len();
        let size = usize::try_from(self.quorum.size).unwrap_or(usize::MAX);
        votes >= size.max(1) && votes >= mode.required_votes(members.len())
    }
}

pub fn federation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["federation_id", "policy_tag", "members", "quorum", "coordination", "security"],
        "properties": {
            "federation_id": {"type": "string", "minLength": 1},
            "policy_tag": {"type": "string", "minLength": 1},
            "members": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["unit_id", "role"],
                    "properties": {
                        "unit_id": {"type": "string", "minLength": 1},
                        "role": {"type": "string"},
                        "capabilities": {"type": "array", "items": {"type": "string"}}
                    }
                }
            },
            "quorum": {
                "type": "object",
                "required": ["size", "consensus_mode"],
                "properties": {
                    "size": {"type": "integer"},
                    "consensus_mode": {"type": "string"}
                }
            },
            "coordination": {
                "type": "object",
                "required": ["period_ms", "latency_budget_ms"],
                "properties": {
                    "topics": {"type": "array", "items": {"type": "string"}},
                    "period_ms": {"type": "number"},
                    "latency_budget_ms": {"type": "number"}
                }
            },
            "security": {
                "type": "object",
                "required": ["auth_scheme", "integrity_scheme", "replay_protection"],
                "properties": {
                    "auth_scheme": {"type": "string"},
                    "integrity_scheme": {"type": "string"},
                    "replay_protection": {"type": "boolean"}
                }
            }
        }
    })
}

/// Cross-member rules of a federation contract.
pub fn validate_federation(contract: &FederationContract, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let semantic = |rule: &str, message: String| Issue::semantic(rule, location, message);

    if contract.members.is_empty() {
        issues.push(semantic(
            rule::FED_MEMBERS,
            "members must list at least one unit".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for member in &contract.members {
        if !seen.insert(member.unit_id.as_str()) {
            issues.push(semantic(
                rule::FED_MEMBERS,
                format!("member {} is listed more than once", member.unit_id),
            ));
        }
    }

    let mut leaders = 0usize;
    for member in &contract.members {
        match member.role.parse::<MemberRole>() {
            Ok(MemberRole::Leader) => leaders += 1,
            Ok(MemberRole::Peer) => {}
            Err(_) => issues.push(semantic(
                rule::FED_MEMBER_ROLE,
                format!(
                    "member {} has role {:?}; expected Leader or Peer",
                    member.unit_id, member.role
                ),
            )),
        }
    }
    if !contract.members.is_empty() && leaders != 1 {
        issues.push(semantic(
            rule::FED_MEMBER_ROLE,
            format!("federation must have exactly one Leader, found {leaders}"),
        ));
    }

    let member_count = contract.members.len() as i64;
    if contract.quorum.size < 1 {
        issues.push(semantic(
            rule::FED_QUORUM,
            format!("quorum.size must be at least 1 (actual={})", contract.quorum.size),
        ));
    } else if contract.quorum.size > member_count {
        issues.push(semantic(
            rule::FED_QUORUM,
            format!(
                "quorum.size {} exceeds member count {member_count}",
                contract.quorum.size
            ),
        ));
    }

    if contract.quorum.consensus_mode.parse::<ConsensusMode>().is_err() {
        issues.push(semantic(
            rule::FED_CONSENSUS_MODE,
            format!(
                "quorum.consensus_mode {:?} is not one of Majority, Supermajority, Unanimous",
                contract.quorum.consensus_mode
            ),
        ));
    }

    let budget = contract.coordination.latency_budget_ms;
    if !(budget.is_finite() && budget > 0.0) {
        issues.push(semantic(
            rule::FED_LATENCY_BUDGET,
            format!("coordination.latency_budget_ms must be positive (actual={budget})"),
        ));
    }
    let period = contract.coordination.period_ms;
    if !(period.is_finite() && period > 0.0) {
        issues.push(semantic(
            rule::FED_LATENCY_BUDGET,
            format!("coordination.period_ms must be positive (actual={period})"),
        ));
    }

    let security = &contract.security;
    if security.auth_scheme.trim().is_empty() {
        issues.push(semantic(
            rule::FED_SECURITY,
            "security.auth_scheme must be non-empty".to_string(),
        ));
    }
    if security.integrity_scheme.trim().is_empty() {
        issues.push(semantic(
            rule::FED_SECURITY,
            "security.integrity_scheme must be non-empty".to_string(),
        ));
    }
    if !security.replay_protection {
        issues.push(semantic(
            rule::FED_SECURITY,
            "security.replay_protection must be true".to_string(),
        ));
    }

    issues
}

/// Schema check, then typed contract rules.
pub fn check_federation_document(
    document: &Value,
    location: &str,
    ctx: &ValidationContext,
) -> Vec<Issue> {
    let issues = ctx.schema_issues(&federation_schema(), document, location);
    if !issues.is_empty() {
        return issues;
    }
    match serde_json::from_value::<FederationContract>(document.clone()) {
        Ok(contract) => validate_federation(&contract, location),
        Err(err) => vec![Issue::schema(
            rule::LEAF_FIELD_PRESENT,
            location,
            format!("federation contract is malformed: {err}"),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_contract() -> Value {
        json!({
            "federation_id": "fed-iis-001",
            "policy_tag": "formation.v1",
            "members": [
                {"unit_id": "AC-001", "role": "Leader", "capabilities": ["nav", "relay"]},
                {"unit_id": "AC-002", "role": "Peer", "capabilities": ["nav"]},
                {"unit_id": "AC-003", "role": "Peer"}
            ],
            "quorum": {"size": 2, "consensus_mode": "Majority"},
            "coordination": {"topics": ["state", "intent"], "period_ms": 100, "latency_budget_ms": 50},
            "security": {"auth_scheme": "mtls", "integrity_scheme": "ed25519", "replay_protection": true}
        })
    }

    fn check(doc: &Value) -> Vec<Issue> {
        check_federation_document(doc, "IIS/ELEMENTS/FE/federation.json", &ValidationContext::detached())
    }

    #[test]
    fn valid_contract_is_compliant() {
        assert!(check(&valid_contract()).is_empty());
    }

    #[test]
    fn quorum_larger_than_membership_is_rejected() {
        let mut doc = valid_contract();
        doc["quorum"]["size"] = json!(4);
        let issues = check(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, rule::FED_QUORUM);
    }

    #[test]
    fn empty_membership_reports_members_and_quorum() {
        let mut doc = valid_contract();
        doc["members"] = json!([]);
        let rules: Vec<String> = check(&doc).into_iter().map(|i| i.rule).collect();
        assert_eq!(rules, vec![rule::FED_MEMBERS, rule::FED_QUORUM]);
    }

    #[test]
    fn unknown_consensus_mode_and_bad_budget() {
        let mut doc = valid_contract();
        doc["quorum"]["consensus_mode"] = json!("Plurality");
        doc["coordination"]["latency_budget_ms"] = json!(0);
        let rules: Vec<String> = check(&doc).into_iter().map(|i| i.rule).collect();
        assert_eq!(rules, vec![rule::FED_CONSENSUS_MODE, rule::FED_LATENCY_BUDGET]);
    }

    #[test]
    fn roles_and_security_gates() {
        let mut doc = valid_contract();
        doc["members"][1]["role"] = json!("Leader");
        doc["members"][2]["role"] = json!("Observer");
        doc["security"]["replay_protection"] = json!(false);
        let rules: Vec<String> = check(&doc).into_iter().map(|i| i.rule).collect();
        assert_eq!(
            rules,
            vec![rule::FED_MEMBER_ROLE, rule::FED_MEMBER_ROLE, rule::FED_SECURITY]
        );
    }

    #[test]
    fn missing_blocks_stop_at_schema() {
        let mut doc = valid_contract();
        doc.as_object_mut().unwrap().remove("security");
        let issues = check(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "security is required");
    }

    #[test]
    fn quorum_reached_counts_distinct_members() {
        let contract: FederationContract = serde_json::from_value(valid_contract()).unwrap();
        assert!(!contract.quorum_reached(&["AC-001"]));
        assert!(!contract.quorum_reached(&["AC-001", "AC-001", "AC-999"]));
        assert!(contract.quorum_reached(&["AC-001", "AC-003"]));
    }

    #[test]
    fn required_votes_by_mode() {
        assert_eq!(ConsensusMode::Majority.required_votes(4), 3);
        assert_eq!(ConsensusMode::Supermajority.required_votes(4), 3);
        assert_eq!(ConsensusMode::Supermajority.required_votes(6), 4);
        assert_eq!(ConsensusMode::Unanimous.required_votes(5), 5);
    }
}
