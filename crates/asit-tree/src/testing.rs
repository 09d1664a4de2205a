//! Temporary trees for tests.

use asit_kernel::RuleSet;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) struct TempTree {
    path: PathBuf,
}

impl TempTree {
    pub(crate) fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "asit-tree-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write(&self, rel: &str, content: &str) {
        let path = self.path.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir should be created");
        }
        fs::write(path, content).expect("file should be written");
    }

    pub(crate) fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.path.join(rel)).expect("dir should be created");
    }

    pub(crate) fn remove(&self, rel: &str) {
        let path = self.path.join(rel);
        if path.is_dir() {
            fs::remove_dir_all(path).expect("dir should be removed");
        } else {
            fs::remove_file(path).expect("file should be removed");
        }
    }

    fn write_json(&self, rel: &str, value: serde_json::Value) {
        self.write(
            rel,
            &serde_json::to_string_pretty(&value).expect("fixture should serialize"),
        );
    }

    /// Every default layer and leaf of `domain`, with compliant documents.
    pub(crate) fn compliant_domain(&self, domain: &str) {
        let id = |code: &str| format!("asi-t-core-0001-{domain}-{code}-001");
        for layer in ["SYSTEMS", "STATIONS", "COMPONENTS"] {
            self.mkdir(&format!("{domain}/{layer}"));
        }
        self.write_json(
            &format!("{domain}/BITS/CB/leaf.json"),
            json!({
                "cb_id": id("CB"),
                "description": "Deterministic attitude filter",
                "version": "1.0.0",
                "algorithms": ["kalman"],
                "mal_requirements": {"wcet_budget_ms": 5, "safety_fence": "fence-attitude"}
            }),
        );
        self.write_json(
            &format!("{domain}/QUBITS/QB/leaf.json"),
            json!({
                "qb_id": id("QB"),
                "description": "Sampler with classical fallback",
                "version": "1.0.0",
                "quantum_backend": {"primary": "sim", "fallback": "cb", "providers": ["sim"]},
                "fallback_policy": {"cb_fallback": true, "deterministic_seed": 42},
                "security_policy": {"no_vendor_secrets": true, "adapter_only_integration": true}
            }),
        );
        self.write_json(
            &format!("{domain}/ELEMENTS/UE/contract.json"),
            json!({
                "contract_id": format!("asi-t-core-0001-{domain}-ELEMENTS-UE-001"),
                "element_type": "UE",
                "capabilities": ["telemetry"],
                "interfaces": ["bus"],
                "qs_integration": {"evidence_required": true}
            }),
        );
        self.write_json(
            &format!("{domain}/ELEMENTS/UE/identity_profile.json"),
            json!({"identity_provider": "pki", "key_management": "hsm", "attestation": "tpm"}),
        );
        self.write_json(
            &format!("{domain}/ELEMENTS/FE/federation.json"),
            json!({
                "federation_id": format!("fed-{domain}-001"),
                "policy_tag": "formation.v1",
                "members": [
                    {"unit_id": "AC-001", "role": "Leader"},
                    {"unit_id": "AC-002", "role": "Peer"}
                ],
                "quorum": {"size": 2, "consensus_mode": "Majority"},
                "coordination": {"topics": ["state"], "period_ms": 100, "latency_budget_ms": 50},
                "security": {"auth_scheme": "mtls", "integrity_scheme": "ed25519", "replay_protection": true}
            }),
        );
        self.write_json(
            &format!("{domain}/WAVES/FWD/leaf.json"),
            json!({
                "fwd_id": id("FWD"),
                "version": "1.0.0",
                "description": "Forward propagation",
                "wave_config": {
                    "propagation_method": "split_step",
                    "boundary_conditions": "absorbing",
                    "grid_resolution": [256, 256]
                },
                "performance": {"max_propagation_time_ms": 20, "stability_threshold": 0.95},
                "integration": {"qs_evidence_required": true, "deterministic": true}
            }),
        );
        self.write_json(
            &format!("{domain}/STATES/SE/orchestration.json"),
            json!({
                "problem_class": "scheduling",
                "solvers": [{"name": "greedy-1", "kind": "classical", "time_budget_ms": 10}],
                "acceptance": {"max_gap_pct": 5, "constraints": ["capacity"]},
                "fallback_strategy": "greedy"
            }),
        );
        self.write(&format!("{domain}/META/README.md"), &format!("# {domain}\n"));
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Default ruleset narrowed to the given domains.
pub(crate) fn rules_for(domains: &[&str]) -> RuleSet {
    let mut rules = RuleSet::default();
    rules.tree.domains = domains.iter().map(|d| d.to_string()).collect();
    rules
}
