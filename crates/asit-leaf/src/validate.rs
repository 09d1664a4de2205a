//! Leaf validation in fixed order: documents and fields, identity, semantics.

use crate::model::{
    COALITION_DOCUMENT, CONTRACT_DOCUMENT, FEDERATION_DOCUMENT, IDENTITY_PROFILE_DOCUMENT,
    LEAF_DOCUMENT, Leaf, LeafScope, LeafTarget, ORCHESTRATION_DOCUMENT, documents,
};
use crate::rules;
use crate::schemas::{identity_field, schema_for};
use asit_federation::{
    check_coalition_document, check_federation_document, check_orchestration_document,
};
use asit_kernel::{Issue, IssueClass, LeafKind, ValidationContext, parallel, rule};
use regex::Regex;
use serde_json::Value;

/// Segments ahead of the serial number. Unit elements carry their layer as
/// well: `<program>-<DOMAIN>-<LAYER>-UE`.
fn identity_segments(scope: &LeafScope, kind: LeafKind) -> Vec<&str> {
    let mut segments = vec![scope.program.as_str(), scope.domain.as_str()];
    if kind == LeafKind::UnitElement {
        segments.push(scope.layer.as_str());
    }
    segments.push(kind.code());
    segments
}

/// `^<program>-<DOMAIN>-<CODE>-NNN$` (layer-scoped for unit elements), with
/// three or more digits.
pub fn identity_pattern(scope: &LeafScope, kind: LeafKind) -> Result<Regex, regex::Error> {
    let prefix: Vec<String> = identity_segments(scope, kind)
        .into_iter()
        .map(regex::escape)
        .collect();
    Regex::new(&format!("^{}-[0-9]{{3,}}$", prefix.join("-")))
}

fn presence_and_schema(leaf: &Leaf, ctx: &ValidationContext) -> Vec<Issue> {
    let mut issues = Vec::new();
    for spec in documents(leaf.kind) {
        let location = leaf.document_location(spec.name);
        match leaf.document(spec.name) {
            None if spec.required => issues.push(Issue::structural(
                rule::LEAF_DOCUMENT_PRESENT,
                location,
                format!("{} leaf requires {}", leaf.kind, spec.name),
            )),
            None => {}
            Some(document) => {
                if let Some(schema) = schema_for(leaf.kind, spec.name) {
                    issues.extend(ctx.schema_issues(&schema, document, &location));
                }
            }
        }
    }
    issues
}

fn identity(leaf: &Leaf) -> Vec<Issue> {
    let mut issues = Vec::new();

    if let Some((name, field)) = identity_field(leaf.kind)
        && let Some(Value::String(id)) = leaf.document(name).and_then(|doc| doc.get(field))
        && !id.trim().is_empty()
    {
        let location = leaf.document_location(name);
        let expected = format!("{}-NNN", identity_segments(&leaf.scope, leaf.kind).join("-"));
        match identity_pattern(&leaf.scope, leaf.kind) {
            Ok(pattern) if pattern.is_match(id) => {}
            Ok(_) => issues.push(Issue::semantic(
                rule::LEAF_ID_FORMAT,
                location,
                format!("{field} {id:?} does not match {expected}"),
            )),
            Err(err) => issues.push(Issue::semantic(
                rule::LEAF_ID_FORMAT,
                location,
                format!("cannot build identity pattern for {expected}: {err}"),
            )),
        }
    }

    for (name, document) in &leaf.documents {
        let Some(tag) = document.get("kind").filter(|v| !v.is_null()) else {
            continue;
        };
        let declared = tag.as_str().and_then(|s| s.parse::<LeafKind>().ok());
        if declared != Some(leaf.kind) {
            issues.push(Issue::semantic(
                rule::LEAF_KIND_TAG,
                leaf.document_location(name),
                format!("kind tag {tag} does not match declared kind {}", leaf.kind),
            ));
        }
    }
    issues
}

fn semantics(leaf: &Leaf, ctx: &ValidationContext) -> Vec<Issue> {
    let check = |name: &str, rule_fn: fn(&Value, &str) -> Vec<Issue>| {
        leaf.document(name)
            .map(|doc| rule_fn(doc, &leaf.document_location(name)))
            .unwrap_or_default()
    };
    let delegate = |name: &str,
                    check_fn: fn(&Value, &str, &ValidationContext) -> Vec<Issue>| {
        leaf.document(name)
            .map(|doc| check_fn(doc, &leaf.document_location(name), ctx))
            .unwrap_or_default()
    };

    match leaf.kind {
        LeafKind::ClassicalBit => check(LEAF_DOCUMENT, rules::classical_bit),
        LeafKind::QuantumBit => check(LEAF_DOCUMENT, rules::quantum_bit),
        LeafKind::ForwardWave => check(LEAF_DOCUMENT, rules::forward_wave),
        LeafKind::UnitElement => {
            let mut issues = check(CONTRACT_DOCUMENT, rules::unit_element_contract);
            issues.extend(check(IDENTITY_PROFILE_DOCUMENT, rules::identity_profile));
            issues
        }
        LeafKind::FederationElement => {
            let mut issues = delegate(FEDERATION_DOCUMENT, check_federation_document);
            issues.extend(delegate(COALITION_DOCUMENT, check_coalition_document));
            issues
        }
        LeafKind::SolverElement => delegate(ORCHESTRATION_DOCUMENT, check_orchestration_document),
    }
}

/// Every defect of one leaf. Never stops at the first failure.
pub fn validate_leaf(leaf: &Leaf, ctx: &ValidationContext) -> Vec<Issue> {
    let mut issues = presence_and_schema(leaf, ctx);
    issues.extend(identity(leaf));
    issues.extend(semantics(leaf, ctx));
    tracing::debug!(
        location = %leaf.location,
        kind = %leaf.kind,
        issues = issues.len(),
        "leaf validated"
    );
    issues
}

/// Load and validate one on-disk leaf. An unreadable document becomes a
/// single environment issue for this leaf only.
pub fn validate_target(target: &LeafTarget, ctx: &ValidationContext) -> Vec<Issue> {
    match target.load() {
        Ok(leaf) => validate_leaf(&leaf, ctx),
        Err(err) => {
            tracing::warn!(location = %target.location, %err, "leaf document unreadable");
            vec![Issue::new(
                IssueClass::Environment,
                rule::LEAF_DOCUMENT_READABLE,
                err.path().to_string(),
                err.to_string(),
            )]
        }
    }
}

/// Validate independent leaves concurrently; issues come back in input order.
pub fn validate_leaves(leaves: &[Leaf], ctx: &ValidationContext) -> Vec<Issue> {
    parallel::map_ordered(leaves, |leaf| validate_leaf(leaf, ctx))
        .into_iter()
        .flatten()
        .collect()
}

pub fn validate_targets(targets: &[LeafTarget], ctx: &ValidationContext) -> Vec<Issue> {
    parallel::map_ordered(targets, |target| validate_target(target, ctx))
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn scope(layer: &str) -> LeafScope {
        LeafScope::new("asi-t-core-0001", "IIS", layer)
    }

    fn cb_leaf(document: Value) -> Leaf {
        Leaf::new(LeafKind::ClassicalBit, scope("BITS"), "IIS/BITS/CB")
            .with_document(LEAF_DOCUMENT, document)
    }

    fn cb_document() -> Value {
        json!({
            "cb_id": "asi-t-core-0001-IIS-CB-042",
            "description": "x",
            "version": "1.0",
            "algorithms": ["a"]
        })
    }

    fn qb_document() -> Value {
        json!({
            "qb_id": "asi-t-core-0001-IIS-QB-007",
            "description": "Variational sampler with classical fallback",
            "version": "1.2.0",
            "quantum_backend": {"primary": "sim-a", "fallback": "cb-sampler", "providers": ["sim-a"]},
            "fallback_policy": {"cb_fallback": true, "deterministic_seed": 1337},
            "security_policy": {"no_vendor_secrets": true, "adapter_only_integration": true}
        })
    }

    fn qb_leaf(document: Value) -> Leaf {
        Leaf::new(LeafKind::QuantumBit, scope("QUBITS"), "IIS/QUBITS/QB")
            .with_document(LEAF_DOCUMENT, document)
    }

    fn ctx() -> ValidationContext {
        ValidationContext::detached()
    }

    #[test]
    fn compliant_classical_bit_has_no_issues() {
        assert!(validate_leaf(&cb_leaf(cb_document()), &ctx()).is_empty());
    }

    #[test]
    fn wrong_identity_yields_exactly_one_issue() {
        let mut doc = cb_document();
        doc["cb_id"] = json!("WRONG-042");
        let issues = validate_leaf(&cb_leaf(doc), &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, rule::LEAF_ID_FORMAT);
        assert_eq!(issues[0].location, "IIS/BITS/CB/leaf.json");
        assert_eq!(
            issues[0].message,
            "cb_id \"WRONG-042\" does not match asi-t-core-0001-IIS-CB-NNN"
        );
    }

    #[test]
    fn identity_needs_three_digits_and_exact_scope() {
        for id in [
            "asi-t-core-0001-IIS-CB-42",
            "asi-t-core-0001-AAA-CB-042",
            "asi-t-core-0001-IIS-QB-042",
            "xasi-t-core-0001-IIS-CB-042",
        ] {
            let mut doc = cb_document();
            doc["cb_id"] = json!(id);
            assert_eq!(validate_leaf(&cb_leaf(doc), &ctx()).len(), 1, "{id}");
        }
        let mut doc = cb_document();
        doc["cb_id"] = json!("asi-t-core-0001-IIS-CB-1042");
        assert!(validate_leaf(&cb_leaf(doc), &ctx()).is_empty());
    }

    #[test]
    fn quantum_backend_missing_two_fields_yields_two_issues() {
        let mut doc = qb_document();
        doc["quantum_backend"] = json!({"primary": "p"});
        let issues = validate_leaf(&qb_leaf(doc), &ctx());
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "quantum_backend.fallback is required",
                "quantum_backend.providers is required"
            ]
        );
        assert!(issues.iter().all(|i| i.class == IssueClass::Schema));
    }

    #[test]
    fn issues_follow_fixed_stage_order() {
        let mut doc = qb_document();
        doc["qb_id"] = json!("QB-7");
        doc["fallback_policy"]["cb_fallback"] = json!(false);
        doc["security_policy"]
            .as_object_mut()
            .unwrap()
            .remove("adapter_only_integration");
        doc["kind"] = json!("CB");
        let rules: Vec<String> = validate_leaf(&qb_leaf(doc), &ctx())
            .into_iter()
            .map(|i| i.rule)
            .collect();
        assert_eq!(
            rules,
            vec![
                rule::LEAF_FIELD_PRESENT,
                rule::LEAF_ID_FORMAT,
                rule::LEAF_KIND_TAG,
                rule::QB_CLASSICAL_FALLBACK
            ]
        );
    }

    #[test]
    fn missing_document_is_structural() {
        let leaf = Leaf::new(LeafKind::UnitElement, scope("ELEMENTS"), "IIS/ELEMENTS/UE")
            .with_document(
                CONTRACT_DOCUMENT,
                json!({
                    "contract_id": "asi-t-core-0001-IIS-ELEMENTS-UE-001",
                    "element_type": "UE",
                    "capabilities": ["telemetry"],
                    "interfaces": ["bus"],
                    "qs_integration": {"evidence_required": true}
                }),
            );
        let issues = validate_leaf(&leaf, &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].class, IssueClass::Structural);
        assert_eq!(issues[0].location, "IIS/ELEMENTS/UE/identity_profile.json");
    }

    #[test]
    fn unit_element_type_must_match() {
        let leaf = Leaf::new(LeafKind::UnitElement, scope("ELEMENTS"), "IIS/ELEMENTS/UE")
            .with_document(
                CONTRACT_DOCUMENT,
                json!({
                    "contract_id": "asi-t-core-0001-IIS-ELEMENTS-UE-001",
                    "element_type": "FE",
                    "capabilities": [],
                    "interfaces": [],
                    "qs_integration": {"evidence_required": false}
                }),
            )
            .with_document(
                IDENTITY_PROFILE_DOCUMENT,
                json!({"identity_provider": "pki", "key_management": "hsm", "attestation": "tpm"}),
            );
        let rules: Vec<String> = validate_leaf(&leaf, &ctx())
            .into_iter()
            .map(|i| i.rule)
            .collect();
        assert_eq!(rules, vec![rule::UE_ELEMENT_TYPE, rule::UE_QS_EVIDENCE]);
    }

    #[test]
    fn unit_element_identity_is_scoped_to_its_layer() {
        let ue_leaf = |contract_id: &str| {
            Leaf::new(LeafKind::UnitElement, scope("ELEMENTS"), "IIS/ELEMENTS/UE")
                .with_document(
                    CONTRACT_DOCUMENT,
                    json!({
                        "contract_id": contract_id,
                        "element_type": "UE",
                        "capabilities": ["telemetry"],
                        "interfaces": ["bus"],
                        "qs_integration": {"evidence_required": true}
                    }),
                )
                .with_document(
                    IDENTITY_PROFILE_DOCUMENT,
                    json!({"identity_provider": "pki", "key_management": "hsm", "attestation": "tpm"}),
                )
        };
        assert!(validate_leaf(&ue_leaf("asi-t-core-0001-IIS-ELEMENTS-UE-001"), &ctx()).is_empty());

        let issues = validate_leaf(&ue_leaf("asi-t-core-0001-IIS-UE-001"), &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, rule::LEAF_ID_FORMAT);
        assert_eq!(
            issues[0].message,
            "contract_id \"asi-t-core-0001-IIS-UE-001\" does not match \
             asi-t-core-0001-IIS-ELEMENTS-UE-NNN"
        );
        assert_eq!(
            validate_leaf(&ue_leaf("asi-t-core-0001-IIS-STATES-UE-001"), &ctx()).len(),
            1
        );
    }

    #[test]
    fn solver_element_delegates_to_orchestration() {
        let leaf = Leaf::new(LeafKind::SolverElement, scope("STATES"), "IIS/STATES/SE")
            .with_document(
                ORCHESTRATION_DOCUMENT,
                json!({
                    "problem_class": "scheduling",
                    "solvers": [{"name": "greedy-1", "kind": "classical", "time_budget_ms": 10}],
                    "acceptance": {"max_gap_pct": 5, "constraints": []},
                    "fallback_strategy": "qaoa"
                }),
            );
        let issues = validate_leaf(&leaf, &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, rule::ORCH_FALLBACK);
        assert_eq!(issues[0].location, "IIS/STATES/SE/orchestration.json");
    }

    #[test]
    fn unreadable_document_is_scoped_to_its_leaf() {
        let dir = std::env::temp_dir().join(format!("asit-leaf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(LEAF_DOCUMENT), "{ not json").unwrap();
        let broken = LeafTarget {
            dir: dir.clone(),
            kind: LeafKind::ClassicalBit,
            scope: scope("BITS"),
            location: "IIS/BITS/CB".to_string(),
        };
        let absent = LeafTarget {
            dir: PathBuf::from("/nonexistent/asit/leaf"),
            kind: LeafKind::QuantumBit,
            scope: scope("QUBITS"),
            location: "IIS/QUBITS/QB".to_string(),
        };
        let issues = validate_targets(&[broken, absent], &ctx());
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].class, IssueClass::Environment);
        assert_eq!(issues[0].rule, rule::LEAF_DOCUMENT_READABLE);
        assert_eq!(issues[0].location, "IIS/BITS/CB/leaf.json");
        assert_eq!(issues[1].rule, rule::LEAF_DOCUMENT_PRESENT);
    }

    #[test]
    fn batch_matches_sequential_order() {
        let mut bad = cb_document();
        bad["cb_id"] = json!("WRONG-1");
        let leaves = vec![
            cb_leaf(bad.clone()),
            qb_leaf(qb_document()),
            cb_leaf(cb_document()),
            cb_leaf(bad),
        ];
        let sequential: Vec<Issue> = leaves
            .iter()
            .flat_map(|leaf| validate_leaf(leaf, &ctx()))
            .collect();
        assert_eq!(validate_leaves(&leaves, &ctx()), sequential);
        assert_eq!(sequential.len(), 2);
    }

    proptest! {
        #[test]
        fn accepted_quantum_bits_always_keep_the_classical_fallback(
            cb_fallback in prop_oneof![Just(None), Just(Some(json!(true))), Just(Some(json!(false))), Just(Some(json!("yes")))],
            seed in prop_oneof![Just(None), Just(Some(json!(7))), Just(Some(json!("seed-1"))), Just(Some(json!(""))), Just(Some(Value::Null))],
            drop_policy in any::<bool>(),
        ) {
            let mut doc = qb_document();
            if drop_policy {
                doc.as_object_mut().unwrap().remove("fallback_policy");
            } else {
                let policy = doc["fallback_policy"].as_object_mut().unwrap();
                policy.remove("cb_fallback");
                policy.remove("deterministic_seed");
                if let Some(value) = cb_fallback.clone() {
                    policy.insert("cb_fallback".to_string(), value);
                }
                if let Some(value) = seed.clone() {
                    policy.insert("deterministic_seed".to_string(), value);
                }
            }
            let accepted = validate_leaf(&qb_leaf(doc.clone()), &ctx()).is_empty();
            if accepted {
                prop_assert_eq!(&doc["fallback_policy"]["cb_fallback"], &json!(true));
                let seed = &doc["fallback_policy"]["deterministic_seed"];
                prop_assert!(!seed.is_null());
            }
            let fallback_ok = !drop_policy && cb_fallback == Some(json!(true));
            let seed_ok = !drop_policy
                && matches!(&seed, Some(v) if v.is_i64() || v.as_str().is_some_and(|s| !s.is_empty()));
            prop_assert_eq!(accepted, fallback_ok && seed_ok);
        }
    }
}
