//! Static schema documents for leaf payloads.
//!
//! Schemas only say what must be present and of which type. Values that are
//! present but wrong (a gate set to `false`, a zero budget) are semantic
//! rules, so each defect is reported exactly once.

use crate::model::{CONTRACT_DOCUMENT, IDENTITY_PROFILE_DOCUMENT, LEAF_DOCUMENT};
use asit_kernel::LeafKind;
use serde_json::{Value, json};

fn non_empty_string() -> Value {
    json!({"type": "string", "minLength": 1})
}

pub fn classical_bit_schema() -> Value {
    json!({
        "type": "object",
        "required": ["cb_id", "description", "version", "algorithms"],
        "properties": {
            "cb_id": non_empty_string(),
            "description": non_empty_string(),
            "version": non_empty_string(),
            "algorithms": {"type": "array", "minItems": 1, "items": non_empty_string()},
            "mal_requirements": {
                "type": "object",
                "properties": {
                    "wcet_budget_ms": {"type": "number"},
                    "safety_fence": {"type": "string"}
                }
            }
        }
    })
}

pub fn quantum_bit_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "qb_id", "description", "version",
            "quantum_backend", "fallback_policy", "security_policy"
        ],
        "properties": {
            "qb_id": non_empty_string(),
            "description": non_empty_string(),
            "version": non_empty_string(),
            "quantum_backend": {
                "type": "object",
                "required": ["primary", "fallback", "providers"],
                "properties": {
                    "primary": non_empty_string(),
                    "fallback": non_empty_string(),
                    "providers": {"type": "array", "items": {"type": "string"}}
                }
            },
            "fallback_policy": {
                "type": "object",
                "required": ["cb_fallback", "deterministic_seed"],
                "properties": {
                    "cb_fallback": {"type": "boolean"},
                    "deterministic_seed": {"type": ["integer", "string"]}
                }
            },
            "security_policy": {
                "type": "object",
                "required": ["no_vendor_secrets", "adapter_only_integration"],
                "properties": {
                    "no_vendor_secrets": {"type": "boolean"},
                    "adapter_only_integration": {"type": "boolean"}
                }
            }
        }
    })
}

pub fn forward_wave_schema() -> Value {
    json!({
        "type": "object",
        "required": ["fwd_id", "version", "description", "wave_config", "performance", "integration"],
        "properties": {
            "fwd_id": non_empty_string(),
            "version": non_empty_string(),
            "description": non_empty_string(),
            "wave_config": {
                "type": "object",
                "required": ["propagation_method", "boundary_conditions", "grid_resolution"],
                "properties": {
                    "propagation_method": non_empty_string(),
                    "boundary_conditions": {"type": ["string", "array", "object"]},
                    "grid_resolution": {"type": ["number", "array", "object"]}
                }
            },
            "performance": {
                "type": "object",
                "required": ["max_propagation_time_ms", "stability_threshold"],
                "properties": {
                    "max_propagation_time_ms": {"type": "number"},
                    "stability_threshold": {"type": "number"}
                }
            },
            "integration": {
                "type": "object",
                "required": ["qs_evidence_required", "deterministic"],
                "properties": {
                    "qs_evidence_required": {"type": "boolean"},
                    "deterministic": {"type": "boolean"}
                }
            }
        }
    })
}

pub fn unit_element_contract_schema() -> Value {
    json!({
        "type": "object",
        "required": ["contract_id", "element_type", "capabilities", "interfaces", "qs_integration"],
        "properties": {
            "contract_id": non_empty_string(),
            "element_type": {"type": "string"},
            "capabilities": {"type": "array", "items": non_empty_string()},
            "interfaces": {"type": "array", "items": {"type": ["string", "object"]}},
            "qs_integration": {
                "type": "object",
                "required": ["evidence_required"],
                "properties": {
                    "evidence_required": {"type": "boolean"}
                }
            }
        }
    })
}

pub fn identity_profile_schema() -> Value {
    json!({
        "type": "object",
        "required": ["identity_provider", "key_management", "attestation"],
        "properties": {
            "identity_provider": {"type": ["string", "object"]},
            "key_management": {"type": ["string", "object"]},
            "attestation": {"type": ["string", "object"]}
        }
    })
}

/// Schema of `document` for leaves of `kind`. Federation and solver
/// documents carry their own schema gate in `asit-federation`.
pub fn schema_for(kind: LeafKind, document: &str) -> Option<Value> {
    match (kind, document) {
        (LeafKind::ClassicalBit, LEAF_DOCUMENT) => Some(classical_bit_schema()),
        (LeafKind::QuantumBit, LEAF_DOCUMENT) => Some(quantum_bit_schema()),
        (LeafKind::ForwardWave, LEAF_DOCUMENT) => Some(forward_wave_schema()),
        (LeafKind::UnitElement, CONTRACT_DOCUMENT) => Some(unit_element_contract_schema()),
        (LeafKind::UnitElement, IDENTITY_PROFILE_DOCUMENT) => Some(identity_profile_schema()),
        _ => None,
    }
}

/// `(document, field)` carrying the scoped identity string.
pub fn identity_field(kind: LeafKind) -> Option<(&'static str, &'static str)> {
    match kind {
        LeafKind::ClassicalBit => Some((LEAF_DOCUMENT, "cb_id")),
        LeafKind::QuantumBit => Some((LEAF_DOCUMENT, "qb_id")),
        LeafKind::ForwardWave => Some((LEAF_DOCUMENT, "fwd_id")),
        LeafKind::UnitElement => Some((CONTRACT_DOCUMENT, "contract_id")),
        LeafKind::FederationElement | LeafKind::SolverElement => None,
    }
}
