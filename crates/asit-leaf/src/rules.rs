//! Kind-specific semantic rules over already-parsed documents.
//!
//! Rules look only at values that are present and of the expected type;
//! anything absent or mistyped has already been reported by the schema gate.

use asit_kernel::{Issue, LeafKind, rule};
use serde_json::Value;

/// Value at a dotted path, treating `null` as absent.
fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, key| value.get(key))
        .filter(|value| !value.is_null())
}

fn require_true(issues: &mut Vec<Issue>, document: &Value, path: &str, rule: &str, location: &str) {
    if let Some(Value::Bool(false)) = field(document, path) {
        issues.push(Issue::semantic(rule, location, format!("{path} must be true")));
    }
}

fn require_positive(
    issues: &mut Vec<Issue>,
    document: &Value,
    path: &str,
    rule: &str,
    location: &str,
) {
    if let Some(number) = field(document, path).and_then(Value::as_f64)
        && !(number.is_finite() && number > 0.0)
    {
        issues.push(Issue::semantic(
            rule,
            location,
            format!("{path} must be positive (actual={number})"),
        ));
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(text) => text.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

pub fn classical_bit(document: &Value, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let Some(mal) = field(document, "mal_requirements").and_then(Value::as_object) else {
        return issues;
    };

    match mal.get("wcet_budget_ms").filter(|v| !v.is_null()) {
        None => issues.push(Issue::semantic(
            rule::CB_MAL_WCET,
            location,
            "mal_requirements.wcet_budget_ms is required when mal_requirements is present",
        )),
        Some(_) => require_positive(
            &mut issues,
            document,
            "mal_requirements.wcet_budget_ms",
            rule::CB_MAL_WCET,
            location,
        ),
    }

    match mal.get("safety_fence") {
        None | Some(Value::Null) => issues.push(Issue::semantic(
            rule::CB_MAL_SAFETY_FENCE,
            location,
            "mal_requirements.safety_fence is required when mal_requirements is present",
        )),
        Some(Value::String(fence)) if fence.trim().is_empty() => issues.push(Issue::semantic(
            rule::CB_MAL_SAFETY_FENCE,
            location,
            "mal_requirements.safety_fence must name a fence",
        )),
        Some(_) => {}
    }
    issues
}

/// Final key segments that name a credential.
const SECRET_MARKERS: [&str; 10] = [
    "apikey",
    "secret",
    "secrets",
    "token",
    "tokens",
    "password",
    "passwd",
    "passphrase",
    "credential",
    "credentials",
];

/// Lowercase words of a key, split on `_`, `-`, `.`, spaces and camelCase
/// boundaries: `clientSecret` → `client`, `secret`.
fn key_segments(key: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in key.chars() {
        if matches!(ch, '_' | '-' | '.' | ' ') {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// The key names a credential itself (`api_key`, `client_secret`), not
/// something about credentials (`secret_manager`, `tokenizer`).
fn names_credential(key: &str) -> bool {
    let segments = key_segments(key);
    match segments.as_slice() {
        [.., api, suffix] if api == "api" && suffix == "key" => true,
        [.., last] => SECRET_MARKERS.contains(&last.as_str()),
        [] => false,
    }
}

fn carries_text(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => items.iter().any(carries_text),
        _ => false,
    }
}

/// Paths of credential-named keys carrying a value, through nested objects
/// and arrays.
fn embedded_secrets(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if names_credential(key) && carries_text(child) {
                    out.push(child_path.clone());
                }
                embedded_secrets(child, &child_path, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                embedded_secrets(item, &format!("{path}[{index}]"), out);
            }
        }
        _ => {}
    }
}

pub fn quantum_bit(document: &Value, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();

    require_true(
        &mut issues,
        document,
        "fallback_policy.cb_fallback",
        rule::QB_CLASSICAL_FALLBACK,
        location,
    );
    if let Some(Value::String(seed)) = field(document, "fallback_policy.deterministic_seed")
        && seed.trim().is_empty()
    {
        issues.push(Issue::semantic(
            rule::QB_DETERMINISTIC_SEED,
            location,
            "fallback_policy.deterministic_seed must not be blank",
        ));
    }

    require_true(
        &mut issues,
        document,
        "security_policy.no_vendor_secrets",
        rule::QB_NO_VENDOR_SECRETS,
        location,
    );
    let mut secrets = Vec::new();
    embedded_secrets(document, "", &mut secrets);
    for path in secrets {
        issues.push(Issue::semantic(
            rule::QB_NO_VENDOR_SECRETS,
            location,
            format!("{path} embeds a vendor credential; integrate through an adapter instead"),
        ));
    }
    require_true(
        &mut issues,
        document,
        "security_policy.adapter_only_integration",
        rule::QB_ADAPTER_ONLY,
        location,
    );

    if let Some(providers) = field(document, "quantum_backend.providers").and_then(Value::as_array)
    {
        if providers.is_empty() {
            issues.push(Issue::semantic(
                rule::QB_BACKEND_PROVIDERS,
                location,
                "quantum_backend.providers must list at least one provider",
            ));
        }
        for (idx, provider) in providers.iter().enumerate() {
            if provider.as_str().is_some_and(|p| p.trim().is_empty()) {
                issues.push(Issue::semantic(
                    rule::QB_BACKEND_PROVIDERS,
                    location,
                    format!("quantum_backend.providers[{idx}] must not be blank"),
                ));
            }
        }
    }
    issues
}

pub fn forward_wave(document: &Value, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    require_true(
        &mut issues,
        document,
        "integration.qs_evidence_required",
        rule::FWD_QS_EVIDENCE,
        location,
    );
    require_true(
        &mut issues,
        document,
        "integration.deterministic",
        rule::FWD_DETERMINISTIC,
        location,
    );
    for path in [
        "performance.max_propagation_time_ms",
        "performance.stability_threshold",
    ] {
        require_positive(&mut issues, document, path, rule::FWD_PERFORMANCE, location);
    }
    issues
}

pub fn unit_element_contract(document: &Value, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let expected = LeafKind::UnitElement.code();
    if let Some(Value::String(element_type)) = field(document, "element_type")
        && element_type.trim() != expected
    {
        issues.push(Issue::semantic(
            rule::UE_ELEMENT_TYPE,
            location,
            format!("element_type must be {expected:?} (actual={element_type:?})"),
        ));
    }
    require_true(
        &mut issues,
        document,
        "qs_integration.evidence_required",
        rule::UE_QS_EVIDENCE,
        location,
    );
    issues
}

pub fn identity_profile(document: &Value, location: &str) -> Vec<Issue> {
    ["identity_provider", "key_management", "attestation"]
        .into_iter()
        .filter(|key| field(document, key).is_some_and(is_blank))
        .map(|key| {
            Issue::semantic(
                rule::UE_IDENTITY_PROFILE,
                location,
                format!("{key} must not be empty"),
            )
        })
        .collect()
}
