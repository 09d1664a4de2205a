use crate::support;
use asit_kernel::{
    Anchor, AnchorError, AnchorEvent, Ed25519AnchorSigner, Ed25519AnchorVerifier, EventPayload,
    Issue, IssueClass, ModeTransition, build_anchor, integrity_issue, rule, verify_anchor,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Event file accepted by `anchor build`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventFile {
    utcs_code: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    mode_transition: Option<ModeTransition>,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    limits: BTreeMap<String, f64>,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    trace_refs: Vec<String>,
}

impl EventFile {
    fn into_event(self) -> (AnchorEvent, Vec<String>) {
        let event = AnchorEvent {
            utcs_code: self.utcs_code,
            timestamp: self.timestamp,
            payload: EventPayload {
                mode_transition: self.mode_transition,
                reasons: self.reasons,
                limits: self.limits,
                attributes: self.attributes,
            },
        };
        (event, self.trace_refs)
    }
}

fn read_key_or_exit(path: &str) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| support::fail(format!("failed to read key {path}: {e}")))
}

fn signer_or_exit(path: &str) -> Ed25519AnchorSigner {
    Ed25519AnchorSigner::from_seed_hex(&read_key_or_exit(path))
        .unwrap_or_else(|e| support::fail(format!("{path}: {e}")))
}

fn write_anchor_or_exit(anchor: &Anchor, out: &str) {
    let mut rendered = serde_json::to_string_pretty(anchor)
        .unwrap_or_else(|e| support::fail(format!("failed to render anchor: {e}")));
    rendered.push('\n');
    if out == "-" {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(rendered.as_bytes()) {
            support::fail(format!("failed to write anchor: {e}"));
        }
        return;
    }
    std::fs::write(out, rendered)
        .unwrap_or_else(|e| support::fail(format!("failed to write {out}: {e}")));
}

pub fn build(
    event_path: String,
    extra_trace_refs: Vec<String>,
    key: String,
    out: String,
    json: bool,
) {
    let file: EventFile = support::parse_json_or_exit(&event_path);
    let (event, mut trace_refs) = file.into_event();
    trace_refs.extend(extra_trace_refs);
    let signer = signer_or_exit(&key);

    let anchor = match build_anchor(&event, &trace_refs, &signer) {
        Ok(anchor) => anchor,
        Err(AnchorError::Encoding(err)) => {
            let rules = support::load_rules_or_exit(Path::new("."), None);
            let ctx = support::context_for(rules, json);
            let issue = Issue::new(
                IssueClass::Encoding,
                rule::ANCHOR_ENCODING,
                event_path,
                err.to_string(),
            );
            support::finish(&ctx, vec![issue], json);
            return;
        }
        Err(err) => support::fail(format!("{event_path}: {err}")),
    };

    write_anchor_or_exit(&anchor, &out);
    if out == "-" {
        return;
    }
    if json {
        support::print_json(&anchor);
    } else {
        println!(
            "anchored {} sha256:{} -> {out}",
            anchor.utcs_code, anchor.content_hash_sha256
        );
    }
}

pub fn verify(path: String, public_key: String, ruleset: Option<String>, json: bool) {
    let verifier = Ed25519AnchorVerifier::from_public_hex(&read_key_or_exit(&public_key))
        .unwrap_or_else(|e| support::fail(format!("{public_key}: {e}")));
    let dir = Path::new(&path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let rules = support::load_rules_or_exit(dir, ruleset.as_deref());
    let ctx = support::context_for(rules, json);

    // A record that does not even have the anchor shape is rejected whole.
    let record = support::read_json_or_exit(&path);
    let outcome = match serde_json::from_value::<Anchor>(record) {
        Ok(anchor) => {
            verify_anchor(&anchor, &verifier).map_err(|err| integrity_issue(&path, &err))
        }
        Err(err) => Err(Issue::new(
            IssueClass::Integrity,
            rule::ANCHOR_INTEGRITY,
            &path,
            format!("anchor is malformed: {err}"),
        )),
    };

    match outcome {
        Ok(digest) => {
            support::finish(&ctx, Vec::new(), json);
            if !json {
                println!("verified {path} sha256:{digest}");
            }
        }
        Err(issue) => support::finish(&ctx, vec![issue], json),
    }
}

pub fn public_key(key: String) {
    println!("{}", signer_or_exit(&key).verifier().public_hex());
}
