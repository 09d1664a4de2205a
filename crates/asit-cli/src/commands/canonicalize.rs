use crate::support;
use asit_kernel::{ContentDigest, Issue, IssueClass, canonicalize_str, rule};
use serde_json::json;
use std::io::Write;
use std::path::Path;

/// Canonical bytes are written exactly, without a trailing newline, so the
/// output can be piped into any hashing tool.
pub fn run(path: String, hash: bool, ruleset: Option<String>, json: bool) {
    let text = support::read_text_or_exit(&path);
    let location = if path == "-" { "<stdin>".to_string() } else { path };

    let bytes = match canonicalize_str(&text) {
        Ok(bytes) => bytes,
        Err(err) => {
            let rules = support::load_rules_or_exit(Path::new("."), ruleset.as_deref());
            let ctx = support::context_for(rules, json);
            let issue = Issue::new(
                IssueClass::Encoding,
                rule::ANCHOR_ENCODING,
                location,
                err.to_string(),
            );
            support::finish(&ctx, vec![issue], json);
            return;
        }
    };
    let digest = ContentDigest::of_bytes(&bytes);

    if json {
        support::print_json(&json!({
            "canonical": String::from_utf8_lossy(&bytes),
            "sha256": digest.to_hex(),
        }));
    } else if hash {
        println!("{digest}");
    } else {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(&bytes).and_then(|()| stdout.flush()) {
            support::fail(format!("failed to write canonical bytes: {e}"));
        }
    }
}
