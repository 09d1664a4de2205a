use crate::support;
use asit_tree::{ForbiddenScanner, TreeSnapshot, validate_tree};
use std::path::Path;

pub fn run(root: String, ruleset: Option<String>, json: bool) {
    let root = Path::new(&root);
    let rules = support::load_rules_or_exit(root, ruleset.as_deref());
    let ctx = support::context_for(rules, json);
    let scanner = ForbiddenScanner::new(&ctx.rules.scan).unwrap_or_else(|e| support::fail(e));
    let snapshot = TreeSnapshot::load(root, &ctx.rules).unwrap_or_else(|e| support::fail(e));
    tracing::debug!(
        domains = snapshot.domains.len(),
        texts = snapshot.texts.len(),
        terms = scanner.term_count(),
        "tree snapshot taken"
    );
    let issues = validate_tree(&snapshot, &ctx.rules.tree, &scanner);
    support::finish(&ctx, issues, json);
}
