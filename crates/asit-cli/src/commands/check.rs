use crate::support;
use asit_tree::run_compliance;
use std::path::Path;

pub fn run(root: String, ruleset: Option<String>, json: bool) {
    let root = Path::new(&root);
    let rules = support::load_rules_or_exit(root, ruleset.as_deref());
    let ctx = support::context_for(rules, json);
    let issues = run_compliance(root, &ctx).unwrap_or_else(|e| support::fail(e));
    support::finish(&ctx, issues, json);
}
