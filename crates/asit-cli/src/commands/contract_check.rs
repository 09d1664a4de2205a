use crate::support;
use asit_federation::{
    check_coalition_document, check_federation_document, check_orchestration_document,
};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Contract {
    Federation,
    Coalition,
    Orchestration,
}

/// Validate one standalone contract document. The ruleset is looked up
/// from the document's directory.
pub fn run(contract: Contract, path: String, ruleset: Option<String>, json: bool) {
    let dir = Path::new(&path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let rules = support::load_rules_or_exit(dir, ruleset.as_deref());
    let ctx = support::context_for(rules, json);
    let document = support::read_json_or_exit(&path);

    let issues = match contract {
        Contract::Federation => check_federation_document(&document, &path, &ctx),
        Contract::Coalition => check_coalition_document(&document, &path, &ctx),
        Contract::Orchestration => check_orchestration_document(&document, &path, &ctx),
    };
    support::finish(&ctx, issues, json);
}
