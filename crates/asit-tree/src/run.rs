//! Whole-tree compliance run: shape, retired terms, then every present leaf.

use crate::error::RunError;
use crate::scan::ForbiddenScanner;
use crate::snapshot::TreeSnapshot;
use crate::structure::validate_tree;
use asit_kernel::{Issue, NodeType, TreeShape, ValidationContext};
use asit_leaf::{LeafScope, LeafTarget, validate_targets};
use std::path::Path;

/// Present directory leaves that declare a kind, in (domain, layer, leaf)
/// config order.
pub fn leaf_targets(snapshot: &TreeSnapshot, shape: &TreeShape, program: &str) -> Vec<LeafTarget> {
    let mut targets = Vec::new();
    for domain in &shape.domains {
        for layer in &shape.layers {
            let Some(present) = snapshot.layer(domain, &layer.code) else {
                continue;
            };
            for leaf in &layer.leaves {
                let Some(kind) = leaf.kind else {
                    continue;
                };
                if leaf.node != NodeType::Dir
                    || present.entries.get(&leaf.code) != Some(&NodeType::Dir)
                {
                    continue;
                }
                targets.push(LeafTarget {
                    dir: snapshot.root.join(domain).join(&layer.code).join(&leaf.code),
                    kind,
                    scope: LeafScope::new(program, domain.clone(), layer.code.clone()),
                    location: format!("{domain}/{}/{}", layer.code, leaf.code),
                });
            }
        }
    }
    targets
}

/// Structural issues followed by leaf issues. Unreadable leaf documents are
/// environment issues; only an unusable root or ruleset aborts the run.
pub fn run_compliance(root: &Path, ctx: &ValidationContext) -> Result<Vec<Issue>, RunError> {
    let rules = &ctx.rules;
    let scanner = ForbiddenScanner::new(&rules.scan)?;
    let snapshot = TreeSnapshot::load(root, rules)?;

    let mut issues = validate_tree(&snapshot, &rules.tree, &scanner);
    let targets = leaf_targets(&snapshot, &rules.tree, ctx.program());
    tracing::debug!(leaves = targets.len(), "validating leaves");
    issues.extend(validate_targets(&targets, ctx));
    Ok(issues)
}
