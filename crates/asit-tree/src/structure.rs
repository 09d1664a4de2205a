//! Structural tree validation over a snapshot.

use crate::scan::ForbiddenScanner;
use crate::snapshot::TreeSnapshot;
use asit_kernel::{Issue, TreeShape, rule};

/// Shape issues in (domain, layer, leaf) config order, then retired-term hits.
///
/// A missing domain is one issue; its layers are not reported individually.
pub fn validate_tree(
    snapshot: &TreeSnapshot,
    shape: &TreeShape,
    scanner: &ForbiddenScanner,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    for domain in &shape.domains {
        let Some(present) = snapshot.domains.get(domain) else {
            issues.push(Issue::structural(
                rule::TREE_DOMAIN_PRESENT,
                domain.clone(),
                format!("domain directory {domain} is missing"),
            ));
            continue;
        };
        for layer in &shape.layers {
            let layer_location = format!("{domain}/{}", layer.code);
            let Some(entries) = present.layers.get(&layer.code) else {
                issues.push(Issue::structural(
                    rule::TREE_LAYER_PRESENT,
                    layer_location,
                    format!("layer {} is missing from domain {domain}", layer.code),
                ));
                continue;
            };
            for leaf in &layer.leaves {
                let leaf_location = format!("{layer_location}/{}", leaf.code);
                match entries.entries.get(&leaf.code) {
                    None => issues.push(Issue::structural(
                        rule::TREE_LEAF_PRESENT,
                        leaf_location,
                        format!("required {} {} is missing", leaf.node, leaf.code),
                    )),
                    Some(found) if *found != leaf.node => issues.push(Issue::structural(
                        rule::TREE_LEAF_NODE_TYPE,
                        leaf_location,
                        format!("{} must be a {}, found a {found}", leaf.code, leaf.node),
                    )),
                    Some(_) => {}
                }
            }
        }
    }

    let structural = issues.len();
    issues.extend(scanner.scan(&snapshot.texts).iter().map(|hit| hit.to_issue()));
    tracing::debug!(
        structural,
        retired_terms = issues.len() - structural,
        "tree validated"
    );
    issues
}
