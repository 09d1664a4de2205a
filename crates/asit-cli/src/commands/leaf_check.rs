use crate::support;
use asit_kernel::{LeafKind, TreeShape};
use asit_leaf::{LeafScope, LeafTarget, validate_target};
use std::path::{Path, PathBuf};

pub struct Args {
    pub path: String,
    pub kind: Option<String>,
    pub domain: Option<String>,
    pub layer: Option<String>,
    pub ruleset: Option<String>,
    pub json: bool,
}

/// Name of the `up`-th ancestor (0 is the path itself).
fn component(path: &Path, up: usize) -> Option<String> {
    path.ancestors()
        .nth(up)?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn declared_kind(shape: &TreeShape, layer: &str, code: &str) -> Option<LeafKind> {
    shape
        .layers
        .iter()
        .find(|spec| spec.code == layer)?
        .leaves
        .iter()
        .find(|leaf| leaf.code == code)?
        .kind
}

pub fn run(args: Args) {
    let dir = PathBuf::from(&args.path);
    if !dir.is_dir() {
        support::fail(format!("leaf directory {} does not exist", args.path));
    }
    let dir = dir
        .canonicalize()
        .unwrap_or_else(|e| support::fail(format!("failed to resolve {}: {e}", args.path)));

    let code = component(&dir, 0)
        .unwrap_or_else(|| support::fail(format!("cannot name leaf at {}", dir.display())));
    let layer = args
        .layer
        .or_else(|| component(&dir, 1))
        .unwrap_or_else(|| support::fail("cannot infer layer; pass --layer"));
    let domain = args
        .domain
        .or_else(|| component(&dir, 2))
        .unwrap_or_else(|| support::fail("cannot infer domain; pass --domain"));

    let rules = support::load_rules_or_exit(&dir, args.ruleset.as_deref());
    let kind = match args.kind {
        Some(kind) => kind.parse::<LeafKind>().unwrap_or_else(|e| support::fail(e)),
        None => declared_kind(&rules.tree, &layer, &code).unwrap_or_else(|| {
            support::fail(format!("no leaf kind declared for {layer}/{code}; pass --kind"))
        }),
    };

    let ctx = support::context_for(rules, args.json);
    let target = LeafTarget {
        dir,
        kind,
        scope: LeafScope::new(ctx.program(), domain.clone(), layer.clone()),
        location: format!("{domain}/{layer}/{code}"),
    };
    tracing::debug!(location = %target.location, %kind, "checking leaf");
    let issues = validate_target(&target, &ctx);
    support::finish(&ctx, issues, args.json);
}
