//! In-memory snapshot of a tree: what exists, and every scannable text.
//!
//! Loading is the only filesystem access; validation over a snapshot is a
//! pure function of it.

use crate::error::SnapshotError;
use asit_kernel::{NodeType, RuleSet, parallel};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Entries of one layer directory, name → node type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSnapshot {
    pub entries: BTreeMap<String, NodeType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSnapshot {
    pub layers: BTreeMap<String, LayerSnapshot>,
}

/// A text file, with its root-relative `/`-separated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub root: PathBuf,
    pub domains: BTreeMap<String, DomainSnapshot>,
    /// Sorted by path.
    pub texts: Vec<TextFile>,
}

struct Child {
    name: String,
    path: PathBuf,
    kind: fs::FileType,
}

/// Entries of `dir` sorted by name. Symlinks are reported as such and never
/// resolved.
fn read_dir_sorted(dir: &Path) -> Result<Vec<Child>, SnapshotError> {
    let read_err = |source| SnapshotError::Read {
        path: dir.display().to_string(),
        source,
    };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        out.push(Child {
            name: entry.file_name().to_string_lossy().to_string(),
            kind: entry.file_type().map_err(read_err)?,
            path: entry.path(),
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Directories that may be descended into. A symlinked directory is logged
/// and left out, so the domain or layer it stands for reads as missing.
fn traversable(child: &Child) -> bool {
    if child.kind.is_symlink() {
        if child.path.is_dir() {
            tracing::warn!(path = %child.path.display(), "not following symlinked directory");
        }
        return false;
    }
    child.kind.is_dir()
}

struct Exclusions {
    files: Vec<Pattern>,
    dirs: Vec<Pattern>,
}

impl Exclusions {
    fn new(globs: &[String]) -> Self {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for glob in globs {
            match Pattern::new(glob) {
                Ok(pattern) => files.push(pattern),
                Err(err) => {
                    tracing::warn!(%glob, %err, "ignoring invalid exclude glob");
                    continue;
                }
            }
            if let Some(prefix) = glob.strip_suffix("/**")
                && let Ok(pattern) = Pattern::new(prefix)
            {
                dirs.push(pattern);
            }
        }
        Self { files, dirs }
    }

    fn skips_dir(&self, rel: &str) -> bool {
        self.dirs.iter().any(|p| p.matches_with(rel, MATCH))
    }

    fn skips_file(&self, rel: &str) -> bool {
        self.files.iter().any(|p| p.matches_with(rel, MATCH))
    }
}

fn relative(root: &Path, entry: &DirEntry) -> String {
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    rel.to_string_lossy().replace('\\', "/")
}

/// Every allow-listed, non-excluded regular file under `root`, in path order.
/// Symlinks are never followed, so the walk stays inside `root`.
fn collect_text_paths(
    root: &Path,
    extensions: &[String],
    exclusions: &Exclusions,
) -> Vec<(String, PathBuf)> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !exclusions.skips_dir(&relative(root, entry))
        });

    let mut out = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let allowed = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        let rel = relative(root, &entry);
        if allowed && !exclusions.skips_file(&rel) {
            out.push((rel, entry.into_path()));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

impl TreeSnapshot {
    /// Snapshot `root`: two levels of structure under every top-level
    /// directory, plus the contents of every allow-listed text file. The
    /// ruleset's own file is left out of the texts when it lies under `root`.
    pub fn load(root: &Path, rules: &RuleSet) -> Result<Self, SnapshotError> {
        if !root.is_dir() {
            return Err(SnapshotError::RootMissing {
                path: root.display().to_string(),
            });
        }

        let mut domains = BTreeMap::new();
        for domain in read_dir_sorted(root)? {
            if domain.name.starts_with('.') || !traversable(&domain) {
                continue;
            }
            let mut snapshot = DomainSnapshot::default();
            for layer in read_dir_sorted(&domain.path)? {
                if !traversable(&layer) {
                    continue;
                }
                let entries = read_dir_sorted(&layer.path)?
                    .into_iter()
                    .map(|child| {
                        let node = if child.kind.is_dir() {
                            NodeType::Dir
                        } else {
                            NodeType::File
                        };
                        (child.name, node)
                    })
                    .collect();
                snapshot.layers.insert(layer.name, LayerSnapshot { entries });
            }
            domains.insert(domain.name, snapshot);
        }

        let exclusions = Exclusions::new(&rules.scan_excludes(root));
        let candidates = collect_text_paths(root, &rules.scan.extensions, &exclusions);
        let texts = parallel::map_ordered(&candidates, |(rel, path)| match fs::read(path) {
            Ok(bytes) => Some(TextFile {
                path: rel.clone(),
                content: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Err(err) => {
                tracing::warn!(path = %rel, %err, "skipping unreadable file");
                None
            }
        })
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        tracing::debug!(
            root = %root.display(),
            domains = domains.len(),
            texts = texts.len(),
            "tree snapshot loaded"
        );
        Ok(Self {
            root: root.to_path_buf(),
            domains,
            texts,
        })
    }

    pub fn layer(&self, domain: &str, layer: &str) -> Option<&LayerSnapshot> {
        self.domains.get(domain)?.layers.get(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempTree;

    #[test]
    fn records_structure_and_filters_texts() {
        let tree = TempTree::new("snapshot");
        tree.write("IIS/BITS/CB/leaf.json", "{}");
        tree.write("IIS/META/README.md", "# IIS");
        tree.write("IIS/META/diagram.png", "binary");
        tree.write("asit.toml", "[ruleset]\n");
        tree.write("target/debug/out.json", "{}");
        tree.write("notes.txt", "hello");

        let snapshot = TreeSnapshot::load(tree.path(), &RuleSet::default()).unwrap();
        let bits = snapshot.layer("IIS", "BITS").unwrap();
        assert_eq!(bits.entries.get("CB"), Some(&NodeType::Dir));
        let meta = snapshot.layer("IIS", "META").unwrap();
        assert_eq!(meta.entries.get("README.md"), Some(&NodeType::File));
        assert!(snapshot.domains.contains_key("target"));

        let paths: Vec<&str> = snapshot.texts.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["IIS/BITS/CB/leaf.json", "IIS/META/README.md", "notes.txt"]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = TreeSnapshot::load(Path::new("/nonexistent/asit/tree"), &RuleSet::default())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::RootMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_never_followed() {
        use std::os::unix::fs::symlink;

        let outside = TempTree::new("snapshot-outside");
        outside.write("secret.md", "QBIT outside the tree");
        outside.write("LINKED/README.md", "# linked");

        let tree = TempTree::new("snapshot-links");
        tree.write("IIS/META/README.md", "# IIS");
        tree.mkdir("IIS/SYSTEMS");
        symlink(outside.path(), tree.path().join("IIS/META/ext")).unwrap();
        symlink(tree.path(), tree.path().join("IIS/SYSTEMS/loop")).unwrap();
        symlink(outside.path().join("LINKED"), tree.path().join("IIS/STATIONS")).unwrap();
        symlink(outside.path(), tree.path().join("OUT")).unwrap();

        let snapshot = TreeSnapshot::load(tree.path(), &RuleSet::default()).unwrap();

        let paths: Vec<&str> = snapshot.texts.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["IIS/META/README.md"]);

        let iis = snapshot.domains.get("IIS").unwrap();
        assert!(!iis.layers.contains_key("STATIONS"));
        assert!(!snapshot.domains.contains_key("OUT"));
        let meta = snapshot.layer("IIS", "META").unwrap();
        assert_eq!(meta.entries.get("ext"), Some(&NodeType::File));
        let systems = snapshot.layer("IIS", "SYSTEMS").unwrap();
        assert_eq!(systems.entries.get("loop"), Some(&NodeType::File));
    }
}
