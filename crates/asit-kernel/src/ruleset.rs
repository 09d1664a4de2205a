//! Ruleset configuration: tree shape, scan policy, identity program.
//!
//! Loaded from `asit.toml` at the tree root when present; otherwise the
//! built-in defaults apply. The shape is static configuration, never
//! computed from the tree being checked.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const RULESET_FILE: &str = "asit.toml";
pub const DEFAULT_RULESET_VERSION: &str = "asit.ruleset.v1";
pub const DEFAULT_PROGRAM: &str = "asi-t-core-0001";

const DEFAULT_DOMAINS: [&str; 15] = [
    "AAA", "AAP", "CCC", "CQH", "DDD", "EDI", "EEE", "EER", "IIF", "IIS", "LCC", "LIB", "MEC",
    "OOO", "PPP",
];

const DEFAULT_TEXT_EXTENSIONS: [&str; 6] = ["md", "json", "yaml", "yml", "toml", "txt"];

/// Leaf kinds. The tag is declared by the tree shape and stored on each leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeafKind {
    /// Classical bit.
    #[serde(rename = "CB")]
    ClassicalBit,
    /// Quantum bit.
    #[serde(rename = "QB")]
    QuantumBit,
    /// Forward wave.
    #[serde(rename = "FWD")]
    ForwardWave,
    /// Unit element.
    #[serde(rename = "UE")]
    UnitElement,
    /// Federation element.
    #[serde(rename = "FE")]
    FederationElement,
    /// Solver element (orchestration contract).
    #[serde(rename = "SE")]
    SolverElement,
}

impl LeafKind {
    pub const ALL: [LeafKind; 6] = [
        LeafKind::ClassicalBit,
        LeafKind::QuantumBit,
        LeafKind::ForwardWave,
        LeafKind::UnitElement,
        LeafKind::FederationElement,
        LeafKind::SolverElement,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LeafKind::ClassicalBit => "CB",
            LeafKind::QuantumBit => "QB",
            LeafKind::ForwardWave => "FWD",
            LeafKind::UnitElement => "UE",
            LeafKind::FederationElement => "FE",
            LeafKind::SolverElement => "SE",
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LeafKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        LeafKind::ALL
            .into_iter()
            .find(|kind| kind.code() == upper)
            .ok_or_else(|| format!("unknown leaf kind {s:?}; expected one of CB, QB, FWD, UE, FE, SE"))
    }
}

/// Whether a leaf node is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    #[default]
    Dir,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::File => f.write_str("file"),
            NodeType::Dir => f.write_str("directory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafSpec {
    pub code: String,
    #[serde(default)]
    pub kind: Option<LeafKind>,
    #[serde(default)]
    pub node: NodeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
    pub code: String,
    #[serde(default)]
    pub leaves: Vec<LeafSpec>,
}

/// Closed domain list and layer → leaf-set mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeShape {
    pub domains: Vec<String>,
    pub layers: Vec<LayerSpec>,
}

impl Default for TreeShape {
    fn default() -> Self {
        fn leaf(code: &str, kind: Option<LeafKind>, node: NodeType) -> LeafSpec {
            LeafSpec {
                code: code.to_string(),
                kind,
                node,
            }
        }
        fn layer(code: &str, leaves: Vec<LeafSpec>) -> LayerSpec {
            LayerSpec {
                code: code.to_string(),
                leaves,
            }
        }
        Self {
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            layers: vec![
                layer("SYSTEMS", Vec::new()),
                layer("STATIONS", Vec::new()),
                layer("COMPONENTS", Vec::new()),
                layer(
                    "BITS",
                    vec![leaf("CB", Some(LeafKind::ClassicalBit), NodeType::Dir)],
                ),
                layer(
                    "QUBITS",
                    vec![leaf("QB", Some(LeafKind::QuantumBit), NodeType::Dir)],
                ),
                layer(
                    "ELEMENTS",
                    vec![
                        leaf("UE", Some(LeafKind::UnitElement), NodeType::Dir),
                        leaf("FE", Some(LeafKind::FederationElement), NodeType::Dir),
                    ],
                ),
                layer(
                    "WAVES",
                    vec![leaf("FWD", Some(LeafKind::ForwardWave), NodeType::Dir)],
                ),
                layer(
                    "STATES",
                    vec![leaf("SE", Some(LeafKind::SolverElement), NodeType::Dir)],
                ),
                layer("META", vec![leaf("README.md", None, NodeType::File)]),
            ],
        }
    }
}

/// A retired term, as data: regex pattern plus the glob of files it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForbiddenTerm {
    pub pattern: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub replacement: Option<String>,
}

fn default_scope() -> String {
    "**/*".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub forbidden: Vec<ForbiddenTerm>,
}

impl ScanConfig {
    /// Exclusion globs, always including the ruleset file so the scanner
    /// never flags its own term list.
    pub fn effective_excludes(&self) -> Vec<String> {
        let mut out = self.exclude.clone();
        if !out.iter().any(|glob| glob == RULESET_FILE) {
            out.push(RULESET_FILE.to_string());
        }
        out
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        fn term(pattern: &str, scope: &str, replacement: Option<&str>) -> ForbiddenTerm {
            ForbiddenTerm {
                pattern: pattern.to_string(),
                scope: scope.to_string(),
                replacement: replacement.map(str::to_string),
            }
        }
        Self {
            extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            exclude: vec![
                RULESET_FILE.to_string(),
                "target/**".to_string(),
                ".git/**".to_string(),
            ],
            forbidden: vec![
                term(r"\bSUBSYSTEMS\b", "**/*", Some("SYSTEMS")),
                term(r"\bQBIT\b", "**/*", Some("QB")),
                term(
                    r"(?i)\bquantum[- ]only\b",
                    "**/*.md",
                    Some("quantum with classical fallback"),
                ),
                term(r"\bPARTS\b", "**/*", Some("COMPONENTS")),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesetMeta {
    pub version: String,
    pub program: String,
}

impl Default for RulesetMeta {
    fn default() -> Self {
        Self {
            version: DEFAULT_RULESET_VERSION.to_string(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    pub ruleset: RulesetMeta,
    pub tree: TreeShape,
    pub scan: ScanConfig,
    /// File this ruleset was read from; `None` for the built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl RuleSet {
    pub fn from_toml_str(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut rules = Self::from_toml_str(&text, &path.display().to_string())?;
        rules.source = Some(path.to_path_buf());
        Ok(rules)
    }

    /// Scan exclusions for a tree at `root`: the configured globs plus the
    /// root-relative path of this ruleset's own file when it lies inside
    /// the tree.
    pub fn scan_excludes(&self, root: &Path) -> Vec<String> {
        let mut out = self.scan.effective_excludes();
        if let Some(rel) = self.source.as_deref().and_then(|source| relative_to(source, root))
            && !out.contains(&rel)
        {
            out.push(rel);
        }
        out
    }

    /// `<root>/asit.toml` if present, else the defaults.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(RULESET_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading ruleset");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let rel = path.strip_prefix(&root).ok()?;
    let text = rel
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!text.is_empty()).then(|| glob::Pattern::escape(&text))
}
