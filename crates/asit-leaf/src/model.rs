//! Leaf model: kind tag, identity scope, and the documents that make it up.

use crate::error::LeafLoadError;
use asit_kernel::LeafKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const LEAF_DOCUMENT: &str = "leaf.json";
pub const CONTRACT_DOCUMENT: &str = "contract.json";
pub const IDENTITY_PROFILE_DOCUMENT: &str = "identity_profile.json";
pub const FEDERATION_DOCUMENT: &str = "federation.json";
pub const COALITION_DOCUMENT: &str = "coalition.json";
pub const ORCHESTRATION_DOCUMENT: &str = "orchestration.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> DocumentSpec {
    DocumentSpec {
        name,
        required: true,
    }
}

/// Documents a leaf of `kind` is made of, in check order.
pub fn documents(kind: LeafKind) -> &'static [DocumentSpec] {
    const SINGLE_LEAF: &[DocumentSpec] = &[required(LEAF_DOCUMENT)];
    const UNIT_ELEMENT: &[DocumentSpec] =
        &[required(CONTRACT_DOCUMENT), required(IDENTITY_PROFILE_DOCUMENT)];
    const FEDERATION_ELEMENT: &[DocumentSpec] = &[
        required(FEDERATION_DOCUMENT),
        DocumentSpec {
            name: COALITION_DOCUMENT,
            required: false,
        },
    ];
    const SOLVER_ELEMENT: &[DocumentSpec] = &[required(ORCHESTRATION_DOCUMENT)];

    match kind {
        LeafKind::ClassicalBit | LeafKind::QuantumBit | LeafKind::ForwardWave => SINGLE_LEAF,
        LeafKind::UnitElement => UNIT_ELEMENT,
        LeafKind::FederationElement => FEDERATION_ELEMENT,
        LeafKind::SolverElement => SOLVER_ELEMENT,
    }
}

/// Program/domain/layer tuple identity strings are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafScope {
    pub program: String,
    pub domain: String,
    pub layer: String,
}

impl LeafScope {
    pub fn new(
        program: impl Into<String>,
        domain: impl Into<String>,
        layer: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            domain: domain.into(),
            layer: layer.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub kind: LeafKind,
    pub scope: LeafScope,
    /// Display location, relative to the tree root (`IIS/BITS/CB`).
    pub location: String,
    /// Document name → parsed content. Absent documents are simply missing.
    pub documents: BTreeMap<String, Value>,
}

impl Leaf {
    pub fn new(kind: LeafKind, scope: LeafScope, location: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            location: location.into(),
            documents: BTreeMap::new(),
        }
    }

    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.documents.insert(name.into(), document);
        self
    }

    pub fn document(&self, name: &str) -> Option<&Value> {
        self.documents.get(name)
    }

    pub fn document_location(&self, name: &str) -> String {
        if self.location.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.location)
        }
    }

    /// Read the documents of `kind` that exist under `dir`.
    pub fn load(
        dir: &Path,
        kind: LeafKind,
        scope: LeafScope,
        location: impl Into<String>,
    ) -> Result<Self, LeafLoadError> {
        let mut leaf = Self::new(kind, scope, location);
        for spec in documents(kind) {
            let path = dir.join(spec.name);
            if !path.is_file() {
                continue;
            }
            let display = leaf.document_location(spec.name);
            let text = std::fs::read_to_string(&path).map_err(|err| LeafLoadError::Io {
                path: display.clone(),
                message: err.to_string(),
            })?;
            let document: Value =
                serde_json::from_str(&text).map_err(|err| LeafLoadError::InvalidJson {
                    path: display.clone(),
                    message: err.to_string(),
                })?;
            if !document.is_object() {
                return Err(LeafLoadError::RootNotObject { path: display });
            }
            leaf.documents.insert(spec.name.to_string(), document);
        }
        tracing::trace!(
            location = %leaf.location,
            kind = %kind,
            documents = leaf.documents.len(),
            "leaf loaded"
        );
        Ok(leaf)
    }
}

/// A leaf still on disk, to be loaded and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafTarget {
    pub dir: PathBuf,
    pub kind: LeafKind,
    pub scope: LeafScope,
    pub location: String,
}

impl LeafTarget {
    pub fn load(&self) -> Result<Leaf, LeafLoadError> {
        Leaf::load(&self.dir, self.kind, self.scope.clone(), self.location.clone())
    }
}
