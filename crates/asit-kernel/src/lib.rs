//! # ASIT Kernel
//!
//! Shared mechanics of the compliance engine: every validator reports
//! [`Issue`]s through a [`ValidationContext`], and every governed transition
//! is captured as a signed [`Anchor`] whose hash is computed over the
//! canonical byte form of its substantive fields.
//!
//! ## Architecture
//!
//! ```text
//! canonical   ← order-independent byte encoding of JSON records
//!     │
//! digest      ← SHA-256 over canonical bytes
//!     │
//! anchor      ← build / sign / verify evidence anchors
//!
//! issue       ← Issue, ValidationReport, rule identifiers
//! schema      ← SchemaEngine seam for required-field checks
//! ruleset     ← tree shape, scan policy, program identity (asit.toml)
//! context     ← explicit per-run context and issue sinks
//! parallel    ← order-preserving fan-out for independent checks
//! ```

pub mod anchor;
pub mod canonical;
pub mod context;
pub mod digest;
pub mod error;
pub mod issue;
pub mod parallel;
pub mod ruleset;
pub mod schema;

pub use anchor::{
    Anchor, AnchorEvent, AnchorSignature, AnchorSigner, AnchorVerifier, Ed25519AnchorSigner,
    Ed25519AnchorVerifier, EventPayload, ModeTransition, build_anchor, integrity_issue,
    is_anchor_valid, verify_anchor,
};
pub use canonical::{canonicalize, canonicalize_serialize, canonicalize_str};
pub use context::{AnnotationSink, CollectingSink, IssueSink, NullSink, ValidationContext};
pub use digest::{ContentDigest, hash_record};
pub use error::{AnchorError, ConfigError, EncodingError, IntegrityError, KeyError};
pub use issue::{Issue, IssueClass, ValidationReport, rule};
pub use ruleset::{
    ForbiddenTerm, LayerSpec, LeafKind, LeafSpec, NodeType, RULESET_FILE, RuleSet, ScanConfig,
    TreeShape,
};
pub use schema::{SchemaEngine, SchemaViolation, StructuralSchemaEngine, ViolationKind};
