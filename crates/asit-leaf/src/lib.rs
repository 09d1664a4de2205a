//! # ASIT Leaf
//!
//! Validation of individual leaves. A [`Leaf`] carries an explicit kind tag
//! taken from the tree shape; [`validate_leaf`] selects the checks by that
//! tag, never by file name, and reports in a fixed order:
//!
//! 1. required documents present, fields present and well-typed (schema gate)
//! 2. scoped identity string and optional `kind` tag
//! 3. kind-specific semantic rules
//!
//! Federation (FE) and solver (SE) leaves are handed to `asit-federation`.

pub mod error;
pub mod model;
pub mod rules;
pub mod schemas;
pub mod validate;

pub use error::LeafLoadError;
pub use model::{DocumentSpec, Leaf, LeafScope, LeafTarget, documents};
pub use schemas::{identity_field, schema_for};
pub use validate::{
    identity_pattern, validate_leaf, validate_leaves, validate_target, validate_targets,
};
