//! # ASIT Tree
//!
//! The domain → layer → leaf tree, checked against a static [`TreeShape`]:
//!
//! - [`snapshot`]: one filesystem pass producing an immutable [`TreeSnapshot`]
//! - [`structure`]: presence of every domain, layer and leaf node
//! - [`scan`]: retired terminology as `(regex, glob)` data
//! - [`run`]: the whole-tree run, shape first, then every present leaf
//!
//! [`TreeShape`]: asit_kernel::TreeShape

pub mod error;
pub mod run;
pub mod scan;
pub mod snapshot;
pub mod structure;

#[cfg(test)]
mod testing;

pub use error::{RunError, SnapshotError};
pub use run::{leaf_targets, run_compliance};
pub use scan::{ForbiddenScanner, TermHit};
pub use snapshot::{DomainSnapshot, LayerSnapshot, TextFile, TreeSnapshot};
pub use structure::validate_tree;
