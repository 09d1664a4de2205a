use asit_kernel::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("tree root {path} is not a directory")]
    RootMissing { path: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that stop a whole-tree run before any checking happens.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
