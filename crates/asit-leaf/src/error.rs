use thiserror::Error;

/// A leaf document could not be turned into JSON. Scoped to one leaf.
#[derive(Debug, Error)]
pub enum LeafLoadError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid JSON at {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("{path}: root must be an object")]
    RootNotObject { path: String },
}

impl LeafLoadError {
    /// Location of the offending document.
    pub fn path(&self) -> &str {
        match self {
            LeafLoadError::Io { path, .. }
            | LeafLoadError::InvalidJson { path, .. }
            | LeafLoadError::RootNotObject { path } => path,
        }
    }
}
