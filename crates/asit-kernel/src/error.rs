//! Error types for kernel operations.
//!
//! Compliance defects are never errors: they are [`Issue`](crate::Issue)
//! values accumulated by the validators. The types here cover the
//! environment and integrity failures that make further checking
//! meaningless.

/// A value cannot be represented in the canonical interchange form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A float was NaN or infinite.
    #[error("non-finite number at {path}")]
    NonFinite { path: String },

    /// A record could not be turned into a JSON value (e.g. non-string map keys).
    #[error("unrepresentable value: {0}")]
    Unrepresentable(String),

    /// The record nests deeper than the canonicalizer accepts.
    #[error("nesting deeper than {max_depth} levels")]
    MaxDepthExceeded { max_depth: usize },

    /// Input text was not valid JSON.
    #[error("invalid JSON: {0}")]
    Parse(String),
}

/// An evidence anchor failed verification. Verification is fail-closed:
/// any of these means the whole anchor is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("content hash is not 64 lowercase hex characters: {0:?}")]
    MalformedHash(String),

    #[error("content hash mismatch: recorded {recorded}, recomputed {recomputed}")]
    HashMismatch { recorded: String, recomputed: String },

    #[error("signature scheme {actual:?} does not match verifier scheme {expected:?}")]
    SchemeMismatch { expected: String, actual: String },

    #[error("signature does not verify over content hash")]
    BadSignature,

    #[error("anchor field {field} is malformed: {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("anchor is not canonicalizable: {0}")]
    Encoding(#[from] EncodingError),
}

/// Failure while building an anchor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("utcs code must be non-empty")]
    EmptyCode,

    #[error("at least one trace reference is required")]
    NoTraceRefs,

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Key material could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key is not valid hex: {0}")]
    Hex(String),

    #[error("key must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("key rejected: {0}")]
    Invalid(String),
}

/// Failure loading a ruleset file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read ruleset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ruleset toml at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid forbidden-term pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
}
