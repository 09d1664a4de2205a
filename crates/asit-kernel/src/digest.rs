//! SHA-256 content digests over canonical bytes.

use crate::canonical::canonicalize;
use crate::error::{EncodingError, IntegrityError};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit digest of a record's canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest of raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Digest of a record's canonical bytes.
    pub fn of_record(record: &Value) -> Result<Self, EncodingError> {
        Ok(Self::of_bytes(&canonicalize(record)?))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Strict parse: exactly 64 lowercase hex characters.
    pub fn from_hex(text: &str) -> Result<Self, IntegrityError> {
        let well_formed = text.len() == 64
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(IntegrityError::MalformedHash(text.to_string()));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(text, &mut out)
            .map_err(|_| IntegrityError::MalformedHash(text.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hex digest of a record's canonical form.
pub fn hash_record(record: &Value) -> Result<String, EncodingError> {
    Ok(ContentDigest::of_record(record)?.to_hex())
}
