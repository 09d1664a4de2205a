//! Evidence anchors: signed, hash-verified records of governed transitions.
//!
//! An anchor is created once when a governed transition occurs (mode change,
//! QB acceptance, crew acceptance) and is immutable afterwards. Audit and
//! replay tooling recomputes the content hash over the substantive fields
//! and rejects the anchor on any mismatch.
//!
//! Hashed fields: `utcs_code`, `timestamp_utc`, `event`, `trace_refs`.
//! `content_hash_sha256` and `signature` are excluded.

use crate::canonical::{finite_number, to_record};
use crate::digest::ContentDigest;
use crate::error::{AnchorError, EncodingError, IntegrityError, KeyError};
use crate::issue::{Issue, IssueClass, rule};
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const ED25519_SCHEME: &str = "ed25519";

/// Signer capability supplied by the caller.
pub trait AnchorSigner {
    /// Tag recorded alongside the signature value.
    fn scheme(&self) -> &str;

    /// Sign the content digest. Deterministic signers make anchors replayable.
    fn sign(&self, digest: &ContentDigest) -> String;
}

/// Verification counterpart of [`AnchorSigner`].
pub trait AnchorVerifier {
    fn scheme(&self) -> &str;

    fn verify(&self, digest: &ContentDigest, signature: &str) -> bool;
}

/// Ed25519 signer over the 32 digest bytes.
pub struct Ed25519AnchorSigner {
    key: SigningKey,
}

impl Ed25519AnchorSigner {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Seed given as 64 hex characters.
    pub fn from_seed_hex(text: &str) -> Result<Self, KeyError> {
        let seed: [u8; 32] = decode_fixed(text.trim())?;
        Ok(Self::from_seed(&seed))
    }

    pub fn verifier(&self) -> Ed25519AnchorVerifier {
        Ed25519AnchorVerifier {
            key: self.key.verifying_key(),
        }
    }
}

impl AnchorSigner for Ed25519AnchorSigner {
    fn scheme(&self) -> &str {
        ED25519_SCHEME
    }

    fn sign(&self, digest: &ContentDigest) -> String {
        hex::encode(self.key.sign(digest.as_bytes()).to_bytes())
    }
}

/// Ed25519 verifier holding a public key.
#[derive(Debug, Clone)]
pub struct Ed25519AnchorVerifier {
    key: VerifyingKey,
}

impl Ed25519AnchorVerifier {
    pub fn from_public_hex(text: &str) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = decode_fixed(text.trim())?;
        let key =
            VerifyingKey::from_bytes(&bytes).map_err(|err| KeyError::Invalid(err.to_string()))?;
        Ok(Self { key })
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

impl AnchorVerifier for Ed25519AnchorVerifier {
    fn scheme(&self) -> &str {
        ED25519_SCHEME
    }

    fn verify(&self, digest: &ContentDigest, signature: &str) -> bool {
        let Ok(bytes) = decode_fixed::<64>(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        self.key.verify_strict(digest.as_bytes(), &signature).is_ok()
    }
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], KeyError> {
    let bytes = hex::decode(text).map_err(|err| KeyError::Hex(err.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| KeyError::Length {
        expected: N,
        actual,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: String,
    pub to: String,
}

/// Typed event payload of an anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub mode_transition: Option<ModeTransition>,
    pub reasons: Vec<String>,
    pub limits: BTreeMap<String, f64>,
    pub attributes: Map<String, Value>,
}

impl EventPayload {
    /// JSON record of the payload. Non-finite limits are rejected.
    pub fn to_record(&self) -> Result<Value, EncodingError> {
        let mut limits = Map::new();
        for (name, value) in &self.limits {
            limits.insert(name.clone(), finite_number(&format!("event.limits.{name}"), *value)?);
        }
        let mut record = Map::new();
        if let Some(transition) = &self.mode_transition {
            record.insert("mode_transition".to_string(), to_record(transition)?);
        }
        record.insert("reasons".to_string(), to_record(&self.reasons)?);
        record.insert("limits".to_string(), Value::Object(limits));
        if !self.attributes.is_empty() {
            record.insert(
                "attributes".to_string(),
                Value::Object(self.attributes.clone()),
            );
        }
        Ok(Value::Object(record))
    }
}

/// A governed transition about to be anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorEvent {
    pub utcs_code: String,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnchorSignature {
    pub scheme: String,
    pub value: String,
}

/// Persisted evidence anchor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anchor {
    pub utcs_code: String,
    pub timestamp_utc: String,
    pub event: Value,
    pub trace_refs: Vec<String>,
    pub content_hash_sha256: String,
    pub signature: AnchorSignature,
}

impl Anchor {
    /// Digest over the substantive fields, as received.
    pub fn recompute_digest(&self) -> Result<ContentDigest, EncodingError> {
        ContentDigest::of_record(&substantive_record(
            &self.utcs_code,
            &self.timestamp_utc,
            &self.event,
            &self.trace_refs,
        ))
    }
}

/// RFC 3339 UTC with millisecond precision and `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn substantive_record(
    utcs_code: &str,
    timestamp_utc: &str,
    event: &Value,
    trace_refs: &[String],
) -> Value {
    json!({
        "utcs_code": utcs_code,
        "timestamp_utc": timestamp_utc,
        "event": event,
        "trace_refs": trace_refs,
    })
}

/// Build and sign an anchor. Identical inputs and a deterministic signer
/// yield byte-identical anchors.
pub fn build_anchor(
    event: &AnchorEvent,
    trace_refs: &[String],
    signer: &dyn AnchorSigner,
) -> Result<Anchor, AnchorError> {
    let utcs_code = event.utcs_code.trim();
    if utcs_code.is_empty() {
        return Err(AnchorError::EmptyCode);
    }
    if trace_refs.is_empty() {
        return Err(AnchorError::NoTraceRefs);
    }
    let timestamp_utc = format_timestamp(&event.timestamp);
    let payload = event.payload.to_record()?;
    let trace_refs = trace_refs.to_vec();

    let digest = ContentDigest::of_record(&substantive_record(
        utcs_code,
        &timestamp_utc,
        &payload,
        &trace_refs,
    ))?;
    let signature = AnchorSignature {
        scheme: signer.scheme().to_string(),
        value: signer.sign(&digest),
    };
    tracing::debug!(utcs_code, content_hash = %digest, "anchor built");

    Ok(Anchor {
        utcs_code: utcs_code.to_string(),
        timestamp_utc,
        event: payload,
        trace_refs,
        content_hash_sha256: digest.to_hex(),
        signature,
    })
}

/// Verify an anchor. Fails closed on the first mismatch.
pub fn verify_anchor(
    anchor: &Anchor,
    verifier: &dyn AnchorVerifier,
) -> Result<ContentDigest, IntegrityError> {
    let recorded = ContentDigest::from_hex(&anchor.content_hash_sha256)?;

    let parsed = DateTime::parse_from_rfc3339(&anchor.timestamp_utc).map_err(|err| {
        IntegrityError::MalformedField {
            field: "timestamp_utc",
            reason: err.to_string(),
        }
    })?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(IntegrityError::MalformedField {
            field: "timestamp_utc",
            reason: "timestamp must be UTC".to_string(),
        });
    }

    let recomputed = anchor.recompute_digest()?;
    if recomputed != recorded {
        tracing::debug!(utcs_code = %anchor.utcs_code, "anchor hash mismatch");
        return Err(IntegrityError::HashMismatch {
            recorded: recorded.to_hex(),
            recomputed: recomputed.to_hex(),
        });
    }

    if anchor.signature.scheme != verifier.scheme() {
        return Err(IntegrityError::SchemeMismatch {
            expected: verifier.scheme().to_string(),
            actual: anchor.signature.scheme.clone(),
        });
    }
    if !verifier.verify(&recorded, &anchor.signature.value) {
        tracing::debug!(utcs_code = %anchor.utcs_code, "anchor signature rejected");
        return Err(IntegrityError::BadSignature);
    }
    Ok(recorded)
}

/// Boolean form of [`verify_anchor`].
pub fn is_anchor_valid(anchor: &Anchor, verifier: &dyn AnchorVerifier) -> bool {
    verify_anchor(anchor, verifier).is_ok()
}

/// Issue for a failed verification, located at the anchor's file.
pub fn integrity_issue(location: impl Into<String>, err: &IntegrityError) -> Issue {
    let (class, rule) = match err {
        IntegrityError::Encoding(_) => (IssueClass::Encoding, rule::ANCHOR_ENCODING),
        _ => (IssueClass::Integrity, rule::ANCHOR_INTEGRITY),
    };
    Issue::new(class, rule, location, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> Ed25519AnchorSigner {
        Ed25519AnchorSigner::from_seed(&[7u8; 32])
    }

    fn event() -> AnchorEvent {
        let mut limits = BTreeMap::new();
        limits.insert("max_bank_deg".to_string(), 25.0);
        limits.insert("min_margin".to_string(), 0.15);
        AnchorEvent {
            utcs_code: "DET-MODE-TRANSITION".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            payload: EventPayload {
                mode_transition: Some(ModeTransition {
                    from: "nominal".to_string(),
                    to: "degraded".to_string(),
                }),
                reasons: vec!["qb_fallback_engaged".to_string()],
                limits,
                attributes: Map::new(),
            },
        }
    }

    fn refs() -> Vec<String> {
        vec!["telemetry://fdr/2025-03-14/seg-0042".to_string()]
    }

    #[test]
    fn built_anchor_verifies() {
        let signer = signer();
        let anchor = build_anchor(&event(), &refs(), &signer).unwrap();
        assert_eq!(anchor.timestamp_utc, "2025-03-14T09:26:53.000Z");
        assert_eq!(anchor.content_hash_sha256.len(), 64);
        assert_eq!(anchor.signature.scheme, ED25519_SCHEME);
        assert!(is_anchor_valid(&anchor, &signer.verifier()));
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let a = build_anchor(&event(), &refs(), &signer()).unwrap();
        let b = build_anchor(&event(), &refs(), &signer()).unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn mutating_any_field_breaks_verification() {
        let signer = signer();
        let verifier = signer.verifier();
        let anchor = build_anchor(&event(), &refs(), &signer).unwrap();

        let mut m = anchor.clone();
        m.utcs_code = "DET-OTHER".to_string();
        assert!(!is_anchor_valid(&m, &verifier));

        let mut m = anchor.clone();
        m.timestamp_utc = "2025-03-14T09:26:54.000Z".to_string();
        assert!(!is_anchor_valid(&m, &verifier));

        let mut m = anchor.clone();
        m.event["limits"]["max_bank_deg"] = json!(30);
        assert!(!is_anchor_valid(&m, &verifier));

        let mut m = anchor.clone();
        m.trace_refs.push("telemetry://extra".to_string());
        assert!(!is_anchor_valid(&m, &verifier));

        let mut m = anchor.clone();
        m.signature.value.replace_range(0..2, "00");
        if m.signature.value != anchor.signature.value {
            assert!(!is_anchor_valid(&m, &verifier));
        }

        let mut m = anchor;
        m.signature.scheme = "hmac-sha256".to_string();
        assert!(matches!(
            verify_anchor(&m, &verifier),
            Err(IntegrityError::SchemeMismatch { .. })
        ));
    }

    #[test]
    fn flipped_hash_character_is_rejected() {
        let signer = signer();
        let mut anchor = build_anchor(&event(), &refs(), &signer).unwrap();
        let first = anchor.content_hash_sha256.remove(0);
        let flipped = if first == '0' { '1' } else { '0' };
        anchor.content_hash_sha256.insert(0, flipped);
        assert!(matches!(
            verify_anchor(&anchor, &signer.verifier()),
            Err(IntegrityError::HashMismatch { .. })
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let anchor = build_anchor(&event(), &refs(), &signer()).unwrap();
        let other = Ed25519AnchorSigner::from_seed(&[9u8; 32]).verifier();
        assert_eq!(
            verify_anchor(&anchor, &other),
            Err(IntegrityError::BadSignature)
        );
    }

    #[test]
    fn non_finite_limit_is_an_encoding_error() {
        let mut event = event();
        event.payload.limits.insert("bad".to_string(), f64::NAN);
        assert!(matches!(
            build_anchor(&event, &refs(), &signer()),
            Err(AnchorError::Encoding(EncodingError::NonFinite { .. }))
        ));
    }

    #[test]
    fn build_requires_code_and_trace_refs() {
        assert_eq!(
            build_anchor(&event(), &[], &signer()),
            Err(AnchorError::NoTraceRefs)
        );
        let mut blank = event();
        blank.utcs_code = "  ".to_string();
        assert_eq!(
            build_anchor(&blank, &refs(), &signer()),
            Err(AnchorError::EmptyCode)
        );
    }

    #[test]
    fn keys_round_trip_through_hex() {
        let signer = Ed25519AnchorSigner::from_seed_hex(&"07".repeat(32)).unwrap();
        let public = signer.verifier().public_hex();
        let verifier = Ed25519AnchorVerifier::from_public_hex(&public).unwrap();
        let anchor = build_anchor(&event(), &refs(), &signer).unwrap();
        assert!(is_anchor_valid(&anchor, &verifier));
        assert_eq!(
            Ed25519AnchorSigner::from_seed_hex("abcd").err(),
            Some(KeyError::Length {
                expected: 32,
                actual: 2
            })
        );
    }
}
