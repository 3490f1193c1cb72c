//! Offline verification of a signed audit log.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use provenance_canonical::sha256_hex;

use crate::entry::{SignedAuditEntry, SUPPORTED_SIGNING_SCHEMA_VERSIONS};
use crate::errors::VerificationError;
use crate::payload::PayloadFields;

const SIGNATURE_PREFIX_CHARS: usize = 8;

/// Verifies chain linkage, payload hashes and signatures of `entries` in order.
///
/// Stops at the first entry that fails; nothing after a broken link is trusted.
///
/// # Errors
///
/// Returns the [`VerificationError`] for the first failing entry.
pub fn verify_or_throw(entries: &[SignedAuditEntry]) -> Result<(), VerificationError> {
    let mut previous: Option<&str> = None;
    for (entry_index, entry) in entries.iter().enumerate() {
        verify_entry(entry_index, entry, previous)?;
        previous = Some(&entry.signature);
    }
    Ok(())
}

/// `true` when [`verify_or_throw`] succeeds.
pub fn verify(entries: &[SignedAuditEntry]) -> bool {
    verify_or_throw(entries).is_ok()
}

fn verify_entry(
    entry_index: usize,
    entry: &SignedAuditEntry,
    previous: Option<&str>,
) -> Result<(), VerificationError> {
    if !SUPPORTED_SIGNING_SCHEMA_VERSIONS.contains(&entry.signing_schema_version) {
        return Err(VerificationError::UnsupportedSchemaVersion {
            entry_index,
            version: entry.signing_schema_version,
        });
    }

    if entry.prev_signature.as_deref() != previous {
        return Err(VerificationError::ChainBroken {
            entry_index,
            expected: prefix(previous),
            actual: prefix(entry.prev_signature.as_deref()),
        });
    }

    // Renders like an absent value, so only `None` may stand for "no details".
    if entry.details_json.as_deref() == Some("") {
        return Err(VerificationError::InvalidEncoding {
            entry_index,
            field: "detailsJson",
        });
    }

    let public_key: [u8; 32] = decode_fixed(&entry.public_key).ok_or(
        VerificationError::InvalidEncoding {
            entry_index,
            field: "publicKey",
        },
    )?;
    let signature: [u8; 64] = decode_fixed(&entry.signature).ok_or(
        VerificationError::InvalidEncoding {
            entry_index,
            field: "signature",
        },
    )?;

    let payload = PayloadFields::from_entry(entry, &public_key).canonical_payload();
    if sha256_hex(payload.as_bytes()) != entry.payload_hash {
        return Err(VerificationError::HashMismatch { entry_index });
    }

    let verifying_key = VerifyingKey::from_bytes(&public_key)
        .map_err(|_| VerificationError::InvalidPublicKey { entry_index })?;
    verifying_key
        .verify(payload.as_bytes(), &Signature::from_bytes(&signature))
        .map_err(|_| VerificationError::InvalidSignature { entry_index })
}

fn decode_fixed<const N: usize>(encoded: &str) -> Option<[u8; N]> {
    BASE64.decode(encoded).ok()?.try_into().ok()
}

fn prefix(signature: Option<&str>) -> String {
    match signature {
        Some(sig) => sig.chars().take(SIGNATURE_PREFIX_CHARS).collect(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_verifies() {
        assert!(verify(&[]));
    }

    #[test]
    fn prefixes_are_bounded() {
        assert_eq!(prefix(Some("ABCDEFGHIJKL")), "ABCDEFGH");
        assert_eq!(prefix(Some("AB")), "AB");
        assert_eq!(prefix(None), "none");
    }

    #[test]
    fn wrong_length_key_is_an_encoding_error() {
        assert_eq!(decode_fixed::<32>(&BASE64.encode([0u8; 31])), None);
        assert_eq!(decode_fixed::<32>("not base64!"), None);
        assert_eq!(decode_fixed::<4>(&BASE64.encode([1u8; 4])), Some([1u8; 4]));
    }
}
