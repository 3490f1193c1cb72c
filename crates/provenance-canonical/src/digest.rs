use regex::Regex;
use serde::Serialize;
use sha2::{Digest as Sha2Digest, Sha256};
use std::sync::OnceLock;

use crate::canonicalizer::{CanonicalizationError, Canonicalizer};

/// Length of a SHA-256 digest rendered as hex.
pub const SHA256_HEX_LEN: usize = 64;

fn hex64_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-f]{64}$").expect("invalid regex"))
}

/// Raw SHA-256 of `bytes`.
pub fn sha256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(sha256(bytes))
}

/// SHA-256 (lowercase hex) over the canonical bytes of `value`.
///
/// Used for policy and golden-digest self-checks where two builds must agree
/// on the digest of the same logical record.
pub fn canonical_digest<T: Serialize + ?Sized>(
    value: &T,
    canonicalizer: &Canonicalizer,
) -> Result<String, CanonicalizationError> {
    let bytes = canonicalizer.canonicalize(value)?;
    Ok(sha256_hex(bytes))
}

/// Returns `true` for exactly 64 lowercase hex characters.
pub fn is_sha256_hex(value: &str) -> bool {
    hex64_pattern().is_match(value)
}
