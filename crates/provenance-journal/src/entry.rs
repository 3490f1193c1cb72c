use serde::{Deserialize, Serialize};

/// Current signing schema version written by [`SignedAuditLog`](crate::SignedAuditLog).
pub const SIGNING_SCHEMA_VERSION: u32 = 1;

/// Signing schema versions [`verify_or_throw`](crate::verify_or_throw) accepts.
pub const SUPPORTED_SIGNING_SCHEMA_VERSIONS: &[u32] = &[SIGNING_SCHEMA_VERSION];

/// One line of a signed audit log.
///
/// For entry `i > 0`, `prev_signature` equals entry `i - 1`'s `signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuditEntry {
    /// Version of the canonical payload layout.
    pub signing_schema_version: u32,
    /// `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub timestamp: String,
    /// Event type, `^[a-z][a-z0-9_.]{0,63}$`.
    pub event_type: String,
    /// Event details as a single-line JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_json: Option<String>,
    /// Version of the schema `details_json` follows.
    pub details_schema_version: String,
    /// Base64 raw Ed25519 public key.
    pub public_key: String,
    /// Base64 Ed25519 signature over the canonical payload.
    pub signature: String,
    /// Previous entry's signature; `None` only for the first entry.
    pub prev_signature: Option<String>,
    /// Lowercase hex SHA-256 of the canonical payload.
    pub payload_hash: String,
}
