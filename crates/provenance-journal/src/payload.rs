//! Canonical signing payload and the input checks that guard it.
//!
//! ```text
//! v=<version>|ts=<timestamp>|type_len=<N>|type=<eventType>|dsv_len=<M>|dsv=<dsv>
//! |details_len=<K>|details=<detailsJson or empty>|prev_len=<L>|prev=<prevSignature or empty>
//! |pkhash_len=<P>|pkhash=<sha256 hex of raw public key>
//! ```
//!
//! Lengths count UTF-8 bytes. The public key enters through its hash, binding
//! the payload to one signer.

use provenance_canonical::sha256_hex;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::entry::SignedAuditEntry;
use crate::errors::JournalError;

fn event_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_.]{0,63}$").expect("invalid regex"))
}

fn details_schema_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,32}$").expect("invalid regex"))
}

/// Fields that make up one signing payload.
#[derive(Debug, Clone, Copy)]
pub struct PayloadFields<'a> {
    /// Signing schema version.
    pub version: u32,
    /// Entry timestamp.
    pub timestamp: &'a str,
    /// Event type.
    pub event_type: &'a str,
    /// Details schema version.
    pub details_schema_version: &'a str,
    /// Details JSON, if any.
    pub details_json: Option<&'a str>,
    /// Previous signature, if any.
    pub prev_signature: Option<&'a str>,
    /// Raw public key bytes.
    pub public_key: &'a [u8],
}

impl<'a> PayloadFields<'a> {
    /// Payload fields recorded in `entry`, paired with its decoded public key.
    pub fn from_entry(entry: &'a SignedAuditEntry, public_key: &'a [u8]) -> Self {
        Self {
            version: entry.signing_schema_version,
            timestamp: &entry.timestamp,
            event_type: &entry.event_type,
            details_schema_version: &entry.details_schema_version,
            details_json: entry.details_json.as_deref(),
            prev_signature: entry.prev_signature.as_deref(),
            public_key,
        }
    }

    /// Renders the length-prefixed payload.
    pub fn canonical_payload(&self) -> String {
        let details = self.details_json.unwrap_or("");
        let prev = self.prev_signature.unwrap_or("");
        let pkhash = sha256_hex(self.public_key);

        let mut out = String::with_capacity(160 + details.len() + prev.len());
        let _ = write!(out, "v={}|ts={}", self.version, self.timestamp);
        push_field(&mut out, "type", self.event_type);
        push_field(&mut out, "dsv", self.details_schema_version);
        push_field(&mut out, "details", details);
        push_field(&mut out, "prev", prev);
        push_field(&mut out, "pkhash", &pkhash);
        out
    }
}

fn push_field(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, "|{name}_len={}|{name}={value}", value.len());
}

/// Rejects inputs before any payload is built or anything is written.
pub(crate) fn validate_append(
    event_type: &str,
    details_json: Option<&str>,
    details_schema_version: &str,
) -> Result<(), JournalError> {
    validate_event_type(event_type)?;
    if !details_schema_version_pattern().is_match(details_schema_version) {
        return Err(JournalError::InvalidInput {
            field: "detailsSchemaVersion",
            reason: format!("{details_schema_version:?} does not match ^[A-Za-z0-9._-]{{1,32}}$"),
        });
    }
    if let Some(details) = details_json {
        if details.contains(['\n', '\r']) {
            return Err(JournalError::InvalidInput {
                field: "detailsJson",
                reason: "contains a raw newline".to_string(),
            });
        }
        serde_json::from_str::<serde_json::Value>(details).map_err(|err| {
            JournalError::InvalidInput {
                field: "detailsJson",
                reason: err.to_string(),
            }
        })?;
    }
    Ok(())
}

pub(crate) fn validate_event_type(event_type: &str) -> Result<(), JournalError> {
    if !event_type_pattern().is_match(event_type) {
        return Err(JournalError::InvalidInput {
            field: "eventType",
            reason: format!("{event_type:?} does not match ^[a-z][a-z0-9_.]{{0,63}}$"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(details: Option<&'a str>, prev: Option<&'a str>) -> PayloadFields<'a> {
        PayloadFields {
            version: 1,
            timestamp: "2024-01-01T00:00:00.000Z",
            event_type: "key.rotated",
            details_schema_version: "1",
            details_json: details,
            prev_signature: prev,
            public_key: &[0u8; 32],
        }
    }

    #[test]
    fn layout_is_length_prefixed() {
        let payload = fields(Some(r#"{"a":"|"}"#), None).canonical_payload();
        let pkhash = sha256_hex([0u8; 32]);
        assert_eq!(
            payload,
            format!(
                "v=1|ts=2024-01-01T00:00:00.000Z|type_len=11|type=key.rotated|dsv_len=1|dsv=1\
                 |details_len=9|details={{\"a\":\"|\"}}|prev_len=0|prev=|pkhash_len=64|pkhash={pkhash}"
            )
        );
    }

    #[test]
    fn lengths_count_bytes() {
        let payload = fields(Some(r#""é""#), Some("AAAA")).canonical_payload();
        assert!(payload.contains("|details_len=4|details=\"é\"|"));
        assert!(payload.contains("|prev_len=4|prev=AAAA|"));
    }

    #[test]
    fn absent_and_empty_details_render_alike() {
        // Only detailsJson = None is ever written; validation rejects "" as JSON.
        assert_eq!(
            fields(None, None).canonical_payload(),
            fields(Some(""), None).canonical_payload()
        );
        assert!(validate_append("a", Some(""), "1").is_err());
    }

    #[test]
    fn rejects_delimiters_and_newlines() {
        assert!(validate_append("a|b", None, "1").is_err());
        assert!(validate_append("Upper", None, "1").is_err());
        assert!(validate_append("ok", None, "1|2").is_err());
        assert!(validate_append("ok", None, "").is_err());
        assert!(validate_append("ok", Some("{\n}"), "1").is_err());
        assert!(validate_append("ok", Some("{not json"), "1").is_err());
        assert!(validate_append("ok.event_1", Some(r#"{"k":[1,2]}"#), "v1.0-rc_2").is_ok());
    }
}
