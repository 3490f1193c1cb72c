//! Content-derived trace, scene and event identifiers.
//!
//! - `traceId = sha256hex("WMTRACE/v0.0.1|" || policyHash || "|" || pipelineVersion
//!   || "|" || canonicalizedInputs || "|" || canonicalJSON(paramsSummary))`
//! - `sceneId = sha256hex("WMSCENE/v0.0.1|" || sortedPaths.join(";"))`
//! - `eventId = "{traceId}:{index}"`
//!
//! `canonicalizedInputs` is the inputs sorted by path, each rendered as
//! `path|contentHashOrEmpty|byteSizeOrEmpty;`.
//!
//! Validation always precedes hashing and walks inputs in sorted order, so the
//! reported error for a given input set never depends on caller ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::canonicalizer::canonical_string_map;
use crate::digest::{is_sha256_hex, sha256_hex};

/// Domain prefix for trace identifiers.
pub const TRACE_DOMAIN: &str = "WMTRACE/v0.0.1";
/// Domain prefix for scene identifiers.
pub const SCENE_DOMAIN: &str = "WMSCENE/v0.0.1";
/// Highest event index accepted in an event ID.
pub const MAX_EVENT_INDEX: u64 = 1_000_000;
/// Longest input path accepted, in characters.
pub const MAX_PATH_CHARS: usize = 2048;
/// Characters that would make the pipe/semicolon hash preimage ambiguous.
pub const FORBIDDEN_CHARACTERS: [char; 5] = ['|', ';', '\n', '\r', '\t'];

/// One input consumed by a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    /// Logical path of the input.
    pub path: String,
    /// Optional SHA-256 (lowercase hex) of the input bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Optional size in bytes. Signed so that bad producers are caught, not wrapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<i64>,
}

impl InputDescriptor {
    /// Input known only by path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: None,
            byte_size: None,
        }
    }

    /// Attaches a content hash.
    pub fn with_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    /// Attaches a byte size.
    pub fn with_size(mut self, byte_size: i64) -> Self {
        self.byte_size = Some(byte_size);
        self
    }
}

/// Errors raised while validating identity inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// A required field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },
    /// A digest was not 64 lowercase hex characters.
    #[error("{field} is not a 64-character lowercase hex digest: {value:?}")]
    InvalidHash {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A field contained one of [`FORBIDDEN_CHARACTERS`].
    #[error("{field} contains forbidden character {character:?}: {value:?}")]
    ForbiddenCharacter {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
        /// First forbidden character found.
        character: char,
    },
    /// An input path exceeded [`MAX_PATH_CHARS`].
    #[error("input path exceeds {max} characters ({len})")]
    PathTooLong {
        /// Actual length in characters.
        len: usize,
        /// Maximum length.
        max: usize,
    },
    /// Two inputs shared a path.
    #[error("duplicate input path {0:?}")]
    DuplicatePath(String),
    /// An input declared a negative size.
    #[error("input {path:?} has negative byte size {size}")]
    NegativeSize {
        /// Input path.
        path: String,
        /// Declared size.
        size: i64,
    },
    /// An event index was outside `0..=MAX_EVENT_INDEX`.
    #[error("event index {0} out of range 0..=1000000")]
    IndexOutOfRange(u64),
    /// An event ID string did not have the `{traceId}:{index}` shape.
    #[error("malformed event id {value:?}: {reason}")]
    MalformedEventId {
        /// Offending value.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// Derives the trace identifier.
pub fn trace_id(
    policy_hash: &str,
    pipeline_version: &str,
    inputs: &[InputDescriptor],
    params_summary: &BTreeMap<String, String>,
) -> Result<String, IdentityError> {
    check_hash("policyHash", policy_hash)?;
    if pipeline_version.is_empty() {
        return Err(IdentityError::Empty {
            field: "pipelineVersion",
        });
    }
    let sorted = sorted_inputs(inputs);
    check_input_hashes(&sorted)?;
    check_forbidden("pipelineVersion", pipeline_version)?;
    check_paths(&sorted)?;
    check_sizes(&sorted)?;

    let mut preimage = String::new();
    preimage.push_str(TRACE_DOMAIN);
    preimage.push('|');
    preimage.push_str(policy_hash);
    preimage.push('|');
    preimage.push_str(pipeline_version);
    preimage.push('|');
    preimage.push_str(&canonicalized_inputs(&sorted));
    preimage.push('|');
    preimage.push_str(&canonical_string_map(params_summary));
    Ok(sha256_hex(preimage.as_bytes()))
}

/// Derives the scene identifier from input paths only.
pub fn scene_id(inputs: &[InputDescriptor]) -> Result<String, IdentityError> {
    let sorted = sorted_inputs(inputs);
    check_paths(&sorted)?;
    let paths: Vec<&str> = sorted.iter().map(|input| input.path.as_str()).collect();
    Ok(sha256_hex(format!("{}|{}", SCENE_DOMAIN, paths.join(";"))))
}

/// Formats `{traceId}:{index}`.
pub fn event_id(trace_id: &str, index: u64) -> Result<String, IdentityError> {
    check_hash("traceId", trace_id)?;
    if index > MAX_EVENT_INDEX {
        return Err(IdentityError::IndexOutOfRange(index));
    }
    Ok(format!("{}:{}", trace_id, index))
}

/// Splits an event ID into its trace ID and index.
///
/// Rejects leading zeros (other than `"0"` itself), signs, non-digits and
/// indices above [`MAX_EVENT_INDEX`].
pub fn parse_event_id(value: &str) -> Result<(&str, u64), IdentityError> {
    let malformed = |reason| IdentityError::MalformedEventId {
        value: value.to_string(),
        reason,
    };
    let (trace, index) = value
        .rsplit_once(':')
        .ok_or_else(|| malformed("missing ':' separator"))?;
    if !is_sha256_hex(trace) {
        return Err(malformed("trace id is not a 64-character lowercase hex digest"));
    }
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("index must be decimal digits"));
    }
    if index.len() > 1 && index.starts_with('0') {
        return Err(malformed("index has leading zeros"));
    }
    // Seven digits is enough for MAX_EVENT_INDEX; longer strings cannot parse in range.
    if index.len() > 7 {
        return Err(malformed("index out of range"));
    }
    let parsed: u64 = index
        .parse()
        .map_err(|_| malformed("index must be decimal digits"))?;
    if parsed > MAX_EVENT_INDEX {
        return Err(IdentityError::IndexOutOfRange(parsed));
    }
    Ok((trace, parsed))
}

/// Inputs sorted by raw path bytes. Stable, so duplicates end up adjacent.
pub fn sorted_inputs(inputs: &[InputDescriptor]) -> Vec<&InputDescriptor> {
    let mut sorted: Vec<&InputDescriptor> = inputs.iter().collect();
    sorted.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    sorted
}

/// Runs every input check in priority order without hashing.
pub fn validate_inputs(inputs: &[InputDescriptor]) -> Result<(), IdentityError> {
    let sorted = sorted_inputs(inputs);
    check_input_hashes(&sorted)?;
    check_paths(&sorted)?;
    check_sizes(&sorted)
}

fn canonicalized_inputs(sorted: &[&InputDescriptor]) -> String {
    let mut out = String::new();
    for input in sorted {
        out.push_str(&input.path);
        out.push('|');
        if let Some(hash) = &input.content_hash {
            out.push_str(hash);
        }
        out.push('|');
        if let Some(size) = input.byte_size {
            out.push_str(&size.to_string());
        }
        out.push(';');
    }
    out
}

fn check_hash(field: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty { field });
    }
    if !is_sha256_hex(value) {
        return Err(IdentityError::InvalidHash {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_input_hashes(sorted: &[&InputDescriptor]) -> Result<(), IdentityError> {
    for input in sorted {
        if let Some(hash) = &input.content_hash {
            check_hash("inputs.contentHash", hash)?;
        }
    }
    Ok(())
}

fn check_sizes(sorted: &[&InputDescriptor]) -> Result<(), IdentityError> {
    for input in sorted {
        if let Some(size) = input.byte_size {
            if size < 0 {
                return Err(IdentityError::NegativeSize {
                    path: input.path.clone(),
                    size,
                });
            }
        }
    }
    Ok(())
}

fn check_forbidden(field: &'static str, value: &str) -> Result<(), IdentityError> {
    if let Some(character) = value.chars().find(|c| FORBIDDEN_CHARACTERS.contains(c)) {
        return Err(IdentityError::ForbiddenCharacter {
            field,
            value: value.to_string(),
            character,
        });
    }
    Ok(())
}

// Empty, forbidden characters, length, then duplicates: each pass covers every
// path before the next starts.
fn check_paths(sorted: &[&InputDescriptor]) -> Result<(), IdentityError> {
    if sorted.iter().any(|input| input.path.is_empty()) {
        return Err(IdentityError::Empty {
            field: "inputs.path",
        });
    }
    for input in sorted {
        check_forbidden("inputs.path", &input.path)?;
    }
    for input in sorted {
        let len = input.path.chars().count();
        if len > MAX_PATH_CHARS {
            return Err(IdentityError::PathTooLong {
                len,
                max: MAX_PATH_CHARS,
            });
        }
    }
    for pair in sorted.windows(2) {
        if pair[0].path == pair[1].path {
            return Err(IdentityError::DuplicatePath(pair[0].path.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> String {
        "a".repeat(64)
    }

    #[test]
    fn index_formatting() {
        let trace = "b".repeat(64);
        assert_eq!(event_id(&trace, 0).unwrap(), format!("{}:0", trace));
        assert_eq!(event_id(&trace, 1_000_000).unwrap(), format!("{}:1000000", trace));
        assert_eq!(
            event_id(&trace, 1_000_001),
            Err(IdentityError::IndexOutOfRange(1_000_001))
        );
    }

    #[test]
    fn parse_rejects_leading_zeros_and_signs() {
        let trace = "c".repeat(64);
        assert_eq!(parse_event_id(&format!("{}:0", trace)).unwrap().1, 0);
        assert_eq!(parse_event_id(&format!("{}:42", trace)).unwrap().1, 42);
        for bad in ["00", "01", "-1", "+1", "", "1a", "12345678"] {
            assert!(
                parse_event_id(&format!("{}:{}", trace, bad)).is_err(),
                "accepted index {:?}",
                bad
            );
        }
        assert_eq!(
            parse_event_id(&format!("{}:1000001", trace)),
            Err(IdentityError::IndexOutOfRange(1_000_001))
        );
        assert!(parse_event_id("short:1").is_err());
    }

    #[test]
    fn hash_errors_win_over_later_groups() {
        let inputs = vec![
            InputDescriptor::new("b|bad").with_size(-1),
            InputDescriptor::new("a").with_hash("XYZ"),
        ];
        let err = trace_id(&policy(), "v1", &inputs, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidHash { field: "inputs.contentHash", .. }));
    }

    #[test]
    fn forbidden_characters_before_duplicates() {
        let inputs = vec![
            InputDescriptor::new("dup"),
            InputDescriptor::new("dup"),
            InputDescriptor::new("z;z"),
        ];
        let err = scene_id(&inputs).unwrap_err();
        assert!(matches!(err, IdentityError::ForbiddenCharacter { character: ';', .. }));
    }

    #[test]
    fn duplicate_detection_uses_sorted_scan() {
        let inputs = vec![
            InputDescriptor::new("b"),
            InputDescriptor::new("a"),
            InputDescriptor::new("b"),
        ];
        assert_eq!(
            validate_inputs(&inputs),
            Err(IdentityError::DuplicatePath("b".to_string()))
        );
    }

    #[test]
    fn oversize_path_rejected() {
        let inputs = vec![InputDescriptor::new("p".repeat(MAX_PATH_CHARS + 1))];
        assert_eq!(
            validate_inputs(&inputs),
            Err(IdentityError::PathTooLong {
                len: MAX_PATH_CHARS + 1,
                max: MAX_PATH_CHARS
            })
        );
        assert!(validate_inputs(&[InputDescriptor::new("p".repeat(MAX_PATH_CHARS))]).is_ok());
    }

    #[test]
    fn negative_size_reported_last() {
        let inputs = vec![InputDescriptor::new("a").with_size(-5)];
        assert_eq!(
            validate_inputs(&inputs),
            Err(IdentityError::NegativeSize {
                path: "a".to_string(),
                size: -5
            })
        );
    }

    #[test]
    fn pipeline_version_checked() {
        let err = trace_id(&policy(), "", &[], &BTreeMap::new()).unwrap_err();
        assert_eq!(err, IdentityError::Empty { field: "pipelineVersion" });
        let err = trace_id(&policy(), "v1|x", &[], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, IdentityError::ForbiddenCharacter { character: '|', .. }));
    }

    #[test]
    fn policy_hash_checked() {
        let err = trace_id("", "v1", &[], &BTreeMap::new()).unwrap_err();
        assert_eq!(err, IdentityError::Empty { field: "policyHash" });
        let err = trace_id(&"A".repeat(64), "v1", &[], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidHash { field: "policyHash", .. }));
    }
}
