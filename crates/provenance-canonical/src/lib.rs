//! Canonical encoding and deterministic identifiers for provenance audit trails.
//!
//! Every byte that is hashed or signed anywhere in the workspace comes from this
//! crate: the canonical JSON encoder, the SHA-256 helpers, and the content-derived
//! trace/scene/event identifiers built on top of them.
//!
//! ```rust
//! use provenance_canonical::Canonicalizer;
//! use serde_json::json;
//!
//! let bytes = Canonicalizer::new().canonicalize(&json!({"z": 3, "a": 1, "m": 2}))?;
//! assert_eq!(bytes, br#"{"a":1,"m":2,"z":3}"#);
//! # Ok::<(), provenance_canonical::CanonicalizationError>(())
//! ```
//!
#![deny(missing_docs)]

/// Canonicalization helpers for deterministic hashing.
pub mod canonicalizer;
/// SHA-256 helpers and digest format checks.
pub mod digest;
/// Deterministic trace, scene and event identifiers.
pub mod identity;
/// Validation helpers for bounded text fields.
pub mod validation;

pub use canonicalizer::{canonical_string_map, CanonicalizationError, Canonicalizer};
pub use digest::{canonical_digest, is_sha256_hex, sha256, sha256_hex};
pub use identity::{
    event_id, parse_event_id, scene_id, trace_id, validate_inputs, IdentityError,
    InputDescriptor,
};
pub use validation::ValidationError;
