//! Append-only NDJSON journals and the signed, hash-chained audit log.
//!
//! This crate provides:
//! - [`NdjsonWriter`] / [`NdjsonReader`]: one JSON object per line, with
//!   crash-recovery truncation on open and strict or permissive reading
//! - [`SignedAuditLog`]: every entry signs a length-prefixed canonical payload
//!   with Ed25519 and embeds the previous entry's signature
//! - [`verify_or_throw`] / [`verify`]: offline chain verification
//! - [`PlainAuditLog`]: unsigned operational records
//! - Injectable [`SigningKeyStore`] and [`Clock`] collaborators
//!
//! ## Quick Start
//!
//! ```rust
//! use provenance_journal::{verify, FixedClock, LogOptions, SignedAuditLog, StaticKeyStore};
//! use chrono::{TimeZone, Utc};
//!
//! let dir = tempfile::tempdir()?;
//! let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let keys = StaticKeyStore::from_seed([42u8; 32]);
//! let log = SignedAuditLog::open(dir.path().join("audit.ndjson"), &keys, clock, LogOptions::default())?;
//!
//! log.append("key.created", None, "1")?;
//! log.append("policy.loaded", Some(r#"{"policy":"default"}"#), "1")?;
//!
//! let entries = log.entries()?;
//! assert_eq!(entries[1].prev_signature.as_deref(), Some(entries[0].signature.as_str()));
//! assert!(verify(&entries));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Injectable wall clock.
pub mod clock;
/// Signed audit entry record.
pub mod entry;
/// Error types for journal operations.
pub mod errors;
/// Signing key store contract.
pub mod keystore;
/// Canonical signing payload.
pub mod payload;
/// Unsigned audit log.
pub mod plain;
/// NDJSON reader implementation.
pub mod reader;
/// Signed, hash-chained audit log.
pub mod signed_log;
/// Offline chain verification.
pub mod verification;
/// NDJSON writer implementation.
pub mod writer;

pub use clock::{format_timestamp, Clock, FixedClock, SystemClock};
pub use entry::{SignedAuditEntry, SIGNING_SCHEMA_VERSION, SUPPORTED_SIGNING_SCHEMA_VERSIONS};
pub use errors::{JournalError, KeyStoreError, VerificationError};
pub use keystore::{EphemeralKeyStore, SigningKeyMaterial, SigningKeyStore, StaticKeyStore};
pub use plain::{PlainAuditLog, PlainAuditRecord};
pub use reader::{read_entries, NdjsonReader, ReadMode};
pub use signed_log::SignedAuditLog;
pub use verification::{verify, verify_or_throw};
pub use writer::{LogOptions, NdjsonWriter};
