//! Hash-chained, Ed25519-signed audit log.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use provenance_canonical::sha256_hex;
use std::path::{Path, PathBuf};

use crate::clock::{format_timestamp, Clock};
use crate::entry::{SignedAuditEntry, SIGNING_SCHEMA_VERSION};
use crate::errors::JournalError;
use crate::keystore::SigningKeyStore;
use crate::payload::{validate_append, PayloadFields};
use crate::reader::{read_entries, ReadMode};
use crate::verification::verify_or_throw;
use crate::writer::{LogOptions, NdjsonWriter};

struct ChainState {
    writer: NdjsonWriter,
    last_signature: Option<String>,
}

/// Append-only audit log where every entry signs its payload and embeds the
/// previous entry's signature.
///
/// `append` is safe to call from many threads: the read of the last signature,
/// signing, the write and the update all happen under one lock, so entries form
/// a single chain in call order.
///
/// The signing key is fetched once at open and used for the log's lifetime.
///
/// ```rust
/// use provenance_journal::{LogOptions, SignedAuditLog, StaticKeyStore, SystemClock};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("audit.ndjson");
/// let keys = StaticKeyStore::from_seed([1u8; 32]);
/// let log = SignedAuditLog::open(&path, &keys, SystemClock, LogOptions::default())?;
/// log.append("session.opened", Some(r#"{"user":"ops"}"#), "1")?;
/// assert_eq!(SignedAuditLog::verify_file(&path)?, 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SignedAuditLog {
    path: PathBuf,
    state: Mutex<ChainState>,
    signing_key: SigningKey,
    public_key_base64: String,
    clock: Box<dyn Clock>,
}

impl SignedAuditLog {
    /// Opens or creates the log at `path`.
    ///
    /// A torn trailing write is truncated, then the last signature is recovered
    /// from at most `options.tail_window_bytes` at the end of the file. A tail
    /// that does not decode is treated as "no prior signature".
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::KeyStore`] if no signing key is available, or
    /// [`JournalError::Io`] if the file cannot be opened.
    pub fn open<P, C>(
        path: P,
        key_store: &dyn SigningKeyStore,
        clock: C,
        options: LogOptions,
    ) -> Result<Self, JournalError>
    where
        P: AsRef<Path>,
        C: Clock + 'static,
    {
        let material = key_store.get_or_create_signing_key()?;
        let mut writer = NdjsonWriter::open(path.as_ref(), &options)?;
        let last_signature = recover_last_signature(&mut writer, options.tail_window_bytes)?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(ChainState {
                writer,
                last_signature,
            }),
            signing_key: material.signing_key(),
            public_key_base64: material.public_key_base64().to_string(),
            clock: Box::new(clock),
        })
    }

    /// Signs and appends one entry, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidInput`] before anything is written if
    /// `event_type`, `details_json` or `details_schema_version` is rejected,
    /// [`JournalError::PayloadTooLarge`] if the entry could not be recovered from
    /// the configured tail window on reopen, and [`JournalError::Io`] on write
    /// failure. The chain head is left unchanged in every case.
    pub fn append(
        &self,
        event_type: &str,
        details_json: Option<&str>,
        details_schema_version: &str,
    ) -> Result<SignedAuditEntry, JournalError> {
        validate_append(event_type, details_json, details_schema_version)?;

        let mut state = self.state.lock();
        let timestamp = format_timestamp(self.clock.now());
        let payload = PayloadFields {
            version: SIGNING_SCHEMA_VERSION,
            timestamp: &timestamp,
            event_type,
            details_schema_version,
            details_json,
            prev_signature: state.last_signature.as_deref(),
            public_key: self.signing_key.verifying_key().as_bytes(),
        }
        .canonical_payload();

        let signature = BASE64.encode(self.signing_key.sign(payload.as_bytes()).to_bytes());
        let entry = SignedAuditEntry {
            signing_schema_version: SIGNING_SCHEMA_VERSION,
            timestamp,
            event_type: event_type.to_string(),
            details_json: details_json.map(str::to_string),
            details_schema_version: details_schema_version.to_string(),
            public_key: self.public_key_base64.clone(),
            signature: signature.clone(),
            prev_signature: state.last_signature.clone(),
            payload_hash: sha256_hex(payload.as_bytes()),
        };

        state.writer.append_json(&entry)?;
        state.last_signature = Some(signature);
        tracing::debug!(
            event_type,
            signature = entry.signature.get(..8).unwrap_or_default(),
            "signed audit entry appended"
        );
        Ok(entry)
    }

    /// Signature of the most recent entry, if any.
    pub fn last_signature(&self) -> Option<String> {
        self.state.lock().last_signature.clone()
    }

    /// Base64 public key entries are signed with.
    pub fn public_key(&self) -> &str {
        &self.public_key_base64
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reloads every entry from disk.
    pub fn entries(&self) -> Result<Vec<SignedAuditEntry>, JournalError> {
        // Hold the lock so no append lands mid-read.
        let _state = self.state.lock();
        read_entries(&self.path, ReadMode::Strict)
    }

    /// Loads and verifies the log at `path`, returning the number of entries.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::MalformedLine`] for an undecodable line, or
    /// [`JournalError::Verification`] for the first entry that fails verification.
    pub fn verify_file<P: AsRef<Path>>(path: P) -> Result<usize, JournalError> {
        let entries: Vec<SignedAuditEntry> = read_entries(path, ReadMode::Strict)?;
        verify_or_throw(&entries)?;
        Ok(entries.len())
    }
}

fn recover_last_signature(
    writer: &mut NdjsonWriter,
    window: u64,
) -> Result<Option<String>, JournalError> {
    let Some(line) = writer.last_line(window)? else {
        return Ok(None);
    };
    match serde_json::from_slice::<SignedAuditEntry>(&line) {
        Ok(entry) => Ok(Some(entry.signature)),
        Err(err) => {
            tracing::warn!(
                path = %writer.path().display(),
                error = %err,
                "last audit entry unreadable; chaining from no prior signature"
            );
            Ok(None)
        }
    }
}
