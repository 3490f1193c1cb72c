use thiserror::Error;

/// Errors that can occur during journal and audit log operations.
#[derive(Error, Debug)]
pub enum JournalError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization or parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A line in the journal is not a valid record.
    #[error("malformed record at line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// Reason for rejection.
        reason: String,
    },
    /// Serialized record is larger than the tail window can recover.
    #[error("record size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Encoded size in bytes, including the line terminator.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },
    /// Serialized record would span more than one line.
    #[error("record contains a raw newline")]
    EmbeddedNewline,
    /// A field passed to `append` was rejected before anything was written.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field.
        field: &'static str,
        /// Reason for rejection.
        reason: String,
    },
    /// A loaded log failed chain verification.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),
    /// The signing key could not be obtained.
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
}

/// Errors raised by a [`SigningKeyStore`](crate::SigningKeyStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// Backend could not produce a key.
    #[error("key unavailable: {0}")]
    Unavailable(String),
    /// Stored key material has the wrong shape.
    #[error("invalid key material: {0}")]
    InvalidMaterial(String),
}

/// Verification failure for one entry of a signed audit log.
///
/// Every variant carries the 0-based index of the entry that failed;
/// verification stops there.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// `signingSchemaVersion` is not one this build understands.
    #[error("entry {entry_index}: unsupported signing schema version {version}")]
    UnsupportedSchemaVersion {
        /// Failing entry.
        entry_index: usize,
        /// Version found.
        version: u32,
    },
    /// `prevSignature` does not match the previous entry's signature.
    #[error("entry {entry_index}: chain broken (expected {expected}, found {actual})")]
    ChainBroken {
        /// Failing entry.
        entry_index: usize,
        /// Prefix of the expected previous signature, or `none`.
        expected: String,
        /// Prefix of the recorded previous signature, or `none`.
        actual: String,
    },
    /// `publicKey` or `signature` is not valid base64 of the right length, or
    /// `detailsJson` is present but empty.
    #[error("entry {entry_index}: invalid {field} encoding")]
    InvalidEncoding {
        /// Failing entry.
        entry_index: usize,
        /// `publicKey`, `signature` or `detailsJson`.
        field: &'static str,
    },
    /// `publicKey` decodes but is not a valid Ed25519 point.
    #[error("entry {entry_index}: invalid public key")]
    InvalidPublicKey {
        /// Failing entry.
        entry_index: usize,
    },
    /// `payloadHash` does not match the rebuilt payload.
    #[error("entry {entry_index}: payload hash mismatch")]
    HashMismatch {
        /// Failing entry.
        entry_index: usize,
    },
    /// Signature does not verify over the rebuilt payload.
    #[error("entry {entry_index}: signature verification failed")]
    InvalidSignature {
        /// Failing entry.
        entry_index: usize,
    },
}

impl VerificationError {
    /// Index of the entry that failed verification.
    pub fn entry_index(&self) -> usize {
        match self {
            Self::UnsupportedSchemaVersion { entry_index, .. }
            | Self::ChainBroken { entry_index, .. }
            | Self::InvalidEncoding { entry_index, .. }
            | Self::InvalidPublicKey { entry_index }
            | Self::HashMismatch { entry_index }
            | Self::InvalidSignature { entry_index } => *entry_index,
        }
    }
}
