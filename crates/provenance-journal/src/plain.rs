//! Unsigned operational audit log.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::clock::{format_timestamp, Clock};
use crate::errors::JournalError;
use crate::payload::validate_event_type;
use crate::reader::{read_entries, ReadMode};
use crate::writer::{LogOptions, NdjsonWriter};

/// One line of a [`PlainAuditLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainAuditRecord {
    /// `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub timestamp: String,
    /// Event type.
    pub event_type: String,
    /// Flat string details.
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// NDJSON audit log without signatures or chaining.
///
/// Owned by whoever opens it; share it behind an `Arc` if several components
/// record to the same file.
pub struct PlainAuditLog {
    path: PathBuf,
    writer: Mutex<NdjsonWriter>,
    clock: Box<dyn Clock>,
}

impl PlainAuditLog {
    /// Opens or creates the log at `path`, truncating a torn tail.
    pub fn open<P, C>(path: P, clock: C, options: LogOptions) -> Result<Self, JournalError>
    where
        P: AsRef<Path>,
        C: Clock + 'static,
    {
        let writer = NdjsonWriter::open(path.as_ref(), &options)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(writer),
            clock: Box::new(clock),
        })
    }

    /// Appends one record.
    pub fn record(
        &self,
        event_type: &str,
        details: BTreeMap<String, String>,
    ) -> Result<PlainAuditRecord, JournalError> {
        validate_event_type(event_type)?;
        let mut writer = self.writer.lock();
        let record = PlainAuditRecord {
            timestamp: format_timestamp(self.clock.now()),
            event_type: event_type.to_string(),
            details,
        };
        writer.append_json(&record)?;
        Ok(record)
    }

    /// Reloads every record, stopping quietly at a malformed line.
    pub fn records(&self) -> Result<Vec<PlainAuditRecord>, JournalError> {
        let _writer = self.writer.lock();
        read_entries(&self.path, ReadMode::Permissive)
    }
}
