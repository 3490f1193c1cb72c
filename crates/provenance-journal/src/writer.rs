//! NDJSON writer with crash recovery.

use crate::errors::JournalError;
use crate::reader::tail_line;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SCAN_CHUNK: u64 = 8 * 1024;

/// Options for opening a journal.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Whether to fsync after each append (default: false).
    pub sync: bool,
    /// Whether to create the file if it doesn't exist (default: true).
    pub create: bool,
    /// Bytes read from the end of the file to recover the last record (default: 64 KiB).
    ///
    /// Also the largest record, terminator included, that may be appended.
    pub tail_window_bytes: u64,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            sync: false,
            create: true,
            tail_window_bytes: 64 * 1024,
        }
    }
}

/// Append-only writer for newline-delimited JSON.
///
/// Opening an existing file scans backwards for the last line that ends with
/// `}` and parses as JSON, and truncates everything after it. A torn write left
/// by an unclean shutdown is therefore dropped before the first new append.
///
/// # Example
///
/// ```rust
/// use provenance_journal::{LogOptions, NdjsonWriter};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir()?;
/// let mut writer = NdjsonWriter::open(dir.path().join("events.ndjson"), &LogOptions::default())?;
/// writer.append_json(&json!({"eventType": "boot"}))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct NdjsonWriter {
    file: File,
    path: PathBuf,
    sync: bool,
    max_record_bytes: u64,
    recovered_bytes: u64,
}

impl NdjsonWriter {
    /// Opens or creates a journal for appending, recovering from a torn tail.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be opened, read or truncated.
    pub fn open<P: AsRef<Path>>(path: P, options: &LogOptions) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(options.create)
            .read(true)
            .append(true)
            .open(&path)?;

        let recovered_bytes = recover_tail(&mut file, options.sync)?;
        if recovered_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                bytes_dropped = recovered_bytes,
                "journal recovered from partial trailing write"
            );
        }

        Ok(Self {
            file,
            path,
            sync: options.sync,
            max_record_bytes: options.tail_window_bytes,
            recovered_bytes,
        })
    }

    /// Serializes `value` as one compact JSON line and appends it.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Json`] if serialization fails,
    /// [`JournalError::EmbeddedNewline`] if the encoding would span lines,
    /// [`JournalError::PayloadTooLarge`] if the line exceeds
    /// [`LogOptions::tail_window_bytes`], or [`JournalError::Io`] on write failure.
    /// Nothing is written in the first three cases.
    pub fn append_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(value)?;
        if line.contains(&b'\n') {
            return Err(JournalError::EmbeddedNewline);
        }
        line.push(b'\n');
        if line.len() as u64 > self.max_record_bytes {
            return Err(JournalError::PayloadTooLarge {
                size: line.len() as u64,
                max: self.max_record_bytes,
            });
        }

        // Single write so a crash tears at most this line.
        self.file.write_all(&line)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Bytes of the last record, read from at most `window` trailing bytes.
    ///
    /// Returns `None` for an empty journal or when the last record does not fit
    /// in the window.
    pub fn last_line(&mut self, window: u64) -> Result<Option<Vec<u8>>, JournalError> {
        Ok(tail_line(&mut self.file, window)?)
    }

    /// Path this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes dropped by crash recovery when the file was opened.
    pub fn recovered_bytes(&self) -> u64 {
        self.recovered_bytes
    }

    /// Flushes and, if configured, syncs the file.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

/// Truncates anything after the last complete record; returns bytes dropped.
fn recover_tail(file: &mut File, sync: bool) -> io::Result<u64> {
    let len = file.metadata()?.len();
    let mut end = len;
    let mut keep = 0;
    let mut missing_newline = false;

    while end > 0 {
        let terminated = byte_at(file, end - 1)? == b'\n';
        let content_end = if terminated { end - 1 } else { end };
        let (start, line) = line_before(file, content_end)?;
        if is_complete_record(&line) {
            keep = end;
            missing_newline = !terminated;
            break;
        }
        end = start;
    }

    if keep < len {
        file.set_len(keep)?;
    }
    if missing_newline {
        file.write_all(b"\n")?;
    }
    if sync && (keep < len || missing_newline) {
        file.sync_all()?;
    }
    Ok(len - keep)
}

fn is_complete_record(line: &[u8]) -> bool {
    let trimmed = line.trim_ascii_end();
    trimmed.ends_with(b"}") && serde_json::from_slice::<serde_json::Value>(trimmed).is_ok()
}

fn byte_at(file: &mut File, offset: u64) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Start offset and bytes of the line that ends at `end` (exclusive, no terminator).
fn line_before(file: &mut File, end: u64) -> io::Result<(u64, Vec<u8>)> {
    let mut start = end;
    let mut line = Vec::new();
    while start > 0 {
        let chunk_start = start.saturating_sub(SCAN_CHUNK);
        let mut chunk = vec![0u8; (start - chunk_start) as usize];
        file.seek(SeekFrom::Start(chunk_start))?;
        file.read_exact(&mut chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            let mut tail = chunk.split_off(pos + 1);
            tail.extend_from_slice(&line);
            return Ok((chunk_start + pos as u64 + 1, tail));
        }
        chunk.extend_from_slice(&line);
        line = chunk;
        start = chunk_start;
    }
    Ok((0, line))
}
