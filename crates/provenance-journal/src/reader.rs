//! NDJSON reader implementation.

use crate::errors::JournalError;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Read mode for handling malformed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Strict mode: a malformed line is an error.
    Strict,
    /// Permissive mode: the first malformed line is treated as end-of-file.
    Permissive,
}

/// Sequential reader over one NDJSON journal.
///
/// Blank lines are skipped in both modes.
///
/// ```rust,no_run
/// use provenance_journal::{NdjsonReader, ReadMode};
///
/// let mut reader = NdjsonReader::open("audit.ndjson", ReadMode::Strict)?;
/// while let Some(record) = reader.read_value::<serde_json::Value>()? {
///     println!("{}", record["eventType"]);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct NdjsonReader {
    reader: BufReader<File>,
    mode: ReadMode,
    line: usize,
    done: bool,
}

impl NdjsonReader {
    /// Opens a journal for reading.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            mode,
            line: 0,
            done: false,
        })
    }

    /// 1-based number of the last line read.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Reads and decodes the next record, or `None` at end-of-file.
    ///
    /// # Errors
    ///
    /// In [`ReadMode::Strict`], returns [`JournalError::MalformedLine`] for a
    /// line that does not decode as `T`.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>, JournalError> {
        let mut buf = Vec::new();
        while !self.done {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                self.done = true;
                break;
            }
            self.line += 1;
            let content = buf.trim_ascii();
            if content.is_empty() {
                continue;
            }
            match serde_json::from_slice::<T>(content) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => match self.mode {
                    ReadMode::Strict => {
                        return Err(JournalError::MalformedLine {
                            line: self.line,
                            reason: err.to_string(),
                        })
                    }
                    ReadMode::Permissive => {
                        tracing::warn!(line = self.line, error = %err, "stopping at malformed journal line");
                        self.done = true;
                    }
                },
            }
        }
        Ok(None)
    }
}

/// Reads every record of a journal.
pub fn read_entries<T: DeserializeOwned, P: AsRef<Path>>(
    path: P,
    mode: ReadMode,
) -> Result<Vec<T>, JournalError> {
    let mut reader = NdjsonReader::open(path, mode)?;
    let mut out = Vec::new();
    while let Some(value) = reader.read_value()? {
        out.push(value);
    }
    Ok(out)
}

/// Last non-blank line within the final `window` bytes of `file`.
///
/// The window counts the line's terminator. Returns `None` when the file is
/// empty or the line starts before the window.
pub(crate) fn tail_line(file: &mut File, window: u64) -> io::Result<Option<Vec<u8>>> {
    let len = file.metadata()?.len();
    // One extra byte so a line that fills the window exactly still shows the
    // preceding newline.
    let start = len.saturating_sub(window.saturating_add(1));
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.seek(SeekFrom::Start(start))?;
    file.by_ref().take(len - start).read_to_end(&mut buf)?;

    let content = buf.trim_ascii_end();
    if content.is_empty() {
        return Ok(None);
    }
    match content.iter().rposition(|b| *b == b'\n') {
        Some(pos) => Ok(Some(content[pos + 1..].to_vec())),
        None if start == 0 => Ok(Some(content.to_vec())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn strict_rejects_malformed_line_with_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.ndjson");
        fs::write(&path, "{\"a\":1}\n\n{oops}\n{\"b\":2}\n").unwrap();
        let err = read_entries::<Value, _>(&path, ReadMode::Strict).unwrap_err();
        assert!(matches!(err, JournalError::MalformedLine { line: 3, .. }));
    }

    #[test]
    fn permissive_stops_at_first_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.ndjson");
        fs::write(&path, "{\"a\":1}\n{oops}\n{\"b\":2}\n").unwrap();
        let values = read_entries::<Value, _>(&path, ReadMode::Permissive).unwrap();
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn tail_line_respects_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.ndjson");
        fs::write(&path, "{\"a\":1}\n{\"bbbbbbbb\":2}\n").unwrap();
        let mut file = File::open(&path).unwrap();
        assert_eq!(
            tail_line(&mut file, 1024).unwrap().as_deref(),
            Some(&b"{\"bbbbbbbb\":2}"[..])
        );
        // Window ends inside the last line: nothing trustworthy to return.
        assert_eq!(tail_line(&mut file, 6).unwrap(), None);
    }

    #[test]
    fn tail_line_of_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.ndjson");
        fs::write(&path, "").unwrap();
        let mut file = File::open(&path).unwrap();
        assert_eq!(tail_line(&mut file, 1024).unwrap(), None);
    }
}
