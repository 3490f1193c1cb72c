//! List command implementation.

use crate::output;
use provenance_journal::{NdjsonReader, ReadMode, SignedAuditEntry};

pub fn run(
    log: String,
    json: bool,
    max_entries: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = NdjsonReader::open(&log, ReadMode::Strict)
        .map_err(|e| format!("Failed to open audit log {}: {}", log, e))?;

    if !json {
        output::print_table_header();
    }

    let mut index = 0;
    while let Some(entry) = reader.read_value::<SignedAuditEntry>()? {
        if max_entries.is_some_and(|max| index >= max) {
            break;
        }
        if json {
            println!("{}", serde_json::to_string(&entry)?);
        } else {
            println!("{}", output::format_table_row(index, &entry));
        }
        index += 1;
    }

    Ok(())
}
