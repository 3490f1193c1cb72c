//! Verify command implementation.

use provenance_journal::{read_entries, verify_or_throw, ReadMode, SignedAuditEntry};
use serde_json::json;

pub fn run(log: String, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<SignedAuditEntry> = read_entries(&log, ReadMode::Strict)
        .map_err(|e| format!("Failed to load audit log {}: {}", log, e))?;

    match verify_or_throw(&entries) {
        Ok(()) => {
            if json_output {
                let report = json!({ "valid": true, "entries": entries.len() });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("OK: {} entries verified", entries.len());
            }
            Ok(())
        }
        Err(err) => {
            tracing::warn!(log = %log, entry_index = err.entry_index(), "audit log failed verification");
            if json_output {
                let report = json!({
                    "valid": false,
                    "entries": entries.len(),
                    "entryIndex": err.entry_index(),
                    "error": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("FAILED at entry {}: {}", err.entry_index(), err);
            }
            std::process::exit(1);
        }
    }
}
