use provenance_journal::{
    read_entries, JournalError, LogOptions, ReadMode, SignedAuditEntry, SignedAuditLog,
    StaticKeyStore, SystemClock,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn open_at(path: &Path, options: LogOptions) -> SignedAuditLog {
    SignedAuditLog::open(path, &StaticKeyStore::from_seed([5u8; 32]), SystemClock, options)
        .unwrap()
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_reopen_continues_the_chain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");

    let first = {
        let log = open_at(&path, LogOptions::default());
        log.append("boot", None, "1").unwrap()
    };
    let log = open_at(&path, LogOptions::default());
    assert_eq!(log.last_signature().as_deref(), Some(first.signature.as_str()));
    let second = log.append("shutdown", None, "1").unwrap();
    assert_eq!(second.prev_signature, Some(first.signature));

    assert_eq!(SignedAuditLog::verify_file(&path).unwrap(), 2);
}

#[test]
fn test_torn_write_is_truncated_on_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");
    let second = {
        let log = open_at(&path, LogOptions::default());
        log.append("boot", None, "1").unwrap();
        log.append("config.loaded", Some(r#"{"k":"v"}"#), "1").unwrap()
    };
    let intact_len = fs::metadata(&path).unwrap().len();

    // Simulate a crash halfway through the next line.
    append_raw(&path, br#"{"signingSchemaVersion":1,"timestamp":"2024-"#);

    let log = open_at(&path, LogOptions::default());
    assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
    let third = log.append("recovered", None, "1").unwrap();
    assert_eq!(third.prev_signature, Some(second.signature));
    assert_eq!(SignedAuditLog::verify_file(&path).unwrap(), 3);
}

#[test]
fn test_unrecognized_tail_is_tolerated_as_no_prior_signature() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");
    {
        let log = open_at(&path, LogOptions::default());
        log.append("boot", None, "1").unwrap();
    }
    // Complete JSON, so recovery keeps it, but not an audit entry.
    append_raw(&path, b"{\"unexpected\":true}\n");

    let log = open_at(&path, LogOptions::default());
    assert_eq!(log.last_signature(), None);
    let entry = log.append("after", None, "1").unwrap();
    assert_eq!(entry.prev_signature, None);

    // The foreign line still makes the file unloadable as a signed log.
    assert!(SignedAuditLog::verify_file(&path).is_err());
    let lenient: Vec<SignedAuditEntry> = read_entries(&path, ReadMode::Permissive).unwrap();
    assert_eq!(lenient.len(), 1);
}

#[test]
fn test_entry_larger_than_tail_window_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");
    let options = LogOptions {
        tail_window_bytes: 512,
        ..LogOptions::default()
    };
    let log = open_at(&path, options.clone());
    let first = log.append("boot", None, "1").unwrap();
    let len_before = fs::metadata(&path).unwrap().len();

    let details = format!(r#"{{"blob":"{}"}}"#, "x".repeat(1024));
    let err = log.append("big", Some(&details), "1").unwrap_err();
    assert!(matches!(err, JournalError::PayloadTooLarge { max: 512, .. }));
    assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
    assert_eq!(log.last_signature().as_deref(), Some(first.signature.as_str()));
    drop(log);

    let log = open_at(&path, options);
    let next = log.append("after", None, "1").unwrap();
    assert_eq!(next.prev_signature, Some(first.signature));
    assert_eq!(SignedAuditLog::verify_file(&path).unwrap(), 2);
}

#[test]
fn test_last_entry_filling_tail_window_exactly_is_recovered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");
    let second = {
        let log = open_at(&path, LogOptions::default());
        log.append("tick", Some(r#"{"i":1}"#), "1").unwrap();
        log.append("tick", Some(r#"{"i":2}"#), "1").unwrap()
    };
    let text = fs::read_to_string(&path).unwrap();
    let last_line_len = text.lines().last().unwrap().len() as u64 + 1;

    let options = LogOptions {
        tail_window_bytes: last_line_len,
        ..LogOptions::default()
    };
    let log = open_at(&path, options);
    assert_eq!(log.last_signature().as_deref(), Some(second.signature.as_str()));
    // Same shape as the second entry, so it fits the same window.
    let third = log.append("tick", Some(r#"{"i":3}"#), "1").unwrap();
    assert_eq!(third.prev_signature, Some(second.signature));
    assert_eq!(SignedAuditLog::verify_file(&path).unwrap(), 3);
}

#[test]
fn test_sync_option_still_produces_a_valid_chain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.ndjson");
    let options = LogOptions {
        sync: true,
        ..LogOptions::default()
    };
    let log = open_at(&path, options);
    for i in 0..5 {
        log.append("tick", Some(&format!(r#"{{"i":{i}}}"#)), "1").unwrap();
    }
    assert_eq!(SignedAuditLog::verify_file(&path).unwrap(), 5);
}
