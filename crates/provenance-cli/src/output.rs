//! Output formatting utilities.

use provenance_journal::SignedAuditEntry;

/// Prints table header.
#[allow(clippy::print_literal)]
pub fn print_table_header() {
    println!(
        "{:<6} {:<25} {:<24} {:<10} {}",
        "INDEX", "TIMESTAMP", "TYPE", "SIGNATURE", "DETAILS"
    );
    println!("{}", "-".repeat(100));
}

/// Formats an entry as a simple table row.
pub fn format_table_row(index: usize, entry: &SignedAuditEntry) -> String {
    format!(
        "{:<6} {:<25} {:<24} {:<10} {}",
        index,
        entry.timestamp,
        truncate(&entry.event_type, 24),
        truncate(&entry.signature, 10),
        entry.details_json.as_deref().unwrap_or("-")
    )
}

/// Shortens `s` to at most `max_len` characters, marking the cut with `...`.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
