//! Canonicalize command implementation.

use provenance_canonical::{sha256_hex, Canonicalizer};
use serde_json::Value;
use std::io::{self, Read};

pub fn run(input: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let json_str = if let Some(path) = input {
        std::fs::read_to_string(&path).map_err(|e| format!("Failed to read file {}: {}", path, e))?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("Invalid JSON: {}", e))?;

    let bytes = Canonicalizer::new()
        .canonicalize_value(&value)
        .map_err(|e| format!("Canonicalization failed: {}", e))?;

    println!("{}", String::from_utf8_lossy(&bytes));
    tracing::debug!(sha256 = %sha256_hex(&bytes), bytes = bytes.len(), "canonicalized");
    Ok(())
}
