use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Default maximum nesting depth accepted by [`Canonicalizer::new`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalizationError {
    /// A floating-point number was found; canonical data must be integer-only.
    #[error("floating-point value forbidden at {path}")]
    FloatForbidden {
        /// Path of the offending field.
        path: String,
    },
    /// The value nests deeper than the configured limit.
    #[error("nesting depth exceeds {max} at {path}")]
    DepthExceeded {
        /// Path of the container that crossed the limit.
        path: String,
        /// Configured limit.
        max: usize,
    },
    /// The value could not be converted into a JSON tree.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Helper for building field paths reported in errors.
#[derive(Debug, Clone)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Canonicalizer that emits deterministic bytes.
///
/// Output rules:
/// - object keys sorted by raw UTF-8 bytes
/// - no insignificant whitespace; `{}` and `[]` for empty containers
/// - `"`, `\` and control characters (`< 0x20`, `0x7F`) escaped; `\n`, `\r`, `\t`
///   use short forms, everything else `\u00XX` with uppercase hex
/// - `/` and non-ASCII characters are emitted verbatim
/// - integers only; any floating-point number is rejected
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    max_depth: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer with [`DEFAULT_MAX_DEPTH`].
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a canonicalizer with a custom nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Serializes `value` and produces its canonical bytes.
    pub fn canonicalize<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, CanonicalizationError> {
        let value = serde_json::to_value(value)
            .map_err(|err| CanonicalizationError::Serialization(err.to_string()))?;
        self.canonicalize_value(&value)
    }

    /// Produces canonical bytes for an already-parsed JSON tree.
    pub fn canonicalize_value(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        let mut out = String::new();
        self.encode(value, &Path::root(), 0, &mut out)?;
        Ok(out.into_bytes())
    }

    /// Like [`Canonicalizer::canonicalize`] but returns a `String`.
    pub fn canonicalize_to_string<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<String, CanonicalizationError> {
        let value = serde_json::to_value(value)
            .map_err(|err| CanonicalizationError::Serialization(err.to_string()))?;
        let mut out = String::new();
        self.encode(&value, &Path::root(), 0, &mut out)?;
        Ok(out)
    }

    fn encode(
        &self,
        value: &Value,
        path: &Path,
        depth: usize,
        out: &mut String,
    ) -> Result<(), CanonicalizationError> {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(true) => out.push_str("true"),
            Value::Bool(false) => out.push_str("false"),
            Value::Number(num) => {
                if let Some(i) = num.as_i64() {
                    let _ = write!(out, "{}", i);
                } else if let Some(u) = num.as_u64() {
                    let _ = write!(out, "{}", u);
                } else {
                    return Err(CanonicalizationError::FloatForbidden {
                        path: path.to_string(),
                    });
                }
            }
            Value::String(s) => write_escaped(s, out),
            Value::Array(items) => {
                self.check_depth(path, depth)?;
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    self.encode(item, &path.push_index(idx), depth + 1, out)?;
                }
                out.push(']');
            }
            Value::Object(map) => {
                self.check_depth(path, depth)?;
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
                out.push('{');
                for (idx, key) in keys.into_iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    write_escaped(key, out);
                    out.push(':');
                    self.encode(&map[key], &path.push_field(key), depth + 1, out)?;
                }
                out.push('}');
            }
        }
        Ok(())
    }

    fn check_depth(&self, path: &Path, depth: usize) -> Result<(), CanonicalizationError> {
        if depth >= self.max_depth {
            return Err(CanonicalizationError::DepthExceeded {
                path: path.to_string(),
                max: self.max_depth,
            });
        }
        Ok(())
    }
}

/// Canonical JSON for a flat string map. Infallible: the shape admits no floats.
pub fn canonical_string_map(map: &BTreeMap<String, String>) -> String {
    // BTreeMap<String, _> iterates in byte order already.
    let mut out = String::from("{");
    for (idx, (key, value)) in map.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        write_escaped(key, &mut out);
        out.push(':');
        write_escaped(value, &mut out);
    }
    out.push('}');
    out
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
