use provenance_canonical::InputDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Trace record schema version written into every event.
pub const TRACE_SCHEMA_VERSION: u32 = 1;

/// Kind of trace event. New kinds are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// First event of a trace; anchors its identifiers.
    TraceStart,
    /// Intermediate pipeline action.
    ActionStep,
    /// Successful terminal event.
    TraceEnd,
    /// Failed terminal event.
    TraceFail,
}

impl EventType {
    /// Wire name (`trace_start`, ...), mirrored in `entryType`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::TraceStart => "trace_start",
            EventType::ActionStep => "action_step",
            EventType::TraceEnd => "trace_end",
            EventType::TraceFail => "trace_fail",
        }
    }

    /// `true` for `trace_end` and `trace_fail`.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::TraceEnd | EventType::TraceFail)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome metrics carried by terminal events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetrics {
    /// Whether the pipeline produced its output.
    pub success: bool,
    /// Wall time in milliseconds, `0..=604_800_000`.
    pub elapsed_ms: i64,
    /// Optional quality score in `[0, 1]`; success only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    /// Stable failure code; failure only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl TraceMetrics {
    /// Metrics for a successful run.
    pub fn success(elapsed_ms: i64, quality_score: Option<f64>) -> Self {
        Self {
            success: true,
            elapsed_ms,
            quality_score,
            error_code: None,
        }
    }

    /// Metrics for a failed run.
    pub fn failure(elapsed_ms: i64, error_code: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed_ms,
            quality_score: None,
            error_code: Some(error_code.into()),
        }
    }
}

/// Opaque build metadata attached to every event (git revision, toolchain, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildMeta(BTreeMap<String, String>);

impl BuildMeta {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Looks up an entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when no entries are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for BuildMeta {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

/// One persisted trace record.
///
/// Built by [`AuditTraceEmitter`](crate::AuditTraceEmitter), checked by
/// [`TraceContractValidator`](crate::TraceContractValidator), then written once
/// and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Always [`TRACE_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Event kind.
    pub event_type: EventType,
    /// String mirror of `event_type`.
    pub entry_type: String,
    /// Content-derived trace identifier (64 lowercase hex).
    pub trace_id: String,
    /// Content-derived scene identifier (64 lowercase hex).
    pub scene_id: String,
    /// `{traceId}:{index}`.
    pub event_id: String,
    /// Digest of the policy in force (64 lowercase hex).
    pub policy_hash: String,
    /// Pipeline version string.
    pub pipeline_version: String,
    /// Inputs consumed; start events only.
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
    /// Flat parameter summary; non-empty on start events only.
    #[serde(default)]
    pub params_summary: BTreeMap<String, String>,
    /// Outcome metrics; terminal events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TraceMetrics>,
    /// Reference to the produced artifact; successful end only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    /// Action name; step events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Opaque build metadata.
    pub build_meta: BuildMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_wire_names() {
        for kind in [
            EventType::TraceStart,
            EventType::ActionStep,
            EventType::TraceEnd,
            EventType::TraceFail,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
        assert!(EventType::TraceFail.is_terminal());
        assert!(!EventType::ActionStep.is_terminal());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let event = TraceEvent {
            schema_version: TRACE_SCHEMA_VERSION,
            event_type: EventType::ActionStep,
            entry_type: "action_step".into(),
            trace_id: "a".repeat(64),
            scene_id: "b".repeat(64),
            event_id: format!("{}:1", "a".repeat(64)),
            policy_hash: "c".repeat(64),
            pipeline_version: "v1".into(),
            inputs: vec![],
            params_summary: BTreeMap::new(),
            metrics: None,
            artifact_ref: None,
            action_type: Some("denoise".into()),
            build_meta: BuildMeta::new().with("git", "abc123"),
        };
        let value = serde_json::to_value(&event).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("metrics"));
        assert!(!obj.contains_key("artifactRef"));
        assert_eq!(obj["actionType"], "denoise");
        assert_eq!(obj["buildMeta"], json!({"git": "abc123"}));
        assert_eq!(obj["schemaVersion"], 1);

        let back: TraceEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
