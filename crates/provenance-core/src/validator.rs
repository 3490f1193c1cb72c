//! Two-phase-commit contract validator for a single trace.
//!
//! [`TraceContractValidator::validate`] runs five ordered check groups (schema,
//! deep field, sequence, per-type field constraints, cross-event consistency)
//! against the *committed* state, after first refusing everything once the trace
//! has ended, and on success records the resulting state as
//! *pending*. The caller persists the event, then calls
//! [`commit`](TraceContractValidator::commit) on success or
//! [`rollback`](TraceContractValidator::rollback) on failure. Committed state only
//! moves in lock-step with durable writes.

use provenance_canonical::validation::{check_text, is_control};
use provenance_canonical::{identity, is_sha256_hex, ValidationError};
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::ContractError;
use crate::events::{EventType, TraceEvent, TraceMetrics, TRACE_SCHEMA_VERSION};

/// Longest accepted `pipelineVersion`.
pub const MAX_PIPELINE_VERSION_CHARS: usize = 256;
/// Upper bound for `metrics.elapsedMs` (seven days).
pub const MAX_ELAPSED_MS: i64 = 604_800_000;
/// Longest accepted `artifactRef`.
pub const MAX_ARTIFACT_REF_CHARS: usize = 2048;
/// Longest accepted `metrics.errorCode`.
pub const MAX_ERROR_CODE_CHARS: usize = 128;
/// Most inputs a single trace may declare.
pub const MAX_INPUTS: usize = 4096;
/// Most entries in `paramsSummary`.
pub const MAX_PARAMS: usize = 256;
/// Longest `paramsSummary` value.
pub const MAX_PARAM_VALUE_CHARS: usize = 1024;

fn param_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{1,128}$").expect("invalid regex"))
}

fn action_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_.]{0,63}$").expect("invalid regex"))
}

fn error_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:-]+$").expect("invalid regex"))
}

/// Phase of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracePhase {
    /// No `trace_start` committed yet.
    #[default]
    NotStarted,
    /// Started, no terminal event committed.
    Started,
    /// `trace_end` or `trace_fail` committed. Terminal.
    Ended,
}

/// Snapshot of a trace's logical state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorState {
    /// Anchored trace ID, set by `trace_start`.
    pub trace_id: Option<String>,
    /// Anchored scene ID, set by `trace_start`.
    pub scene_id: Option<String>,
    /// Anchored policy hash, set by `trace_start`.
    pub policy_hash: Option<String>,
    /// Number of accepted events; also the index the next event must carry.
    pub event_index: u64,
    /// Current phase.
    pub phase: TracePhase,
    /// Type of the most recently accepted event.
    pub last_event_type: Option<EventType>,
}

impl ValidatorState {
    /// `true` once `trace_start` has been accepted.
    pub fn is_started(&self) -> bool {
        self.phase != TracePhase::NotStarted
    }

    /// `true` once a terminal event has been accepted.
    pub fn is_ended(&self) -> bool {
        self.phase == TracePhase::Ended
    }
}

/// Single-trace contract validator. Not thread-safe; one writer per trace.
#[derive(Debug, Clone, Default)]
pub struct TraceContractValidator {
    committed: ValidatorState,
    pending: ValidatorState,
}

impl TraceContractValidator {
    /// Validator for a fresh trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `event` and, if it passes, stages the resulting state as pending.
    ///
    /// A failed validation leaves pending equal to committed.
    pub fn validate(&mut self, event: &TraceEvent) -> Result<(), ContractError> {
        self.pending = self.committed.clone();
        // Terminal before any other group: nothing is judged after the end.
        if self.committed.is_ended() {
            return Err(ContractError::TraceAlreadyEnded);
        }
        check_schema(event)?;
        check_fields(event)?;
        self.check_sequence(event)?;
        check_constraints(event)?;
        self.check_cross_event(event)?;
        self.pending = self.next_state(event);
        Ok(())
    }

    /// Promotes pending to committed. Call only after the event was persisted.
    pub fn commit(&mut self) {
        self.committed = self.pending.clone();
    }

    /// Discards pending. Call after a persistence failure.
    pub fn rollback(&mut self) {
        self.pending = self.committed.clone();
    }

    /// Durable state.
    pub fn committed(&self) -> &ValidatorState {
        &self.committed
    }

    /// Speculative state from the last successful [`validate`](Self::validate).
    pub fn pending(&self) -> &ValidatorState {
        &self.pending
    }

    /// Number of committed events.
    pub fn committed_event_count(&self) -> u64 {
        self.committed.event_index
    }

    fn check_sequence(&self, event: &TraceEvent) -> Result<(), ContractError> {
        match event.event_type {
            EventType::TraceStart if self.committed.is_started() => {
                Err(ContractError::TraceAlreadyStarted)
            }
            EventType::TraceStart => Ok(()),
            _ if !self.committed.is_started() => Err(ContractError::TraceNotStarted),
            _ => Ok(()),
        }
    }

    fn check_cross_event(&self, event: &TraceEvent) -> Result<(), ContractError> {
        if event.event_type == EventType::TraceStart {
            // Identifiers on a start event must be derivable from its own content.
            let expected_trace = identity::trace_id(
                &event.policy_hash,
                &event.pipeline_version,
                &event.inputs,
                &event.params_summary,
            )?;
            expect_anchor("traceId", &expected_trace, &event.trace_id)?;
            let expected_scene = identity::scene_id(&event.inputs)?;
            expect_anchor("sceneId", &expected_scene, &event.scene_id)?;
            return expect_event_id(&expected_trace, 0, &event.event_id);
        }

        let (Some(trace_id), Some(scene_id), Some(policy_hash)) = (
            self.committed.trace_id.as_deref(),
            self.committed.scene_id.as_deref(),
            self.committed.policy_hash.as_deref(),
        ) else {
            return Err(ContractError::TraceNotStarted);
        };
        expect_anchor("traceId", trace_id, &event.trace_id)?;
        expect_anchor("sceneId", scene_id, &event.scene_id)?;
        expect_anchor("policyHash", policy_hash, &event.policy_hash)?;
        expect_event_id(trace_id, self.committed.event_index, &event.event_id)
    }

    fn next_state(&self, event: &TraceEvent) -> ValidatorState {
        let mut next = self.committed.clone();
        if event.event_type == EventType::TraceStart {
            next.trace_id = Some(event.trace_id.clone());
            next.scene_id = Some(event.scene_id.clone());
            next.policy_hash = Some(event.policy_hash.clone());
            next.phase = TracePhase::Started;
        }
        if event.event_type.is_terminal() {
            next.phase = TracePhase::Ended;
        }
        next.event_index += 1;
        next.last_event_type = Some(event.event_type);
        next
    }
}

fn schema(field: &'static str, reason: impl Into<String>) -> ContractError {
    ContractError::Schema {
        field,
        reason: reason.into(),
    }
}

fn check_schema(event: &TraceEvent) -> Result<(), ContractError> {
    if event.schema_version != TRACE_SCHEMA_VERSION {
        return Err(schema(
            "schemaVersion",
            format!(
                "unsupported version {}, expected {}",
                event.schema_version, TRACE_SCHEMA_VERSION
            ),
        ));
    }
    if event.entry_type != event.event_type.as_str() {
        return Err(schema(
            "entryType",
            format!(
                "{:?} does not mirror eventType {:?}",
                event.entry_type,
                event.event_type.as_str()
            ),
        ));
    }
    for (field, value) in [
        ("traceId", &event.trace_id),
        ("sceneId", &event.scene_id),
        ("policyHash", &event.policy_hash),
    ] {
        if !is_sha256_hex(value) {
            return Err(schema(field, "expected 64 lowercase hex characters"));
        }
    }
    let (trace_part, _) =
        identity::parse_event_id(&event.event_id).map_err(|err| schema("eventId", err.to_string()))?;
    if trace_part != event.trace_id {
        return Err(schema("eventId", "trace id prefix does not match traceId"));
    }
    check_text(
        "pipelineVersion",
        &event.pipeline_version,
        MAX_PIPELINE_VERSION_CHARS,
    )
    .map_err(|err| schema("pipelineVersion", err.to_string()))?;
    if event.pipeline_version.contains('|') {
        return Err(schema("pipelineVersion", "must not contain '|'"));
    }
    Ok(())
}

fn check_fields(event: &TraceEvent) -> Result<(), ContractError> {
    if event.inputs.len() > MAX_INPUTS {
        return Err(ValidationError::OutOfBounds {
            field: "inputs",
            value: event.inputs.len().to_string(),
        }
        .into());
    }
    identity::validate_inputs(&event.inputs)?;

    if let Some(metrics) = &event.metrics {
        check_metrics(metrics)?;
    }
    if let Some(artifact_ref) = &event.artifact_ref {
        check_text("artifactRef", artifact_ref, MAX_ARTIFACT_REF_CHARS)?;
    }
    if let Some(action_type) = &event.action_type {
        if !action_type_pattern().is_match(action_type) {
            return Err(ValidationError::PatternMismatch {
                field: "actionType",
                value: action_type.clone(),
            }
            .into());
        }
    }

    if event.params_summary.len() > MAX_PARAMS {
        return Err(ValidationError::OutOfBounds {
            field: "paramsSummary",
            value: event.params_summary.len().to_string(),
        }
        .into());
    }
    for (key, value) in &event.params_summary {
        if !param_key_pattern().is_match(key) {
            return Err(ValidationError::PatternMismatch {
                field: "paramsSummary.key",
                value: key.clone(),
            }
            .into());
        }
        let len = value.chars().count();
        if len > MAX_PARAM_VALUE_CHARS {
            return Err(ValidationError::TooLong {
                field: "paramsSummary.value",
                len,
                max: MAX_PARAM_VALUE_CHARS,
            }
            .into());
        }
        if let Some(ch) = value.chars().find(|c| is_control(*c)) {
            return Err(ValidationError::ControlCharacter {
                field: "paramsSummary.value",
                code: ch as u32,
            }
            .into());
        }
    }
    Ok(())
}

fn check_metrics(metrics: &TraceMetrics) -> Result<(), ContractError> {
    if !(0..=MAX_ELAPSED_MS).contains(&metrics.elapsed_ms) {
        return Err(ValidationError::OutOfBounds {
            field: "metrics.elapsedMs",
            value: metrics.elapsed_ms.to_string(),
        }
        .into());
    }
    if let Some(score) = metrics.quality_score {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::OutOfBounds {
                field: "metrics.qualityScore",
                value: score.to_string(),
            }
            .into());
        }
    }
    if let Some(code) = &metrics.error_code {
        check_text("metrics.errorCode", code, MAX_ERROR_CODE_CHARS)?;
        if !error_code_pattern().is_match(code) {
            return Err(ValidationError::PatternMismatch {
                field: "metrics.errorCode",
                value: code.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn check_constraints(event: &TraceEvent) -> Result<(), ContractError> {
    let kind = event.event_type;
    let forbid = |present: bool, field: &'static str| {
        if present {
            Err(ContractError::ForbiddenField {
                field,
                event_type: kind,
            })
        } else {
            Ok(())
        }
    };

    if kind != EventType::TraceStart {
        forbid(!event.inputs.is_empty(), "inputs")?;
        forbid(!event.params_summary.is_empty(), "paramsSummary")?;
    }
    if kind != EventType::ActionStep {
        forbid(event.action_type.is_some(), "actionType")?;
    }
    if kind != EventType::TraceEnd {
        forbid(event.artifact_ref.is_some(), "artifactRef")?;
    }

    match kind {
        EventType::TraceStart => forbid(event.metrics.is_some(), "metrics"),
        EventType::ActionStep => {
            if event.action_type.is_none() {
                return Err(ContractError::MissingField {
                    field: "actionType",
                    event_type: kind,
                });
            }
            forbid(event.metrics.is_some(), "metrics")
        }
        EventType::TraceEnd => {
            let metrics = required_metrics(event)?;
            if !metrics.success {
                return Err(ContractError::ConstraintViolated {
                    event_type: kind,
                    rule: "metrics.success == true",
                });
            }
            forbid(metrics.error_code.is_some(), "metrics.errorCode")
        }
        EventType::TraceFail => {
            let metrics = required_metrics(event)?;
            if metrics.success {
                return Err(ContractError::ConstraintViolated {
                    event_type: kind,
                    rule: "metrics.success == false",
                });
            }
            if metrics.error_code.is_none() {
                return Err(ContractError::MissingField {
                    field: "metrics.errorCode",
                    event_type: kind,
                });
            }
            forbid(metrics.quality_score.is_some(), "metrics.qualityScore")
        }
    }
}

fn required_metrics(event: &TraceEvent) -> Result<&TraceMetrics, ContractError> {
    event
        .metrics
        .as_ref()
        .ok_or(ContractError::MissingField {
            field: "metrics",
            event_type: event.event_type,
        })
}

fn expect_anchor(field: &'static str, expected: &str, actual: &str) -> Result<(), ContractError> {
    if expected != actual {
        return Err(ContractError::AnchorMismatch {
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn expect_event_id(trace_id: &str, index: u64, actual: &str) -> Result<(), ContractError> {
    let expected = identity::event_id(trace_id, index)?;
    if expected != actual {
        return Err(ContractError::SequenceMismatch {
            expected,
            actual: actual.to_string(),
        });
    }
    Ok(())
}
