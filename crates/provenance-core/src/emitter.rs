//! Event-level API for recording one trace.

use provenance_canonical::{identity, InputDescriptor};
use std::collections::BTreeMap;

use crate::errors::{ContractError, EmitError, SinkError};
use crate::events::{BuildMeta, EventType, TraceEvent, TraceMetrics, TRACE_SCHEMA_VERSION};
use crate::validator::TraceContractValidator;

/// Append-only destination for validated trace events.
///
/// Implemented for any `FnMut(&TraceEvent) -> Result<(), SinkError>`, so an
/// NDJSON writer can be plugged in with a closure.
pub trait TraceSink {
    /// Durably appends `event`. Must never update or delete earlier events.
    fn persist(&mut self, event: &TraceEvent) -> Result<(), SinkError>;
}

impl<F> TraceSink for F
where
    F: FnMut(&TraceEvent) -> Result<(), SinkError>,
{
    fn persist(&mut self, event: &TraceEvent) -> Result<(), SinkError> {
        self(event)
    }
}

/// In-memory sink that keeps every persisted event.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Vec<TraceEvent>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events persisted so far, in order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl TraceSink for MemorySink {
    fn persist(&mut self, event: &TraceEvent) -> Result<(), SinkError> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Summary of a trace that started but never committed a terminal event.
///
/// Orphans are an expected outcome of crashes, cancellation and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanReport {
    /// Trace identifier.
    pub trace_id: String,
    /// Events durably committed.
    pub committed_event_count: u64,
    /// Type of the last committed event.
    pub last_committed_event_type: Option<EventType>,
}

/// Records one logical trace: start, zero or more steps, then end or fail.
///
/// Each `emit_*` call derives identifiers, builds the candidate event, validates
/// it, hands it to the sink, and commits only if the sink succeeded. Not
/// reusable across traces and not safe for concurrent use.
pub struct AuditTraceEmitter<S: TraceSink> {
    policy_hash: String,
    pipeline_version: String,
    build_meta: BuildMeta,
    validator: TraceContractValidator,
    sink: S,
    trace_id: Option<String>,
    scene_id: Option<String>,
    next_index: u64,
    is_ended: bool,
}

impl<S: TraceSink> AuditTraceEmitter<S> {
    /// New emitter for one trace under `policy_hash` and `pipeline_version`.
    pub fn new(
        policy_hash: impl Into<String>,
        pipeline_version: impl Into<String>,
        build_meta: BuildMeta,
        sink: S,
    ) -> Self {
        Self {
            policy_hash: policy_hash.into(),
            pipeline_version: pipeline_version.into(),
            build_meta,
            validator: TraceContractValidator::new(),
            sink,
            trace_id: None,
            scene_id: None,
            next_index: 0,
            is_ended: false,
        }
    }

    /// Emits `trace_start` and returns its event ID.
    pub fn emit_start(
        &mut self,
        inputs: Vec<InputDescriptor>,
        params_summary: BTreeMap<String, String>,
    ) -> Result<String, EmitError> {
        self.ensure_open()?;
        let trace_id =
            identity::trace_id(&self.policy_hash, &self.pipeline_version, &inputs, &params_summary)?;
        let scene_id = identity::scene_id(&inputs)?;
        let mut event = self.build(EventType::TraceStart, trace_id, scene_id)?;
        event.inputs = inputs;
        event.params_summary = params_summary;
        self.submit(event)
    }

    /// Emits `action_step` and returns its event ID.
    pub fn emit_step(&mut self, action_type: impl Into<String>) -> Result<String, EmitError> {
        self.ensure_open()?;
        let (trace_id, scene_id) = self.anchors()?;
        let mut event = self.build(EventType::ActionStep, trace_id, scene_id)?;
        event.action_type = Some(action_type.into());
        self.submit(event)
    }

    /// Emits a successful `trace_end` and returns its event ID.
    pub fn emit_end(
        &mut self,
        elapsed_ms: i64,
        quality_score: Option<f64>,
        artifact_ref: Option<String>,
    ) -> Result<String, EmitError> {
        self.ensure_open()?;
        let (trace_id, scene_id) = self.anchors()?;
        let mut event = self.build(EventType::TraceEnd, trace_id, scene_id)?;
        event.metrics = Some(TraceMetrics::success(elapsed_ms, quality_score));
        event.artifact_ref = artifact_ref;
        self.submit(event)
    }

    /// Emits `trace_fail` and returns its event ID.
    pub fn emit_fail(
        &mut self,
        elapsed_ms: i64,
        error_code: impl Into<String>,
    ) -> Result<String, EmitError> {
        self.ensure_open()?;
        let (trace_id, scene_id) = self.anchors()?;
        let mut event = self.build(EventType::TraceFail, trace_id, scene_id)?;
        event.metrics = Some(TraceMetrics::failure(elapsed_ms, error_code));
        self.submit(event)
    }

    /// Trace ID once `trace_start` has been committed.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Number of durably committed events.
    pub fn committed_event_count(&self) -> u64 {
        self.validator.committed_event_count()
    }

    /// `true` once a terminal event has been committed.
    pub fn is_trace_complete(&self) -> bool {
        self.validator.committed().is_ended()
    }

    /// `true` when the trace started but has no committed terminal event.
    pub fn is_trace_orphan(&self) -> bool {
        let committed = self.validator.committed();
        committed.is_started() && !committed.is_ended()
    }

    /// Read-only orphan summary, or `None` for complete or never-started traces.
    pub fn orphan_report(&self) -> Option<OrphanReport> {
        if !self.is_trace_orphan() {
            return None;
        }
        let committed = self.validator.committed();
        let report = OrphanReport {
            trace_id: committed.trace_id.clone()?,
            committed_event_count: committed.event_index,
            last_committed_event_type: committed.last_event_type,
        };
        tracing::debug!(
            trace_id = %report.trace_id,
            committed = report.committed_event_count,
            "orphan trace"
        );
        Some(report)
    }

    /// The sink this emitter writes to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the emitter and returns its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_open(&self) -> Result<(), EmitError> {
        if self.is_ended {
            return Err(ContractError::TraceAlreadyEnded.into());
        }
        Ok(())
    }

    fn anchors(&self) -> Result<(String, String), EmitError> {
        match (&self.trace_id, &self.scene_id) {
            (Some(trace_id), Some(scene_id)) => Ok((trace_id.clone(), scene_id.clone())),
            _ => Err(ContractError::TraceNotStarted.into()),
        }
    }

    fn build(
        &self,
        event_type: EventType,
        trace_id: String,
        scene_id: String,
    ) -> Result<TraceEvent, EmitError> {
        let event_id = identity::event_id(&trace_id, self.next_index)?;
        Ok(TraceEvent {
            schema_version: TRACE_SCHEMA_VERSION,
            event_type,
            entry_type: event_type.as_str().to_string(),
            trace_id,
            scene_id,
            event_id,
            policy_hash: self.policy_hash.clone(),
            pipeline_version: self.pipeline_version.clone(),
            inputs: Vec::new(),
            params_summary: BTreeMap::new(),
            metrics: None,
            artifact_ref: None,
            action_type: None,
            build_meta: self.build_meta.clone(),
        })
    }

    fn submit(&mut self, event: TraceEvent) -> Result<String, EmitError> {
        self.validator.validate(&event)?;
        if event.event_type.is_terminal() {
            // A terminal attempt closes the trace even if the write below fails.
            self.is_ended = true;
        }

        if let Err(err) = self.sink.persist(&event) {
            self.validator.rollback();
            tracing::warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                error = %err,
                "trace event persistence failed; rolled back"
            );
            return Err(EmitError::Persistence(err));
        }

        self.validator.commit();
        self.next_index += 1;
        if event.event_type == EventType::TraceStart {
            self.trace_id = Some(event.trace_id.clone());
            self.scene_id = Some(event.scene_id.clone());
        }
        if event.event_type.is_terminal() {
            tracing::info!(
                trace_id = %event.trace_id,
                event_type = %event.event_type,
                events = self.next_index,
                "trace closed"
            );
        } else {
            tracing::debug!(event_id = %event.event_id, event_type = %event.event_type, "trace event committed");
        }
        Ok(event.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> AuditTraceEmitter<MemorySink> {
        AuditTraceEmitter::new("a".repeat(64), "v1", BuildMeta::new(), MemorySink::new())
    }

    #[test]
    fn start_then_end_completes() {
        let mut emitter = emitter();
        let start_id = emitter.emit_start(vec![], BTreeMap::new()).unwrap();
        assert_eq!(
            start_id,
            "89ae030a70c92c7aa34b3f46904a6eb00fc44a6dc86761a3a5c8809beca34717:0"
        );
        emitter.emit_end(100, Some(0.9), None).unwrap();
        assert!(emitter.is_trace_complete());
        assert!(!emitter.is_trace_orphan());
        assert_eq!(emitter.orphan_report(), None);
        assert_eq!(emitter.sink().events().len(), 2);
    }

    #[test]
    fn start_only_is_orphan() {
        let mut emitter = emitter();
        emitter.emit_start(vec![], BTreeMap::new()).unwrap();
        assert!(emitter.is_trace_orphan());
        let report = emitter.orphan_report().unwrap();
        assert_eq!(report.committed_event_count, 1);
        assert_eq!(report.last_committed_event_type, Some(EventType::TraceStart));
        assert_eq!(Some(report.trace_id.as_str()), emitter.trace_id());
    }

    #[test]
    fn never_started_is_not_orphan() {
        let emitter = emitter();
        assert!(!emitter.is_trace_orphan());
        assert_eq!(emitter.orphan_report(), None);
    }

    #[test]
    fn step_before_start() {
        let mut emitter = emitter();
        let err = emitter.emit_step("load").unwrap_err();
        assert!(matches!(err, EmitError::Contract(ContractError::TraceNotStarted)));
        assert!(emitter.sink().events().is_empty());
    }

    #[test]
    fn identity_errors_surface_before_validation() {
        let mut emitter = emitter();
        let err = emitter
            .emit_start(vec![InputDescriptor::new("a;b")], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, EmitError::Identity(_)));
    }

    #[test]
    fn closure_sink() {
        let mut count = 0usize;
        {
            let sink = |_: &TraceEvent| -> Result<(), SinkError> {
                count += 1;
                Ok(())
            };
            let mut emitter = AuditTraceEmitter::new("b".repeat(64), "v2", BuildMeta::new(), sink);
            emitter.emit_start(vec![], BTreeMap::new()).unwrap();
            emitter.emit_fail(5, "E_ABORT").unwrap();
        }
        assert_eq!(count, 2);
    }
}
