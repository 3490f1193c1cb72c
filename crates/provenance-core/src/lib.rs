//! Trace events, contract validation and decision hashing for provenance audit trails.
//!
//! This crate provides:
//! - Trace event records (`trace_start`, `action_step`, `trace_end`, `trace_fail`)
//! - A two-phase-commit validator that only advances after a durable write
//! - [`AuditTraceEmitter`], the event-level API that drives validator and sink
//! - A fixed binary layout and hash for admission decisions
//!
//! Core invariants:
//! - Trace and scene identifiers are content-derived and re-checked on `trace_start`
//! - Committed validator state never runs ahead of persisted events
//! - Once a terminal event is attempted the trace accepts nothing else
//!
#![deny(missing_docs)]

/// Fixed-layout decision encoding and hashing.
pub mod decision;
/// Event-level emitter and sink trait.
pub mod emitter;
/// Error types for contract validation and emission.
pub mod errors;
/// Trace event types.
pub mod events;
/// Two-phase-commit trace contract validator.
pub mod validator;

pub use decision::{
    Classification, DecisionHashError, DecisionHashInput, DegradationLevel, RejectReason,
    ShedDecision, ShedReason, ThrottleStats, DECISION_LAYOUT_VERSION, DECISION_SCHEMA_VERSION,
};
pub use emitter::{AuditTraceEmitter, MemorySink, OrphanReport, TraceSink};
pub use errors::{ContractCategory, ContractError, EmitError, SinkError};
pub use events::{BuildMeta, EventType, TraceEvent, TraceMetrics, TRACE_SCHEMA_VERSION};
pub use provenance_canonical::InputDescriptor;
pub use validator::{TraceContractValidator, TracePhase, ValidatorState};
