use provenance_canonical::{IdentityError, ValidationError};
use thiserror::Error;

use crate::events::EventType;

/// Error returned by a [`TraceSink`](crate::TraceSink).
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Which validation group rejected an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractCategory {
    /// Field formats and version pins.
    Schema,
    /// Per-field bounds and charsets.
    Field,
    /// Trace phase ordering.
    Sequence,
    /// Which fields may appear on which event type.
    Constraint,
    /// Agreement with previously committed events.
    CrossEvent,
}

/// A candidate event broke the trace contract. Nothing was persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    /// Field format or version pin violated.
    #[error("schema violation on {field}: {reason}")]
    Schema {
        /// Offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Field bound or charset violated.
    #[error("invalid field: {0}")]
    Field(#[from] ValidationError),
    /// Inputs or identifiers failed identity validation.
    #[error("identity check failed: {0}")]
    Identity(#[from] IdentityError),
    /// `trace_start` after the trace was already started.
    #[error("trace already started")]
    TraceAlreadyStarted,
    /// Non-start event before `trace_start` was committed.
    #[error("trace not started")]
    TraceNotStarted,
    /// Any event after a committed terminal event.
    #[error("trace already ended")]
    TraceAlreadyEnded,
    /// A field required by the event type is missing.
    #[error("{field} is required on {event_type}")]
    MissingField {
        /// Missing field.
        field: &'static str,
        /// Event type being validated.
        event_type: EventType,
    },
    /// A field the event type does not allow is present.
    #[error("{field} is not allowed on {event_type}")]
    ForbiddenField {
        /// Unexpected field.
        field: &'static str,
        /// Event type being validated.
        event_type: EventType,
    },
    /// A cross-field rule for the event type failed.
    #[error("{event_type} requires {rule}")]
    ConstraintViolated {
        /// Event type being validated.
        event_type: EventType,
        /// The rule that failed.
        rule: &'static str,
    },
    /// An identifier differs from the committed trace anchor.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    AnchorMismatch {
        /// Anchored field.
        field: &'static str,
        /// Committed value.
        expected: String,
        /// Candidate value.
        actual: String,
    },
    /// `eventId` does not carry the next committed index.
    #[error("event id out of sequence: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Re-derived event ID.
        expected: String,
        /// Candidate event ID.
        actual: String,
    },
}

impl ContractError {
    /// Validation group that produced this error.
    pub fn category(&self) -> ContractCategory {
        match self {
            ContractError::Schema { .. } => ContractCategory::Schema,
            ContractError::Field(_) | ContractError::Identity(_) => ContractCategory::Field,
            ContractError::TraceAlreadyStarted
            | ContractError::TraceNotStarted
            | ContractError::TraceAlreadyEnded => ContractCategory::Sequence,
            ContractError::MissingField { .. }
            | ContractError::ForbiddenField { .. }
            | ContractError::ConstraintViolated { .. } => ContractCategory::Constraint,
            ContractError::AnchorMismatch { .. } | ContractError::SequenceMismatch { .. } => {
                ContractCategory::CrossEvent
            }
        }
    }
}

/// Error returned by [`AuditTraceEmitter`](crate::AuditTraceEmitter).
///
/// Only [`EmitError::Persistence`] means a write was attempted.
#[derive(Error, Debug)]
pub enum EmitError {
    /// The event was rejected before any write.
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),
    /// Identifiers could not be derived; nothing was written.
    #[error("identity derivation failed: {0}")]
    Identity(#[from] IdentityError),
    /// The sink failed; the write may be partial and the step was rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[source] SinkError),
}

impl EmitError {
    /// `true` when the trace is terminal and no further events are accepted.
    pub fn is_trace_already_ended(&self) -> bool {
        matches!(self, EmitError::Contract(ContractError::TraceAlreadyEnded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            ContractError::TraceAlreadyEnded.category(),
            ContractCategory::Sequence
        );
        assert_eq!(
            ContractError::ForbiddenField {
                field: "metrics",
                event_type: EventType::ActionStep
            }
            .category(),
            ContractCategory::Constraint
        );
        assert_eq!(
            ContractError::ForbiddenField {
                field: "metrics",
                event_type: EventType::ActionStep
            }
            .to_string(),
            "metrics is not allowed on action_step"
        );
    }
}
