//! Fixed-layout binary encoding of admission decisions, hashed for replay audits.
//!
//! Layout version 1, all integers big-endian:
//!
//! ```text
//! layoutVersion(1) | decisionSchemaVersion(2) | policyHash(8) | sessionStableId(8)
//! | candidateStableId(8) | classification(1) | [tag(1) rejectReason(1)]
//! | [tag(1) shedDecision(1)] | [tag(1) shedReason(1)] | degradationLevel(1)
//! | [tag(1) reasonCode(2)] | valueScore(8) | flowBucketCount(1)
//! | perFlowCounters(2 x count) | [tag(1) throttleStats(16)]
//! ```
//!
//! A presence tag of `0` is followed by nothing; `1` by the payload.

use provenance_canonical::sha256;
use thiserror::Error;

/// Binary layout version written as the first byte.
pub const DECISION_LAYOUT_VERSION: u8 = 1;
/// Decision schema version written after the layout version.
pub const DECISION_SCHEMA_VERSION: u16 = 1;
/// Most flow buckets a single-byte count can describe.
pub const MAX_FLOW_BUCKETS: usize = u8::MAX as usize;

// Every fixed field plus the five presence tags, with no optional payloads.
const BASE_LEN: usize = 1 + 2 + 8 + 8 + 8 + 1 + 1 + 1 + 1 + 1 + 1 + 8 + 1 + 1;
const THROTTLE_STATS_LEN: usize = 16;

/// Errors from decision encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecisionHashError {
    /// More per-flow counters than the count byte can express.
    #[error("{count} flow buckets exceed the maximum of {max}")]
    TooManyFlowBuckets {
        /// Number supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// Encoded length disagrees with the layout; nothing is hashed.
    #[error("decision encoding length {actual} does not match expected {expected}")]
    LengthMismatch {
        /// Length computed from the layout.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },
}

/// Admission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Classification {
    /// Admitted at full fidelity.
    Admit = 1,
    /// Admitted at reduced fidelity.
    AdmitDegraded = 2,
    /// Deferred for later admission.
    Defer = 3,
    /// Rejected.
    Reject = 4,
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectReason {
    /// Global capacity exhausted.
    CapacityExhausted = 1,
    /// Per-session rate limit hit.
    RateLimited = 2,
    /// Policy forbids the candidate.
    PolicyDenied = 3,
    /// Candidate value below the admission floor.
    LowValue = 4,
}

/// Whether existing load was shed to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShedDecision {
    /// Nothing was shed.
    Keep = 1,
    /// Lower-value work was shed.
    Shed = 2,
}

/// Why load was shed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShedReason {
    /// Memory pressure.
    MemoryPressure = 1,
    /// Thermal or power budget.
    ThermalBudget = 2,
    /// Higher-value candidate arrived.
    Preempted = 3,
}

/// System degradation level at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DegradationLevel {
    /// Normal operation.
    Normal = 0,
    /// Reduced quality.
    Reduced = 1,
    /// Minimal service.
    Minimal = 2,
    /// Emergency: only critical work admitted.
    Emergency = 3,
}

/// Throttle window counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrottleStats {
    /// Window length in milliseconds.
    pub window_ms: u32,
    /// Candidates admitted in the window.
    pub admitted_in_window: u32,
    /// Candidates throttled in the window.
    pub throttled_in_window: u32,
    /// Window admission ceiling.
    pub max_in_window: u32,
}

/// Fields of a capacity decision that participate in its hash.
///
/// Integer-only: `value_score_micros` carries the value score in millionths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionHashInput {
    /// Decision schema version, normally [`DECISION_SCHEMA_VERSION`].
    pub decision_schema_version: u16,
    /// First eight bytes of the policy digest.
    pub policy_hash: [u8; 8],
    /// Stable session identifier.
    pub session_stable_id: u64,
    /// Stable candidate identifier.
    pub candidate_stable_id: u64,
    /// Admission outcome.
    pub classification: Classification,
    /// Rejection reason, if rejected.
    pub reject_reason: Option<RejectReason>,
    /// Shedding decision, if evaluated.
    pub shed_decision: Option<ShedDecision>,
    /// Shedding reason, if shed.
    pub shed_reason: Option<ShedReason>,
    /// Degradation level.
    pub degradation_level: DegradationLevel,
    /// Free-form numeric reason code.
    pub reason_code: Option<u16>,
    /// Value score in millionths.
    pub value_score_micros: i64,
    /// Per-flow counters; at most [`MAX_FLOW_BUCKETS`].
    pub per_flow_counters: Vec<u16>,
    /// Throttle window counters.
    pub throttle_stats: Option<ThrottleStats>,
}

impl DecisionHashInput {
    /// Length the encoding must have for this combination of optional fields.
    pub fn expected_len(&self) -> usize {
        let mut len = BASE_LEN + 2 * self.per_flow_counters.len();
        if self.reject_reason.is_some() {
            len += 1;
        }
        if self.shed_decision.is_some() {
            len += 1;
        }
        if self.shed_reason.is_some() {
            len += 1;
        }
        if self.reason_code.is_some() {
            len += 2;
        }
        if self.throttle_stats.is_some() {
            len += THROTTLE_STATS_LEN;
        }
        len
    }

    /// Encodes into the version-1 layout, checking the result length.
    pub fn encode(&self) -> Result<Vec<u8>, DecisionHashError> {
        let count = self.per_flow_counters.len();
        if count > MAX_FLOW_BUCKETS {
            return Err(DecisionHashError::TooManyFlowBuckets {
                count,
                max: MAX_FLOW_BUCKETS,
            });
        }

        let mut buf = Vec::with_capacity(self.expected_len());
        buf.push(DECISION_LAYOUT_VERSION);
        buf.extend_from_slice(&self.decision_schema_version.to_be_bytes());
        buf.extend_from_slice(&self.policy_hash);
        buf.extend_from_slice(&self.session_stable_id.to_be_bytes());
        buf.extend_from_slice(&self.candidate_stable_id.to_be_bytes());
        buf.push(self.classification as u8);
        put_optional(&mut buf, self.reject_reason.map(|r| [r as u8]));
        put_optional(&mut buf, self.shed_decision.map(|d| [d as u8]));
        put_optional(&mut buf, self.shed_reason.map(|r| [r as u8]));
        buf.push(self.degradation_level as u8);
        put_optional(&mut buf, self.reason_code.map(u16::to_be_bytes));
        buf.extend_from_slice(&self.value_score_micros.to_be_bytes());
        buf.push(count as u8);
        for counter in &self.per_flow_counters {
            buf.extend_from_slice(&counter.to_be_bytes());
        }
        put_optional(&mut buf, self.throttle_stats.map(encode_throttle));

        check_len(self.expected_len(), buf.len())?;
        Ok(buf)
    }

    /// SHA-256 over [`encode`](Self::encode).
    pub fn decision_hash(&self) -> Result<[u8; 32], DecisionHashError> {
        Ok(sha256(self.encode()?))
    }

    /// Lowercase hex form of [`decision_hash`](Self::decision_hash).
    pub fn decision_hash_hex(&self) -> Result<String, DecisionHashError> {
        Ok(hex::encode(self.decision_hash()?))
    }
}

fn put_optional<const N: usize>(buf: &mut Vec<u8>, payload: Option<[u8; N]>) {
    match payload {
        Some(bytes) => {
            buf.push(1);
            buf.extend_from_slice(&bytes);
        }
        None => buf.push(0),
    }
}

fn encode_throttle(stats: ThrottleStats) -> [u8; THROTTLE_STATS_LEN] {
    let mut out = [0u8; THROTTLE_STATS_LEN];
    out[0..4].copy_from_slice(&stats.window_ms.to_be_bytes());
    out[4..8].copy_from_slice(&stats.admitted_in_window.to_be_bytes());
    out[8..12].copy_from_slice(&stats.throttled_in_window.to_be_bytes());
    out[12..16].copy_from_slice(&stats.max_in_window.to_be_bytes());
    out
}

fn check_len(expected: usize, actual: usize) -> Result<(), DecisionHashError> {
    if expected != actual {
        return Err(DecisionHashError::LengthMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> DecisionHashInput {
        DecisionHashInput {
            decision_schema_version: DECISION_SCHEMA_VERSION,
            policy_hash: [0xAB; 8],
            session_stable_id: 1,
            candidate_stable_id: 2,
            classification: Classification::Admit,
            reject_reason: None,
            shed_decision: None,
            shed_reason: None,
            degradation_level: DegradationLevel::Normal,
            reason_code: None,
            value_score_micros: 750_000,
            per_flow_counters: vec![],
            throttle_stats: None,
        }
    }

    #[test]
    fn absent_optionals_emit_only_tags() {
        let bytes = minimal().encode().unwrap();
        let mut expected = vec![1u8, 0, 1];
        expected.extend_from_slice(&[0xAB; 8]);
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.extend_from_slice(&2u64.to_be_bytes());
        expected.push(1); // classification
        expected.extend_from_slice(&[0, 0, 0]); // reject, shed decision, shed reason
        expected.push(0); // degradation
        expected.push(0); // reason code
        expected.extend_from_slice(&750_000i64.to_be_bytes());
        expected.push(0); // flow bucket count
        expected.push(0); // throttle stats
        assert_eq!(bytes, expected);
        assert_eq!(bytes.len(), BASE_LEN);
    }

    #[test]
    fn present_optionals_follow_their_tags() {
        let mut input = minimal();
        input.classification = Classification::Reject;
        input.reject_reason = Some(RejectReason::RateLimited);
        input.reason_code = Some(0x0102);
        input.per_flow_counters = vec![7, 0xFFFF];
        input.throttle_stats = Some(ThrottleStats {
            window_ms: 1000,
            admitted_in_window: 3,
            throttled_in_window: 4,
            max_in_window: 5,
        });
        let bytes = input.encode().unwrap();
        assert_eq!(bytes.len(), input.expected_len());
        assert_eq!(bytes.len(), BASE_LEN + 1 + 2 + 4 + 16);

        // classification at 27, reject tag + payload at 28..30
        assert_eq!(&bytes[27..30], &[4, 1, 2]);
        // shed decision / shed reason tags absent, degradation, reason code tag + payload
        assert_eq!(&bytes[30..35], &[0, 0, 0, 1, 0x01]);
        assert_eq!(bytes[35], 0x02);
        let counters_at = 36 + 8;
        assert_eq!(bytes[counters_at], 2);
        assert_eq!(&bytes[counters_at + 1..counters_at + 5], &[0, 7, 0xFF, 0xFF]);
        assert_eq!(bytes[counters_at + 5], 1);
        assert_eq!(&bytes[counters_at + 6..counters_at + 10], &1000u32.to_be_bytes());
    }

    #[test]
    fn hash_distinguishes_absent_from_zero() {
        let absent = minimal();
        let mut zero = minimal();
        zero.reason_code = Some(0);
        assert_ne!(absent.decision_hash().unwrap(), zero.decision_hash().unwrap());
    }

    #[test]
    fn fully_populated_hash_is_pinned() {
        let input = DecisionHashInput {
            classification: Classification::AdmitDegraded,
            reject_reason: Some(RejectReason::PolicyDenied),
            shed_decision: Some(ShedDecision::Shed),
            shed_reason: Some(ShedReason::ThermalBudget),
            degradation_level: DegradationLevel::Reduced,
            reason_code: Some(0x0102),
            value_score_micros: -1_250_000,
            per_flow_counters: vec![7, 0xFFFF, 300],
            throttle_stats: Some(ThrottleStats {
                window_ms: 1000,
                admitted_in_window: 3,
                throttled_in_window: 4,
                max_in_window: 5,
            }),
            ..minimal()
        };
        assert_eq!(input.encode().unwrap().len(), 70);
        assert_eq!(
            input.decision_hash_hex().unwrap(),
            "c2f61095597bed73d7ba73abd6e2fbffd13371778e4dcb8ad374efdcc30c3585"
        );
    }

    #[test]
    fn too_many_flow_buckets() {
        let mut input = minimal();
        input.per_flow_counters = vec![0; MAX_FLOW_BUCKETS + 1];
        assert_eq!(
            input.encode(),
            Err(DecisionHashError::TooManyFlowBuckets {
                count: 256,
                max: 255
            })
        );
        input.per_flow_counters.pop();
        assert!(input.encode().is_ok());
    }

    #[test]
    fn length_check_fails_closed() {
        assert_eq!(
            check_len(43, 42),
            Err(DecisionHashError::LengthMismatch {
                expected: 43,
                actual: 42
            })
        );
    }
}
