//! Error taxonomy for the convergence harness.

use std::time::Duration;

use thiserror::Error;

use super::models::counter::CounterState;
use super::models::record::RealizedKey;
use super::ports::errors::StoreError;

/// Format a list of candidate keys as `[a, b, c]`.
fn format_candidates(candidates: &[RealizedKey]) -> String {
    let joined = candidates
        .iter()
        .map(RealizedKey::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

/// Errors surfaced by the harness engine to the scenario boundary.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Timed out after {waited:?} waiting on {table}: expected {expected}, observed {observed}")]
    Timeout {
        table: String,
        expected: String,
        observed: String,
        waited: Duration,
    },

    #[error("Attribute {name} missing from realized record {key}")]
    MissingAttribute { key: RealizedKey, name: String },

    #[error("Attribute {name} on realized record {key}: expected {expected:?}, found {actual:?}")]
    AttributeMismatch {
        key: RealizedKey,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Ambiguous identity in {table}: {} candidate(s) {}", .candidates.len(), format_candidates(.candidates))]
    AmbiguousIdentity {
        table: String,
        candidates: Vec<RealizedKey>,
    },

    #[error("Realized key {key} in {table} already claimed by intent {claimed_by}")]
    IdentityConflict {
        table: String,
        key: RealizedKey,
        claimed_by: String,
    },

    #[error("Removal of {key} from {table} still blocked by {blocker}")]
    BlockingReference {
        table: String,
        key: RealizedKey,
        blocker: String,
    },

    #[error("Unexpected key set in {table}: expected {expected}, observed {observed}")]
    UnexpectedKeys {
        table: String,
        expected: String,
        observed: String,
    },

    #[error("Invalid scenario value: {0}")]
    InvalidValue(String),

    #[error("Invalid counter transition from {from} to {to}")]
    InvalidCounterTransition { from: CounterState, to: CounterState },

    #[error("Store access failed: {0}")]
    Store(#[from] StoreError),
}

impl HarnessError {
    /// True for convergence deadline expiries.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for assertion failures on realized state, which are never retried.
    pub const fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::MissingAttribute { .. }
                | Self::AttributeMismatch { .. }
                | Self::UnexpectedKeys { .. }
        )
    }
}

/// Result alias for engine operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_carries_context() {
        let err = HarnessError::Timeout {
            table: "ASIC_STATE:SAI_OBJECT_TYPE_METER_POLICY".to_string(),
            expected: "at least 2 keys".to_string(),
            observed: "1 keys".to_string(),
            waited: Duration::from_secs(20),
        };
        let msg = err.to_string();
        assert!(msg.contains("SAI_OBJECT_TYPE_METER_POLICY"));
        assert!(msg.contains("at least 2 keys"));
        assert!(msg.contains("1 keys"));
        assert!(err.is_timeout());
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_ambiguous_identity_lists_candidates() {
        let err = HarnessError::AmbiguousIdentity {
            table: "T".to_string(),
            candidates: vec![RealizedKey::from("oid:0x1"), RealizedKey::from("oid:0x2")],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous identity in T: 2 candidate(s) [oid:0x1, oid:0x2]"
        );
    }

    #[test]
    fn test_store_error_converts() {
        let err: HarnessError = StoreError::Connection("refused".to_string()).into();
        assert!(matches!(err, HarnessError::Store(_)));
        assert!(!err.is_timeout());
    }
}
