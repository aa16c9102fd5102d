//! Record integrity errors

use crate::records::Side;
use thiserror::Error;

/// Reasons an outcome record is dropped before it reaches the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    #[error("recognition-failure sentinel in {side} slot {slot} ({label})")]
    SentinelEmbedded {
        side: Side,
        slot: usize,
        label: String,
    },

    #[error("non-placeholder {side} slot {slot} ({label}) has a zero count")]
    ZeroCount {
        side: Side,
        slot: usize,
        label: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let err = IntegrityViolation::ZeroCount {
            side: Side::Right,
            slot: 2,
            label: "knight".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "non-placeholder right slot 2 (knight) has a zero count"
        );
    }
}
