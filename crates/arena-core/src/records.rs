//! Slot readouts, feature vectors and outcome records

use crate::error::IntegrityViolation;
use crate::vocabulary::is_placeholder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which team a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognised unit count of one slot.
///
/// `Unknown` means nothing readable was found; `Ambiguous` is the
/// recognition-failure sentinel and never equals a genuine zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Count {
    Known(u32),
    Unknown,
    Ambiguous,
}

impl Count {
    /// Numeric contribution of this count; unknown counts as zero.
    pub fn value(&self) -> Option<i32> {
        match self {
            Count::Known(n) => Some(i32::try_from(*n).unwrap_or(i32::MAX)),
            Count::Unknown => Some(0),
            Count::Ambiguous => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Count::Ambiguous)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Known(n) => write!(f, "{}", n),
            Count::Unknown => f.write_str("?"),
            Count::Ambiguous => f.write_str("!"),
        }
    }
}

/// One recognised card slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub side: Side,
    pub slot: usize,
    pub label: String,
    /// Vocabulary column of `label`, resolved when the catalog was loaded.
    pub column: Option<usize>,
    pub count: Count,
}

impl SlotRecord {
    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.label)
    }
}

/// Index-aligned slot readouts for both sides of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub left: Vec<SlotRecord>,
    pub right: Vec<SlotRecord>,
}

impl SlotSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &SlotRecord> {
        self.left.iter().chain(self.right.iter())
    }

    pub fn has_ambiguous(&self) -> bool {
        self.iter().any(|r| r.count.is_ambiguous())
    }
}

/// Dense per-label vector in vocabulary column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<i32>);

impl FeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn from_values(values: Vec<i32>) -> Self {
        Self(values)
    }

    /// Prediction input: left counts added, right counts subtracted.
    ///
    /// Ambiguous counts contribute nothing here; they are rejected later when
    /// the outcome record is built.
    pub fn from_snapshot(snapshot: &SlotSnapshot, len: usize) -> Self {
        let mut features = Self::zeros(len);
        features.accumulate(&snapshot.left, 1);
        features.accumulate(&snapshot.right, -1);
        features
    }

    fn accumulate(&mut self, slots: &[SlotRecord], sign: i32) {
        for slot in slots {
            if let (Some(column), Some(value)) = (slot.column, slot.count.value()) {
                if let Some(cell) = self.0.get_mut(column) {
                    *cell = cell.saturating_add(sign * value);
                }
            }
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same vector seen from the other side.
    pub fn negated(&self) -> Self {
        Self(self.0.iter().map(|v| -v).collect())
    }
}

/// Signed dataset row for one finished round: winner positive, loser negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub values: FeatureVector,
    pub left_won: bool,
}

impl OutcomeRecord {
    /// Build the record, rejecting snapshots that must not reach the dataset.
    pub fn build(
        snapshot: &SlotSnapshot,
        len: usize,
        left_won: bool,
    ) -> Result<Self, IntegrityViolation> {
        for record in snapshot.iter() {
            match record.count {
                Count::Ambiguous => {
                    return Err(IntegrityViolation::SentinelEmbedded {
                        side: record.side,
                        slot: record.slot,
                        label: record.label.clone(),
                    });
                }
                count if count.value() == Some(0) && !record.is_placeholder() => {
                    return Err(IntegrityViolation::ZeroCount {
                        side: record.side,
                        slot: record.slot,
                        label: record.label.clone(),
                    });
                }
                _ => {}
            }
        }

        let features = FeatureVector::from_snapshot(snapshot, len);
        let values = if left_won { features } else { features.negated() };
        Ok(Self { values, left_won })
    }
}

/// Running prediction accuracy, owned by the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccuracyTally {
    pub correct: u64,
    pub total: u64,
}

impl AccuracyTally {
    pub fn record(&mut self, predicted_left_win: bool, left_won: bool) {
        self.total += 1;
        if predicted_left_win == left_won {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// True every `every` recorded outcomes.
    pub fn is_retrain_due(&self, every: u64) -> bool {
        every > 0 && self.total > 0 && self.total % every == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(side: Side, slot: usize, label: &str, column: Option<usize>, count: Count) -> SlotRecord {
        SlotRecord {
            side,
            slot,
            label: label.to_string(),
            column,
            count,
        }
    }

    fn snapshot(left: Vec<SlotRecord>, right: Vec<SlotRecord>) -> SlotSnapshot {
        SlotSnapshot { left, right }
    }

    #[test]
    fn test_features_sum_duplicates_and_negate_right() {
        let snap = snapshot(
            vec![
                slot(Side::Left, 0, "dog", Some(0), Count::Known(5)),
                slot(Side::Left, 1, "dog", Some(0), Count::Known(2)),
                slot(Side::Left, 2, "empty1", None, Count::Unknown),
            ],
            vec![
                slot(Side::Right, 0, "pig", Some(2), Count::Known(3)),
                slot(Side::Right, 1, "dog", Some(0), Count::Known(1)),
            ],
        );

        let features = FeatureVector::from_snapshot(&snap, 3);
        assert_eq!(features.as_slice(), &[6, 0, -3]);
    }

    #[test]
    fn test_outcome_winner_positive() {
        let snap = snapshot(
            vec![slot(Side::Left, 0, "dog", Some(0), Count::Known(4))],
            vec![slot(Side::Right, 0, "pig", Some(1), Count::Known(7))],
        );

        let won = OutcomeRecord::build(&snap, 2, true).unwrap();
        assert_eq!(won.values.as_slice(), &[4, -7]);
        assert!(won.left_won);

        let lost = OutcomeRecord::build(&snap, 2, false).unwrap();
        assert_eq!(lost.values.as_slice(), &[-4, 7]);
    }

    #[test]
    fn test_outcome_with_sentinel_is_rejected() {
        // counts [5, -3, sentinel, 2]
        let snap = snapshot(
            vec![
                slot(Side::Left, 0, "dog", Some(0), Count::Known(5)),
                slot(Side::Left, 1, "ice", Some(1), Count::Ambiguous),
            ],
            vec![
                slot(Side::Right, 0, "pig", Some(2), Count::Known(3)),
                slot(Side::Right, 1, "sheep", Some(3), Count::Known(2)),
            ],
        );

        let err = OutcomeRecord::build(&snap, 4, true).unwrap_err();
        assert_eq!(
            err,
            IntegrityViolation::SentinelEmbedded {
                side: Side::Left,
                slot: 1,
                label: "ice".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_count_on_unit_is_rejected() {
        let snap = snapshot(
            vec![slot(Side::Left, 0, "dog", Some(0), Count::Known(3))],
            vec![slot(Side::Right, 0, "pig", Some(1), Count::Unknown)],
        );

        let err = OutcomeRecord::build(&snap, 2, false).unwrap_err();
        assert!(matches!(err, IntegrityViolation::ZeroCount { side: Side::Right, .. }));
    }

    #[test]
    fn test_placeholder_zero_is_allowed() {
        let snap = snapshot(
            vec![slot(Side::Left, 0, "dog", Some(0), Count::Known(3))],
            vec![slot(Side::Right, 0, "empty2", None, Count::Known(0))],
        );

        let record = OutcomeRecord::build(&snap, 1, true).unwrap();
        assert_eq!(record.values.as_slice(), &[3]);
    }

    #[test]
    fn test_tally_and_cadence() {
        let mut tally = AccuracyTally::default();
        assert_eq!(tally.accuracy(), 0.0);

        tally.record(true, true);
        tally.record(true, false);
        assert_eq!(tally.correct, 1);
        assert_eq!(tally.total, 2);
        assert!((tally.accuracy() - 0.5).abs() < 1e-9);

        assert!(tally.is_retrain_due(2));
        assert!(!tally.is_retrain_due(3));
        assert!(!tally.is_retrain_due(0));
    }
}
