//! Digit candidates and non-maximum suppression
//!
//! A candidate is one raw correlation peak of one digit template. Overlap is
//! judged per axis on box centres, not by IoU: two glyphs side by side in a
//! count overlay barely overlap in area but must both survive.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Raw correlation peak before suppression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DigitCandidate {
    pub digit: u8,
    pub score: f32,
    /// Top-left corner in region coordinates
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DigitCandidate {
    pub fn new(digit: u8, score: f32, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            digit,
            score,
            x,
            y,
            width,
            height,
        }
    }

    /// Calculate center point
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Closer than half the larger extent on both axes.
    pub fn overlaps(&self, other: &DigitCandidate) -> bool {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let half_w = 0.5 * self.width.max(other.width) as f32;
        let half_h = 0.5 * self.height.max(other.height) as f32;

        (ax - bx).abs() < half_w && (ay - by).abs() < half_h
    }

    /// Descending score; ties resolved left-to-right, then top-to-bottom,
    /// then by digit, so the order is total and repeatable.
    fn rank(&self, other: &DigitCandidate) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.x.cmp(&other.x))
            .then(self.y.cmp(&other.y))
            .then(self.digit.cmp(&other.digit))
    }
}

/// Greedy NMS across all digit identities.
///
/// Accepts the best remaining candidate, drops everything overlapping it, and
/// stops after `max_keep` acceptances. Returned in acceptance order.
pub fn suppress(mut candidates: Vec<DigitCandidate>, max_keep: usize) -> Vec<DigitCandidate> {
    candidates.sort_by(|a, b| a.rank(b));

    let mut keep: Vec<DigitCandidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if keep.len() >= max_keep {
            break;
        }
        if suppressed[i] {
            continue;
        }

        keep.push(candidates[i]);

        for j in (i + 1)..candidates.len() {
            if !suppressed[j] && candidates[i].overlaps(&candidates[j]) {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Highest raw score, if any candidate exists.
pub fn best_score(candidates: &[DigitCandidate]) -> Option<f32> {
    candidates.iter().map(|c| c.score).max_by(|a, b| a.total_cmp(b))
}
