//! Outcome dataset cleaning.
//!
//! Three passes, each computed over the rows the previous pass kept:
//! a balance filter on the per-row weighted sum, removal of one-sided and
//! duplicate rows, then a per-column outlier filter. Column statistics use
//! the mean absolute value of the column's non-zero cells.

use crate::persistence::DatasetStore;
use anyhow::Result;
use arena_core::{FeatureVector, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Rows whose balance score leaves [-t, t] are dropped
    pub balance_threshold: f64,
    /// Non-zero cells below this multiple of the column mean are outliers
    pub outlier_low: f64,
    /// Non-zero cells above this multiple of the column mean are outliers
    pub outlier_high: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            balance_threshold: 1.0,
            outlier_low: 0.4,
            outlier_high: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Unbalanced { score: f64, threshold: f64 },
    AllPositive,
    AllNegative,
    /// Same values as the earlier data row `of` (1-based)
    Duplicate { of: usize },
    Outlier { column: String, value: i32, low: f64, high: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Unbalanced { score, threshold } => {
                write!(f, "score={:.4} outside [-{}, {}]", score, threshold, threshold)
            }
            DropReason::AllPositive => f.write_str("all values positive"),
            DropReason::AllNegative => f.write_str("all values negative"),
            DropReason::Duplicate { of } => write!(f, "duplicate of row {}", of),
            DropReason::Outlier { column, value, low, high } => {
                write!(f, "column '{}' value {} outside [{:.3}, {:.3}]", column, value, low, high)
            }
        }
    }
}

/// A row removed by one of the passes
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    /// 1-based position among the data rows as loaded
    pub row: usize,
    pub values: FeatureVector,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub kept: Vec<FeatureVector>,
    pub dropped: Vec<DroppedRow>,
}

/// Row kept so far, with its original position
type Numbered = (usize, FeatureVector);

pub struct DatasetCleaner<'a> {
    vocabulary: &'a Vocabulary,
    config: CleanConfig,
}

impl<'a> DatasetCleaner<'a> {
    pub fn new(vocabulary: &'a Vocabulary, config: CleanConfig) -> Self {
        Self { vocabulary, config }
    }

    /// Load `store`, clean it and return what was kept and dropped. Writes nothing.
    pub fn clean_store(&self, store: &DatasetStore) -> Result<CleanReport> {
        let rows = store.load()?;
        info!("Cleaning {} rows from {}", rows.len(), store.path().display());
        Ok(self.clean(rows))
    }

    pub fn clean(&self, rows: Vec<FeatureVector>) -> CleanReport {
        let rows: Vec<Numbered> = rows.into_iter().enumerate().map(|(i, r)| (i + 1, r)).collect();
        let mut dropped = Vec::new();

        let rows = self.run_pass("balance", rows, &mut dropped, |rows| self.by_balance(rows));
        let rows = self.run_pass("special rows", rows, &mut dropped, |rows| self.special_rows(rows));
        let rows = self.run_pass("outliers", rows, &mut dropped, |rows| self.outliers(rows));

        CleanReport {
            kept: rows.into_iter().map(|(_, r)| r).collect(),
            dropped,
        }
    }

    fn run_pass<F>(&self, name: &str, rows: Vec<Numbered>, dropped: &mut Vec<DroppedRow>, pass: F) -> Vec<Numbered>
    where
        F: FnOnce(&[Numbered]) -> HashMap<usize, DropReason>,
    {
        let mut reasons = pass(&rows);
        let before = rows.len();

        let kept: Vec<Numbered> = rows
            .into_iter()
            .filter_map(|(row, values)| match reasons.remove(&row) {
                Some(reason) => {
                    info!("Dropped row {} ({}): {}", row, reason, self.describe(&values));
                    dropped.push(DroppedRow { row, values, reason });
                    None
                }
                None => Some((row, values)),
            })
            .collect();

        info!("{}: dropped {}, kept {}", name, before - kept.len(), kept.len());
        kept
    }

    /// Weighted row sum, each column scaled by the inverse of its mean magnitude.
    fn by_balance(&self, rows: &[Numbered]) -> HashMap<usize, DropReason> {
        let weights: Vec<f64> = column_means(rows)
            .into_iter()
            .map(|mean| mean.map_or(0.0, |m| 1.0 / m))
            .collect();
        let threshold = self.config.balance_threshold;

        rows.iter()
            .filter_map(|(row, values)| {
                let score: f64 = values
                    .as_slice()
                    .iter()
                    .zip(&weights)
                    .map(|(v, w)| f64::from(*v) * w)
                    .sum();
                (!(-threshold..=threshold).contains(&score))
                    .then_some((*row, DropReason::Unbalanced { score, threshold }))
            })
            .collect()
    }

    /// One-sided rows, then repeats of an earlier surviving row.
    fn special_rows(&self, rows: &[Numbered]) -> HashMap<usize, DropReason> {
        let mut reasons = HashMap::new();
        let mut first_seen: HashMap<&[i32], usize> = HashMap::new();

        for (row, values) in rows {
            let cells = values.as_slice();
            if !cells.is_empty() && cells.iter().all(|v| *v > 0) {
                reasons.insert(*row, DropReason::AllPositive);
            } else if !cells.is_empty() && cells.iter().all(|v| *v < 0) {
                reasons.insert(*row, DropReason::AllNegative);
            } else if let Some(of) = first_seen.get(cells) {
                reasons.insert(*row, DropReason::Duplicate { of: *of });
            } else {
                first_seen.insert(cells, *row);
            }
        }

        reasons
    }

    /// First non-zero cell outside the configured band around its column mean.
    fn outliers(&self, rows: &[Numbered]) -> HashMap<usize, DropReason> {
        let means = column_means(rows);

        rows.iter()
            .filter_map(|(row, values)| {
                values
                    .as_slice()
                    .iter()
                    .zip(&means)
                    .enumerate()
                    .find_map(|(column, (value, mean))| {
                        if *value == 0 {
                            return None;
                        }
                        let mean = (*mean)?;
                        let low = self.config.outlier_low * mean;
                        let high = self.config.outlier_high * mean;
                        let magnitude = f64::from(value.unsigned_abs());
                        (!(low..=high).contains(&magnitude)).then(|| DropReason::Outlier {
                            column: self.column_name(column),
                            value: *value,
                            low,
                            high,
                        })
                    })
                    .map(|reason| (*row, reason))
            })
            .collect()
    }

    fn column_name(&self, column: usize) -> String {
        self.vocabulary
            .labels()
            .get(column)
            .cloned()
            .unwrap_or_else(|| format!("#{}", column))
    }

    /// Non-zero cells as `label=value`.
    fn describe(&self, values: &FeatureVector) -> String {
        values
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(column, v)| format!("{}={}", self.column_name(column), v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Mean absolute value of each column's non-zero cells; `None` for all-zero columns.
fn column_means(rows: &[Numbered]) -> Vec<Option<f64>> {
    let width = rows.first().map_or(0, |(_, r)| r.len());
    let mut sums = vec![0.0f64; width];
    let mut counts = vec![0usize; width];

    for (_, values) in rows {
        for (column, v) in values.as_slice().iter().enumerate().take(width) {
            if *v != 0 {
                sums[column] += f64::from(v.unsigned_abs());
                counts[column] += 1;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["fox", "owl", "dog"])
    }

    fn rows(values: &[[i32; 3]]) -> Vec<FeatureVector> {
        values.iter().map(|v| FeatureVector::from_values(v.to_vec())).collect()
    }

    fn cleaner(vocabulary: &Vocabulary, config: CleanConfig) -> DatasetCleaner<'_> {
        DatasetCleaner::new(vocabulary, config)
    }

    /// Everything off except the pass under test.
    fn loose() -> CleanConfig {
        CleanConfig {
            balance_threshold: f64::INFINITY,
            outlier_low: 0.0,
            outlier_high: f64::INFINITY,
        }
    }

    #[test]
    fn test_balance_filter_drops_lopsided_rows() {
        let vocab = vocab();
        let config = CleanConfig {
            balance_threshold: 1.0,
            ..loose()
        };
        // every column mean is 2, so scores are 0, 2, -1, -2
        let report = cleaner(&vocab, config).clean(rows(&[[2, -2, 0], [2, 0, 2], [-2, 2, -2], [-2, 0, -2]]));

        assert_eq!(report.kept, rows(&[[2, -2, 0], [-2, 2, -2]]));
        assert_eq!(report.dropped.len(), 2);
        assert_eq!(report.dropped[0].row, 2);
        match &report.dropped[0].reason {
            DropReason::Unbalanced { score, .. } => assert!((score - 2.0).abs() < 1e-9),
            other => panic!("unexpected reason {:?}", other),
        }
        assert_eq!(report.dropped[1].row, 4);
    }

    #[test]
    fn test_one_sided_and_repeated_rows_are_dropped() {
        let vocab = vocab();
        let report = cleaner(&vocab, loose()).clean(rows(&[
            [3, -1, 0],
            [1, 2, 3],
            [-1, -1, -4],
            [3, -1, 0],
            [0, 0, 0],
            [0, 0, 0],
        ]));

        assert_eq!(report.kept, rows(&[[3, -1, 0], [0, 0, 0]]));
        let reasons: Vec<(usize, DropReason)> = report.dropped.into_iter().map(|d| (d.row, d.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (2, DropReason::AllPositive),
                (3, DropReason::AllNegative),
                (4, DropReason::Duplicate { of: 1 }),
                (6, DropReason::Duplicate { of: 5 }),
            ]
        );
    }

    #[test]
    fn test_outlier_names_the_column() {
        let vocab = vocab();
        let config = CleanConfig {
            outlier_low: 0.4,
            outlier_high: 2.5,
            ..loose()
        };
        // owl mean 18 / 6 = 3, band [1.2, 7.5]: 1 is low, 9 is high
        let report = cleaner(&vocab, config).clean(rows(&[
            [2, 3, 0],
            [2, -1, 0],
            [-2, 1, 1],
            [2, 1, -1],
            [-2, 9, 0],
            [2, 3, -1],
        ]));

        // rows 2-5 all carry an owl cell outside the band; dog's zeros never count
        assert_eq!(report.kept, rows(&[[2, 3, 0], [2, 3, -1]]));
        assert!(report.dropped.iter().all(|d| matches!(
            &d.reason,
            DropReason::Outlier { column, .. } if column == "owl"
        )));
        assert_eq!(report.dropped.len(), 4);
    }

    #[test]
    fn test_passes_chain_over_survivors() {
        let vocab = vocab();
        let report = cleaner(&vocab, CleanConfig::default()).clean(rows(&[
            [1, -1, 0],
            [1, -1, 0],
            [1, 1, 1],
        ]));

        // row 3 is unbalanced before it can be called all-positive
        assert_eq!(report.kept, rows(&[[1, -1, 0]]));
        assert_eq!(report.dropped[0].row, 3);
        assert!(matches!(report.dropped[0].reason, DropReason::Unbalanced { .. }));
        assert_eq!(report.dropped[1].reason, DropReason::Duplicate { of: 1 });
    }

    #[test]
    fn test_clean_store_reads_through_the_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "fox,owl,dog\n1,-1,0\n1,-1,0\nbad,row\n").unwrap();

        let vocab = vocab();
        let store = DatasetStore::new(&path, vocab.clone());
        let report = cleaner(&vocab, CleanConfig::default()).clean_store(&store).unwrap();
        assert_eq!(report.kept, rows(&[[1, -1, 0]]));

        store.replace_rows(&report.kept).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fox,owl,dog\n1,-1,0\n");
    }

    #[test]
    fn test_drop_reasons_read_well() {
        assert_eq!(DropReason::Duplicate { of: 4 }.to_string(), "duplicate of row 4");
        assert_eq!(
            DropReason::Outlier {
                column: "owl".into(),
                value: 9,
                low: 1.2,
                high: 7.5
            }
            .to_string(),
            "column 'owl' value 9 outside [1.200, 7.500]"
        );
    }
}
