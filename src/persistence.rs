//! Outcome dataset on disk.
//!
//! A plain CSV: one header row naming the vocabulary in column order, then
//! one winner-positive row per recorded round. Rows are only ever appended;
//! the header alone may be replaced when the vocabulary changes.

use anyhow::{anyhow, Context, Result};
use arena_core::{FeatureVector, OutcomeRecord, Vocabulary};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// What `ensure_header` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// Absent or empty file; a header was written.
    Written,
    /// Header already matched the vocabulary.
    Kept,
    /// A mismatching header was replaced; data rows were preserved.
    Rewritten,
}

pub struct DatasetStore {
    path: PathBuf,
    vocabulary: Vocabulary,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>, vocabulary: Vocabulary) -> Self {
        Self {
            path: path.into(),
            vocabulary,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn header_line(&self) -> String {
        self.vocabulary.labels().join(",")
    }

    /// Make sure the first row is the current vocabulary.
    pub fn ensure_header(&self) -> Result<HeaderStatus> {
        let first = if self.path.exists() {
            let file = File::open(&self.path)
                .with_context(|| format!("Failed to open dataset: {}", self.path.display()))?;
            BufReader::new(file)
                .lines()
                .next()
                .transpose()
                .context("Failed to read dataset header")?
        } else {
            None
        };

        match first {
            None => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                let mut file = File::create(&self.path)
                    .with_context(|| format!("Failed to create dataset: {}", self.path.display()))?;
                writeln!(file, "{}", self.header_line()).context("Failed to write dataset header")?;
                info!("Created dataset {}", self.path.display());
                Ok(HeaderStatus::Written)
            }
            Some(line) => {
                let header: Vec<&str> = line.split(',').collect();
                if self.vocabulary.matches_header(&header) {
                    Ok(HeaderStatus::Kept)
                } else {
                    self.rewrite_header()?;
                    warn!("Dataset header did not match the vocabulary and was rewritten");
                    Ok(HeaderStatus::Rewritten)
                }
            }
        }
    }

    /// Replace the first line, keeping every data row.
    fn rewrite_header(&self) -> Result<()> {
        let source = File::open(&self.path)
            .with_context(|| format!("Failed to open dataset: {}", self.path.display()))?;

        self.replace_with(|writer| {
            for line in BufReader::new(source).lines().skip(1) {
                writeln!(writer, "{}", line.context("Failed to read dataset row")?)?;
            }
            Ok(())
        })
    }

    /// Overwrite the data rows with `rows`, under the current header.
    pub fn replace_rows(&self, rows: &[FeatureVector]) -> Result<()> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.vocabulary.len()) {
            return Err(anyhow!(
                "Row has {} values, vocabulary has {} labels",
                row.len(),
                self.vocabulary.len()
            ));
        }

        self.replace_with(|writer| {
            for row in rows {
                writeln!(writer, "{}", format_row(row.as_slice()))?;
            }
            Ok(())
        })
    }

    /// Write header plus `body` to a temp file in the same dir, then swap it in.
    fn replace_with<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
    {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        let temp_file = NamedTempFile::new_in(parent).context("Failed to create temp file")?;

        {
            let mut writer = BufWriter::new(temp_file.as_file());
            writeln!(writer, "{}", self.header_line())?;
            body(&mut writer)?;
            writer.flush().context("Failed to flush rewritten dataset")?;
        }

        temp_file
            .persist(&self.path)
            .map_err(|e| anyhow!("Failed to replace {}: {}", self.path.display(), e))?;
        Ok(())
    }

    /// Append one outcome row (winner-positive values), writing a header first if needed.
    pub fn append(&self, record: &OutcomeRecord) -> Result<()> {
        if record.values.len() != self.vocabulary.len() {
            return Err(anyhow!(
                "Record has {} values, vocabulary has {} labels",
                record.values.len(),
                self.vocabulary.len()
            ));
        }

        self.ensure_header()?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open dataset for append: {}", self.path.display()))?;

        writeln!(file, "{}", format_row(record.values.as_slice())).context("Failed to write dataset row")?;
        Ok(())
    }

    /// Every data row whose width matches the vocabulary. Malformed rows are skipped.
    pub fn load(&self) -> Result<Vec<FeatureVector>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open dataset: {}", self.path.display()))?;
        let mut rows = Vec::new();

        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("Failed to read line from dataset")?;
            if line_num == 0 || line.trim().is_empty() {
                continue;
            }

            match parse_row(&line, self.vocabulary.len()) {
                Ok(values) => rows.push(FeatureVector::from_values(values)),
                Err(e) => warn!("Skipping dataset line {}: {}", line_num + 1, e),
            }
        }

        Ok(rows)
    }
}

fn format_row(values: &[i32]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

fn parse_row(line: &str, width: usize) -> Result<Vec<i32>> {
    let values = line
        .split(',')
        .map(|field| {
            let field = field.trim();
            // older datasets were written with float cells
            field
                .parse::<i32>()
                .or_else(|_| field.parse::<f64>().map(|f| f as i32))
                .map_err(|_| anyhow!("invalid value '{}'", field))
        })
        .collect::<Result<Vec<_>>>()?;

    if values.len() != width {
        return Err(anyhow!("expected {} columns, found {}", width, values.len()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["knight", "dog", "ice"])
    }

    fn record(values: Vec<i32>) -> OutcomeRecord {
        OutcomeRecord {
            values: FeatureVector::from_values(values),
            left_won: true,
        }
    }

    #[test]
    fn test_header_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(tmp.path().join("results.csv"), vocab());

        assert_eq!(store.ensure_header().unwrap(), HeaderStatus::Written);
        assert_eq!(store.ensure_header().unwrap(), HeaderStatus::Kept);

        store.append(&record(vec![3, -2, 0])).unwrap();
        store.append(&record(vec![0, 1, -4])).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "knight,dog,ice\n3,-2,0\n0,1,-4\n");
    }

    #[test]
    fn test_empty_file_gets_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "").unwrap();

        let store = DatasetStore::new(&path, vocab());
        assert_eq!(store.ensure_header().unwrap(), HeaderStatus::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "knight,dog,ice\n");
    }

    #[test]
    fn test_mismatching_header_rewritten_rows_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "knight,dog\n1,2,3\n4,5,6\n").unwrap();

        let store = DatasetStore::new(&path, vocab());
        assert_eq!(store.ensure_header().unwrap(), HeaderStatus::Rewritten);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "knight,dog,ice\n1,2,3\n4,5,6\n"
        );
        assert_eq!(store.ensure_header().unwrap(), HeaderStatus::Kept);
    }

    #[test]
    fn test_append_rejects_wrong_width() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(tmp.path().join("results.csv"), vocab());
        assert!(store.append(&record(vec![1, 2])).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "knight,dog,ice\n1,2,3\nx,1,1\n1,2\n\n4.0,-5,6\n").unwrap();

        let rows = DatasetStore::new(&path, vocab()).load().unwrap();
        let rows: Vec<&[i32]> = rows.iter().map(|r| r.as_slice()).collect();
        assert_eq!(rows, vec![&[1, 2, 3][..], &[4, -5, 6][..]]);
    }

    #[test]
    fn test_replace_rows_rewrites_body_under_current_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "knight,dog\n1,2,3\n4,5,6\n7,8,9\n").unwrap();

        let store = DatasetStore::new(&path, vocab());
        store
            .replace_rows(&[FeatureVector::from_values(vec![7, 8, 9])])
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "knight,dog,ice\n7,8,9\n");

        assert!(store.replace_rows(&[FeatureVector::from_values(vec![1])]).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "knight,dog,ice\n7,8,9\n");
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(DatasetStore::new(tmp.path().join("absent.csv"), vocab()).load().is_err());
    }
}
