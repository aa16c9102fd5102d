//! Per-slot icon and count aggregation

use super::config::{DigitConfig, SlotLayout};
use super::digits::{DigitReading, DigitRecognizer};
use crate::frame::{Frame, Region};
use crate::template::{DigitCatalog, TemplateCatalog, TemplateMatcher};
use crate::utils::{CircularMask, ImageUtils};
use crate::{CvError, Result};
use arena_core::{is_placeholder, Count, Side, SlotRecord, SlotSnapshot, Vocabulary};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where per-capture debug images go.
///
/// `capture_dir` is emptied and rewritten on every read; a low-confidence
/// digit read copies it into a timestamped folder under `backup_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDump {
    pub capture_dir: PathBuf,
    pub backup_dir: PathBuf,
}

/// Reads every configured slot of a frame into a `SlotSnapshot`
pub struct SlotAggregator<'a> {
    icons: &'a TemplateCatalog,
    /// Vocabulary column per icon template, index-aligned with the catalog
    columns: Vec<Option<usize>>,
    digits: DigitRecognizer<'a>,
    matcher: TemplateMatcher,
    mask: CircularMask,
    layout: SlotLayout,
    icon_threshold: f32,
    dump: Option<CaptureDump>,
}

impl<'a> SlotAggregator<'a> {
    pub fn new(
        icons: &'a TemplateCatalog,
        digits: &'a DigitCatalog,
        vocabulary: &Vocabulary,
        layout: SlotLayout,
        mask: CircularMask,
        icon_threshold: f32,
        digit_config: DigitConfig,
    ) -> Self {
        let columns = vocabulary.resolve_all(icons.labels());

        for (label, column) in icons.labels().zip(&columns) {
            if column.is_none() && !is_placeholder(label) {
                warn!("Icon '{}' has no feature column and will be ignored", label);
            }
        }

        Self {
            icons,
            columns,
            digits: DigitRecognizer::new(digits, digit_config),
            matcher: TemplateMatcher::new(),
            mask,
            layout,
            icon_threshold,
            dump: None,
        }
    }

    /// Write debug images for every read.
    pub fn with_dump(mut self, dump: CaptureDump) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Identify every slot on both sides.
    ///
    /// Icons are critical: any unidentifiable slot fails the whole read.
    /// Count windows that do not fit the frame read as `Count::Unknown`.
    pub fn read(&self, frame: &Frame) -> Result<SlotSnapshot> {
        if let Some(dump) = &self.dump {
            if let Err(e) = prepare_dir(&dump.capture_dir) {
                warn!("Capture dump disabled for this frame: {}", e);
            } else {
                self.save(frame.image(), &dump.capture_dir.join("frame.png"));
            }
        }

        let mut low_confidence = false;
        let sides = self
            .read_side(
                frame,
                Side::Left,
                &self.layout.left_icons,
                &self.layout.left_counts,
                &mut low_confidence,
            )
            .and_then(|left| {
                let right = self.read_side(
                    frame,
                    Side::Right,
                    &self.layout.right_icons,
                    &self.layout.right_counts,
                    &mut low_confidence,
                )?;
                Ok(SlotSnapshot { left, right })
            });

        // a failed read still keeps the captures of an earlier shaky count
        if low_confidence {
            self.back_up(frame);
        }

        let snapshot = sides?;
        debug!(
            "Slots: {}",
            snapshot
                .iter()
                .map(|r| format!("{} {}={}", r.side, r.label, r.count))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(snapshot)
    }

    fn back_up(&self, frame: &Frame) {
        let Some(dump) = &self.dump else {
            return;
        };
        let stamp = frame.captured_at().format("%Y%m%d_%H%M%S%.3f").to_string();
        match backup_captures(&dump.capture_dir, &dump.backup_dir, &stamp) {
            Ok(dest) => info!("Low-confidence captures backed up to {}", dest.display()),
            Err(e) => warn!("Failed to back up captures: {}", e),
        }
    }

    fn read_side(
        &self,
        frame: &Frame,
        side: Side,
        icons: &[Region],
        counts: &[Region],
        low_confidence: &mut bool,
    ) -> Result<Vec<SlotRecord>> {
        let mut records = Vec::with_capacity(icons.len());

        for (slot, icon_region) in icons.iter().enumerate() {
            let crop = frame.crop(icon_region)?;
            let masked = self.mask.apply(&crop);
            self.dump_image(&masked, &format!("{}_{}_masked.png", side, slot + 1));

            let matched = self
                .matcher
                .match_critical(&masked, self.icons, self.icon_threshold)?;

            let count = match counts.get(slot).and_then(|r| frame.try_crop(r)) {
                Some(window) => {
                    self.dump_image(&window, &format!("{}_num_{}.png", side, slot + 1));
                    let reading = self.digits.recognize(&window);
                    *low_confidence |= reading.low_confidence;
                    log_reading(side, slot, &matched.label, &reading);
                    reading.count
                }
                None => {
                    warn!("{} slot {} has no readable count window", side, slot + 1);
                    Count::Unknown
                }
            };

            records.push(SlotRecord {
                side,
                slot,
                column: self.columns.get(matched.index).copied().flatten(),
                label: matched.label,
                count,
            });
        }

        Ok(records)
    }

    fn dump_image(&self, img: &image::RgbImage, name: &str) {
        if let Some(dump) = &self.dump {
            self.save(img, &dump.capture_dir.join(name));
        }
    }

    fn save(&self, img: &image::RgbImage, path: &Path) {
        if let Err(e) = ImageUtils::save(img, path) {
            warn!("Failed to save capture {}: {}", path.display(), e);
        }
    }
}

fn log_reading(side: Side, slot: usize, label: &str, reading: &DigitReading) {
    if reading.count.is_ambiguous() {
        error!(
            "{} slot {} ({}) count is unreadable despite foreground {:.3}",
            side,
            slot + 1,
            label,
            reading.foreground_ratio
        );
    } else if reading.low_confidence {
        error!(
            "{} slot {} ({}) read {} with low confidence ({:.4})",
            side,
            slot + 1,
            label,
            reading.count,
            reading.best_score.unwrap_or_default()
        );
    }
}

/// Create `dir` if needed and remove the files a previous read left in it.
fn prepare_dir(dir: &Path) -> Result<()> {
    let io_err = |source| CvError::Io {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(io_err)?;
        }
    }
    Ok(())
}

/// Copy every file of `capture_dir` into `backup_dir/<stamp>`.
pub fn backup_captures(capture_dir: &Path, backup_dir: &Path, stamp: &str) -> Result<PathBuf> {
    let dest = backup_dir.join(stamp);
    fs::create_dir_all(&dest).map_err(|source| CvError::Io {
        path: dest.clone(),
        source,
    })?;

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CvError::Io { path, source }
    };

    for entry in fs::read_dir(capture_dir).map_err(io_err(capture_dir))? {
        let entry = entry.map_err(io_err(capture_dir))?;
        let path = entry.path();
        if path.is_file() {
            fs::copy(&path, dest.join(entry.file_name())).map_err(io_err(&path))?;
        }
    }

    Ok(dest)
}
