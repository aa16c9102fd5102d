//! Multi-digit count recognition
//!
//! Count overlays are white strokes on a busy background and there is no
//! language model to fall back on, so the recognizer has to tell three
//! situations apart: nothing drawn (reads 0), digits drawn and read, and
//! strokes drawn but not readable. The last one must never collapse into a
//! genuine zero; it surfaces as `Count::Ambiguous`.

use super::config::DigitConfig;
use crate::bbox::{self, DigitCandidate};
use crate::template::matcher::ScoreMap;
use crate::template::{DigitCatalog, TemplateMatcher};
use crate::utils::ImageUtils;
use arena_core::Count;
use image::{GrayImage, RgbImage};
use tracing::{debug, error, warn};

/// Result of reading one count window
#[derive(Debug, Clone, PartialEq)]
pub struct DigitReading {
    pub count: Count,
    /// Share of lit pixels after binarization
    pub foreground_ratio: f32,
    /// Highest raw candidate score, when templates were evaluated
    pub best_score: Option<f32>,
    /// Best score fell under the high-confidence bound
    pub low_confidence: bool,
}

/// Reads integers out of count windows using a digit catalog
pub struct DigitRecognizer<'a> {
    catalog: &'a DigitCatalog,
    config: DigitConfig,
}

impl<'a> DigitRecognizer<'a> {
    pub fn new(catalog: &'a DigitCatalog, config: DigitConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &DigitConfig {
        &self.config
    }

    /// Read a count window cropped from a frame.
    pub fn recognize(&self, region: &RgbImage) -> DigitReading {
        let gray = ImageUtils::to_luma(region);
        let binary = ImageUtils::binarize(&gray, self.config.binarize_cut);
        self.recognize_binary(&binary)
    }

    /// Read an already binarized window.
    pub fn recognize_binary(&self, binary: &GrayImage) -> DigitReading {
        let foreground_ratio = ImageUtils::foreground_ratio(binary);

        // Near-empty overlay: a genuine zero, and matching would only invent digits.
        if foreground_ratio < self.config.coverage_floor {
            return DigitReading {
                count: Count::Known(0),
                foreground_ratio,
                best_score: None,
                low_confidence: false,
            };
        }

        let raw = self.candidates(binary);
        let Some(best_score) = bbox::best_score(&raw) else {
            debug!("No digit candidates (foreground {:.3})", foreground_ratio);
            return DigitReading {
                count: Count::Unknown,
                foreground_ratio,
                best_score: None,
                low_confidence: false,
            };
        };

        let low_confidence = best_score < self.config.high_confidence;
        if low_confidence {
            warn!("Highest digit match score is low ({:.4})", best_score);
        }

        DigitReading {
            count: self.resolve(raw),
            foreground_ratio,
            best_score: Some(best_score),
            low_confidence,
        }
    }

    /// Local correlation peaks of every digit template above the threshold.
    pub fn candidates(&self, binary: &GrayImage) -> Vec<DigitCandidate> {
        let mut raw = Vec::new();

        for template in self.catalog.templates() {
            let Some(digit) = template.digit else {
                continue;
            };
            let Some(map) = TemplateMatcher::score_map(binary, &template.image) else {
                continue;
            };
            let (width, height) = template.dimensions();

            for (x, y, score) in local_peaks(&map, self.config.threshold) {
                raw.push(DigitCandidate::new(digit, score, x, y, width, height));
            }
        }

        raw
    }

    /// Suppress overlapping candidates and assemble the survivors left to right.
    ///
    /// Only call this for windows that passed the coverage floor: a zero
    /// assembled here is treated as a misread, not as an empty overlay.
    pub fn resolve(&self, raw: Vec<DigitCandidate>) -> Count {
        let mut selected = bbox::suppress(raw, self.config.max_digits);
        if selected.is_empty() {
            return Count::Unknown;
        }

        selected.sort_by_key(|c| c.x);
        let text: String = selected.iter().map(|c| char::from(b'0' + c.digit)).collect();

        match assemble(&selected) {
            Some(0) => {
                error!("Digits '{}' read as zero despite foreground strokes", text);
                Count::Ambiguous
            }
            Some(value) => Count::Known(value),
            None => {
                error!("Digits '{}' do not fit a count", text);
                Count::Ambiguous
            }
        }
    }
}

/// Positions whose score is the maximum of their 3x3 neighbourhood and
/// reaches `threshold`. Plateaus yield every tied position.
pub fn local_peaks(map: &ScoreMap, threshold: f32) -> Vec<(u32, u32, f32)> {
    let (width, height) = map.dimensions();
    let mut peaks = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let score = map.get_pixel(x, y)[0];
            if score < threshold {
                continue;
            }

            let mut is_peak = true;
            'neighbours: for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    if map.get_pixel(nx, ny)[0] > score {
                        is_peak = false;
                        break 'neighbours;
                    }
                }
            }

            if is_peak {
                peaks.push((x, y, score));
            }
        }
    }

    peaks
}

/// Concatenate digit identities, left to right, into an integer.
fn assemble(ordered: &[DigitCandidate]) -> Option<u32> {
    ordered.iter().try_fold(0u32, |acc, c| {
        acc.checked_mul(10)?.checked_add(u32::from(c.digit))
    })
}
