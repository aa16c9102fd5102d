//! Zero-mean normalized cross-correlation template matching

use super::{Template, TemplateCatalog};
use crate::{CvError, Result};
use image::{ImageBuffer, Luma, Pixel};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Correlation scores over every placement of a template inside a query.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Below this summed squared deviation a patch counts as flat.
const FLAT_ENERGY: f64 = 1e-6;

/// How a below-threshold best match is treated, chosen per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// The caller cannot proceed without a match: failing is an error.
    Critical,
    /// A miss is expected now and then: failing yields `NoMatch`.
    Advisory,
}

/// Best template for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub label: String,
    /// Position of the template in its catalog
    pub index: usize,
    /// Correlation coefficient, negatives clamped to 0
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Matched(MatchResult),
    /// Advisory miss; `best` is the closest template, if any could be scored.
    NoMatch { best: Option<MatchResult> },
}

impl MatchOutcome {
    pub fn label(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched(m) => Some(&m.label),
            MatchOutcome::NoMatch { .. } => None,
        }
    }
}

/// Template with each channel's mean removed, ready to slide over a query.
struct CenteredTemplate {
    width: usize,
    height: usize,
    channels: usize,
    values: Vec<f64>,
    norm: f64,
}

impl CenteredTemplate {
    fn new<P: Pixel<Subpixel = u8>>(template: &ImageBuffer<P, Vec<u8>>) -> Self {
        let (width, height) = template.dimensions();
        let channels = P::CHANNEL_COUNT as usize;
        let raw = template.as_raw();
        let area = (width as usize * height as usize) as f64;

        let mut means = vec![0.0f64; channels];
        for (i, v) in raw.iter().enumerate() {
            means[i % channels] += *v as f64;
        }
        for m in &mut means {
            *m /= area;
        }

        let values: Vec<f64> = raw
            .iter()
            .enumerate()
            .map(|(i, v)| *v as f64 - means[i % channels])
            .collect();
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();

        Self {
            width: width as usize,
            height: height as usize,
            channels,
            values,
            norm,
        }
    }

    fn is_flat(&self) -> bool {
        self.norm * self.norm <= FLAT_ENERGY
    }

    /// Correlation coefficient with the window whose top-left is (`x`, `y`).
    fn correlate(&self, query: &[u8], stride: usize, x: usize, y: usize) -> f32 {
        let mut sums = [0.0f64; 4];
        let mut squares = 0.0f64;
        let mut cross = 0.0f64;
        let row_len = self.width * self.channels;

        for ty in 0..self.height {
            let start = (y + ty) * stride + x * self.channels;
            let window = &query[start..start + row_len];
            let centred = &self.values[ty * row_len..(ty + 1) * row_len];
            for (i, (q, t)) in window.iter().zip(centred).enumerate() {
                let q = *q as f64;
                sums[i % self.channels] += q;
                squares += q * q;
                cross += q * t;
            }
        }

        let area = (self.width * self.height) as f64;
        let energy = squares - sums[..self.channels].iter().map(|s| s * s / area).sum::<f64>();
        if energy <= FLAT_ENERGY {
            return 0.0;
        }

        let coefficient = cross / (self.norm * energy.sqrt());
        if coefficient.is_finite() {
            coefficient.clamp(0.0, 1.0) as f32
        } else {
            0.0
        }
    }
}

/// Stateless matcher over 8-bit buffers of any channel layout
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Zero-mean normalized correlation of `template` at every placement in `query`.
    ///
    /// Each channel's mean is subtracted from both template and window, so a
    /// uniform brightness offset does not change the score. Negative
    /// correlation is clamped to 0, and a flat window or template scores 0.
    /// `None` when the template is larger than the query on either axis.
    pub fn score_map<P>(
        query: &ImageBuffer<P, Vec<u8>>,
        template: &ImageBuffer<P, Vec<u8>>,
    ) -> Option<ScoreMap>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (qw, qh) = query.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > qw || th > qh {
            return None;
        }

        let mut map = ScoreMap::new(qw - tw + 1, qh - th + 1);
        let centred = CenteredTemplate::new(template);
        if centred.is_flat() {
            return Some(map);
        }

        let stride = qw as usize * centred.channels;
        let raw = query.as_raw();
        for (x, y, score) in map.enumerate_pixels_mut() {
            score[0] = centred.correlate(raw, stride, x as usize, y as usize);
        }
        Some(map)
    }

    /// Best-alignment score of one template against the query.
    pub fn score<P: Pixel<Subpixel = u8>>(
        query: &ImageBuffer<P, Vec<u8>>,
        template: &Template<P>,
    ) -> Option<f32> {
        Self::score_map(query, &template.image)
            .map(|map| map.pixels().map(|p| p[0]).fold(0.0f32, f32::max))
    }

    /// Label with the globally highest score in `catalog`.
    ///
    /// Below `threshold`, `Critical` fails with `HardMatchFailure` and
    /// `Advisory` returns `NoMatch`. Ties keep the earlier catalog entry.
    pub fn match_best<P: Pixel<Subpixel = u8> + Send + Sync>(
        &self,
        query: &ImageBuffer<P, Vec<u8>>,
        catalog: &TemplateCatalog<P>,
        importance: Importance,
        threshold: f32,
    ) -> Result<MatchOutcome> {
        let scores = self.score_all(query, catalog);

        let mut best: Option<MatchResult> = None;
        for (index, score) in scores.into_iter().enumerate() {
            let Some(score) = score else {
                continue;
            };
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(MatchResult {
                    label: catalog.templates()[index].label.clone(),
                    index,
                    score,
                });
            }
        }

        match best {
            Some(m) if m.score >= threshold => {
                debug!("{} match: {} ({:.3})", catalog.kind(), m.label, m.score);
                Ok(MatchOutcome::Matched(m))
            }
            best => match importance {
                Importance::Critical => {
                    let (best_label, best_score) = best
                        .map(|m| (Some(m.label), m.score))
                        .unwrap_or((None, 0.0));
                    error!(
                        "No {} match above {:.2}. Best match: {} ({:.3})",
                        catalog.kind(),
                        threshold,
                        best_label.as_deref().unwrap_or("none"),
                        best_score
                    );
                    Err(CvError::HardMatchFailure {
                        kind: catalog.kind(),
                        threshold,
                        best_label,
                        best_score,
                    })
                }
                Importance::Advisory => Ok(MatchOutcome::NoMatch { best }),
            },
        }
    }

    /// `match_best` at critical importance, unwrapped to the match itself.
    pub fn match_critical<P: Pixel<Subpixel = u8> + Send + Sync>(
        &self,
        query: &ImageBuffer<P, Vec<u8>>,
        catalog: &TemplateCatalog<P>,
        threshold: f32,
    ) -> Result<MatchResult> {
        match self.match_best(query, catalog, Importance::Critical, threshold)? {
            MatchOutcome::Matched(m) => Ok(m),
            MatchOutcome::NoMatch { best } => Err(CvError::HardMatchFailure {
                kind: catalog.kind(),
                threshold,
                best_score: best.as_ref().map_or(0.0, |b| b.score),
                best_label: best.map(|b| b.label),
            }),
        }
    }

    /// Score every template, in catalog order.
    fn score_all<P: Pixel<Subpixel = u8> + Send + Sync>(
        &self,
        query: &ImageBuffer<P, Vec<u8>>,
        catalog: &TemplateCatalog<P>,
    ) -> Vec<Option<f32>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            catalog
                .templates()
                .par_iter()
                .map(|template| Self::score(query, template))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            catalog
                .templates()
                .iter()
                .map(|template| Self::score(query, template))
                .collect()
        }
    }
}
