//! Perception errors

use crate::frame::Region;
use crate::template::CatalogKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvError {
    /// A critical-importance match fell below its threshold.
    #[error(
        "no {kind} template reached {threshold:.2} (best: {} at {best_score:.3})",
        .best_label.as_deref().unwrap_or("none")
    )]
    HardMatchFailure {
        kind: CatalogKind,
        threshold: f32,
        best_label: Option<String>,
        best_score: f32,
    },

    #[error("template directory not found: {}", .0.display())]
    MissingCatalog(PathBuf),

    #[error("no usable {kind} templates in {}", .dir.display())]
    EmptyCatalog { kind: CatalogKind, dir: PathBuf },

    #[error("region {region} lies outside the {width}x{height} frame")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("failed to load image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CvError {
    pub fn is_hard_match_failure(&self) -> bool {
        matches!(self, CvError::HardMatchFailure { .. })
    }
}
