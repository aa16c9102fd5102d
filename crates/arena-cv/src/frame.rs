//! Captured frames and the fixed regions read from them

use crate::utils::ImageUtils;
use crate::{CvError, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Static rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region lies fully inside a `width` x `height` image.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

impl From<[u32; 4]> for Region {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<Region> for [u32; 4] {
    fn from(r: Region) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// One captured screen. Immutable once built.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    /// Wrap a freshly captured image, stamped now.
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Local::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Load a saved screenshot from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ImageUtils::load_rgb(path)?))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy out `region`, failing if it does not fit the frame.
    pub fn crop(&self, region: &Region) -> Result<RgbImage> {
        self.try_crop(region).ok_or(CvError::RegionOutOfBounds {
            region: *region,
            width: self.width(),
            height: self.height(),
        })
    }

    /// Copy out `region`, or `None` if it does not fit the frame.
    pub fn try_crop(&self, region: &Region) -> Option<RgbImage> {
        if !region.fits(self.width(), self.height()) {
            return None;
        }
        Some(
            image::imageops::crop_imm(&self.image, region.x, region.y, region.width, region.height)
                .to_image(),
        )
    }
}
