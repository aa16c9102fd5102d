//! Image processing utilities on `image` crate buffers

use crate::{CvError, Result};
use image::{EncodableLayout, GrayImage, ImageBuffer, Luma, PixelWithColorType, RgbImage};
use std::path::Path;

/// Image utility functions
pub struct ImageUtils;

impl ImageUtils {
    /// Load image as RGB
    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| CvError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(img.to_rgb8())
    }

    /// Load image as grayscale
    pub fn load_luma<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| CvError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(img.to_luma8())
    }

    /// Save an image buffer, format chosen by extension
    pub fn save<P, Q>(img: &ImageBuffer<P, Vec<P::Subpixel>>, path: Q) -> Result<()>
    where
        P: PixelWithColorType,
        [P::Subpixel]: EncodableLayout,
        Q: AsRef<Path>,
    {
        let path = path.as_ref();
        img.save(path).map_err(|source| CvError::Image {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Convert RGB to luma (ITU-R 601-2)
    pub fn to_luma(rgb: &RgbImage) -> GrayImage {
        image::imageops::grayscale(rgb)
    }

    /// Pixels brighter than `cut` become 255, everything else 0.
    pub fn binarize(gray: &GrayImage, cut: u8) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mut output = GrayImage::new(width, height);

        for (x, y, pixel) in gray.enumerate_pixels() {
            let value = if pixel[0] > cut { 255u8 } else { 0u8 };
            output.put_pixel(x, y, Luma([value]));
        }

        output
    }

    /// Share of non-zero pixels; 0 for an empty image.
    pub fn foreground_ratio(gray: &GrayImage) -> f32 {
        let total = gray.width() as usize * gray.height() as usize;
        if total == 0 {
            return 0.0;
        }
        let lit = gray.pixels().filter(|p| p[0] != 0).count();
        lit as f32 / total as f32
    }
}
