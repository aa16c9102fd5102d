//! Circular icon masking

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

/// Small disc blanked on top of the kept circle, in crop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskHole {
    pub cx: i32,
    pub cy: i32,
    pub radius: u32,
}

/// Shapes an icon crop into a canonical silhouette before matching.
///
/// Keeps the centred disc of `radius`, paints the rest with `fill`, then
/// paints each hole where count overlays render on top of the icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularMask {
    pub radius: u32,
    pub fill: [u8; 3],
    pub holes: Vec<MaskHole>,
}

impl Default for CircularMask {
    fn default() -> Self {
        Self {
            radius: 56,
            fill: [0, 0, 0],
            holes: vec![
                MaskHole { cx: 90, cy: 105, radius: 22 },
                MaskHole { cx: 22, cy: 105, radius: 22 },
            ],
        }
    }
}

impl CircularMask {
    pub fn apply(&self, crop: &RgbImage) -> RgbImage {
        let (width, height) = crop.dimensions();
        let mut keep = GrayImage::new(width, height);
        let centre = ((width / 2) as i32, (height / 2) as i32);
        draw_filled_circle_mut(&mut keep, centre, self.radius as i32, Luma([255]));
        for hole in &self.holes {
            draw_filled_circle_mut(&mut keep, (hole.cx, hole.cy), hole.radius as i32, Luma([0]));
        }

        let fill = Rgb(self.fill);
        RgbImage::from_fn(width, height, |x, y| {
            if keep.get_pixel(x, y)[0] > 0 {
                *crop.get_pixel(x, y)
            } else {
                fill
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_centre_and_fills_corners() {
        let crop = RgbImage::from_pixel(112, 112, Rgb([200, 100, 50]));
        let masked = CircularMask::default().apply(&crop);

        assert_eq!(masked.dimensions(), (112, 112));
        assert_eq!(masked.get_pixel(56, 56), &Rgb([200, 100, 50]));
        assert_eq!(masked.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(masked.get_pixel(111, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_overlay_holes_are_blanked() {
        let crop = RgbImage::from_pixel(112, 112, Rgb([255, 255, 255]));
        let masked = CircularMask::default().apply(&crop);

        // inside the main disc but under the right-hand count overlay
        assert_eq!(masked.get_pixel(90, 100), &Rgb([0, 0, 0]));
        // inside the main disc, clear of both holes
        assert_eq!(masked.get_pixel(56, 20), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_is_deterministic() {
        let crop = RgbImage::from_fn(40, 40, |x, y| Rgb([x as u8, y as u8, 7]));
        let mask = CircularMask {
            radius: 15,
            fill: [9, 9, 9],
            holes: Vec::new(),
        };
        assert_eq!(mask.apply(&crop), mask.apply(&crop));
        assert_eq!(mask.apply(&crop).get_pixel(0, 0), &Rgb([9, 9, 9]));
    }
}
