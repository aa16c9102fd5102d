//! Perception configuration
//!
//! Every threshold here is empirically tuned for one device resolution and
//! one art set; none of them is an invariant of the algorithms.

use crate::frame::Region;
use crate::template::loader::DEFAULT_DIGIT_TEMPLATE_CUT;
use crate::template::TemplateDirs;
use crate::utils::CircularMask;
use serde::{Deserialize, Serialize};

/// Main perception configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub template_dirs: TemplateDirs,
    /// Region holding the screen-mode marker
    pub mode_region: Region,
    pub mode_threshold: f32,
    pub icon_threshold: f32,
    pub layout: SlotLayout,
    pub mask: CircularMask,
    pub digits: DigitConfig,
}

/// Fixed card-slot layout. Icon and count windows are index-aligned per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    pub left_icons: Vec<Region>,
    pub left_counts: Vec<Region>,
    pub right_icons: Vec<Region>,
    pub right_counts: Vec<Region>,
}

/// Digit recognition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitConfig {
    /// Minimum correlation for a peak to become a candidate
    pub threshold: f32,
    /// Region pixels brighter than this are digit strokes
    pub binarize_cut: u8,
    /// Cut applied to digit templates when the catalog is loaded
    pub template_cut: u8,
    /// Below this lit-pixel share the window reads as 0 without matching
    pub coverage_floor: f32,
    /// A best raw score under this bound flags the reading as low confidence
    pub high_confidence: f32,
    pub max_digits: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            template_dirs: TemplateDirs::default(),
            mode_region: Region::new(0, 0, 300, 100),
            mode_threshold: 0.8,
            icon_threshold: 0.8,
            layout: SlotLayout::default(),
            mask: CircularMask::default(),
            digits: DigitConfig::default(),
        }
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            left_icons: vec![
                Region::new(474, 910, 112, 112),
                Region::new(594, 910, 112, 112),
                Region::new(714, 910, 112, 112),
            ],
            left_counts: vec![
                Region::new(562, 1000, 40, 30),
                Region::new(682, 1000, 40, 30),
                Region::new(802, 1000, 40, 30),
            ],
            right_icons: vec![
                Region::new(1093, 910, 112, 112),
                Region::new(1213, 910, 112, 112),
                Region::new(1333, 910, 112, 112),
            ],
            right_counts: vec![
                Region::new(1090, 1000, 40, 30),
                Region::new(1210, 1000, 40, 30),
                Region::new(1330, 1000, 40, 30),
            ],
        }
    }
}

impl Default for DigitConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            binarize_cut: 200,
            template_cut: DEFAULT_DIGIT_TEMPLATE_CUT,
            coverage_floor: 0.02,
            high_confidence: 0.9,
            max_digits: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_aligned() {
        let layout = SlotLayout::default();
        assert_eq!(layout.left_icons.len(), layout.left_counts.len());
        assert_eq!(layout.right_icons.len(), layout.right_counts.len());
    }

    #[test]
    fn test_icon_and_count_windows_differ() {
        let layout = SlotLayout::default();
        for icon in layout.left_icons.iter().chain(&layout.right_icons) {
            assert!(!layout.left_counts.contains(icon));
            assert!(!layout.right_counts.contains(icon));
        }
    }
}
