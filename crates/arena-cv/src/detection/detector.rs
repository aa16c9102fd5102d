//! Frame-level perception combining screen classification and slot reading

use super::classifier::ScreenClassifier;
use super::config::PerceptionConfig;
use super::slots::{CaptureDump, SlotAggregator};
use crate::frame::Frame;
use crate::template::Catalogs;
use crate::traits::Perception;
use crate::Result;
use arena_core::{ScreenState, SlotSnapshot, Vocabulary};
use std::time::Instant;
use tracing::debug;

/// Everything the control loop asks of a frame, over one set of catalogs
pub struct ArenaDetector<'a> {
    classifier: ScreenClassifier<'a>,
    aggregator: SlotAggregator<'a>,
}

impl<'a> ArenaDetector<'a> {
    /// Create new detector. Vocabulary columns are resolved here, once.
    pub fn new(catalogs: &'a Catalogs, vocabulary: &Vocabulary, config: &PerceptionConfig) -> Self {
        let classifier =
            ScreenClassifier::new(&catalogs.modes, config.mode_region, config.mode_threshold);
        let aggregator = SlotAggregator::new(
            &catalogs.icons,
            &catalogs.digits,
            vocabulary,
            config.layout.clone(),
            config.mask.clone(),
            config.icon_threshold,
            config.digits.clone(),
        );

        Self {
            classifier,
            aggregator,
        }
    }

    pub fn with_dump(mut self, dump: CaptureDump) -> Self {
        self.aggregator = self.aggregator.with_dump(dump);
        self
    }

    pub fn classifier(&self) -> &ScreenClassifier<'a> {
        &self.classifier
    }

    pub fn aggregator(&self) -> &SlotAggregator<'a> {
        &self.aggregator
    }
}

impl Perception for ArenaDetector<'_> {
    fn classify(&self, frame: &Frame) -> ScreenState {
        let start = Instant::now();
        let state = self.classifier.classify(frame);
        debug!("Screen {} in {} ms", state, start.elapsed().as_millis());
        state
    }

    fn read_slots(&self, frame: &Frame) -> Result<SlotSnapshot> {
        let start = Instant::now();
        let snapshot = self.aggregator.read(frame)?;
        debug!("Slots read in {} ms", start.elapsed().as_millis());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Region;
    use crate::template::{CatalogKind, Template, TemplateCatalog};
    use crate::utils::CircularMask;
    use crate::detection::config::SlotLayout;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    /// 4x4 colour block lit on its left half.
    fn half_lit(colour: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(4, 4, |x, _| if x < 2 { Rgb(colour) } else { Rgb([0, 0, 0]) })
    }

    fn catalogs() -> Catalogs {
        Catalogs {
            icons: TemplateCatalog::new(
                CatalogKind::Icon,
                "slots",
                vec![Template::new("empty1", half_lit([90, 90, 90]))],
            ),
            digits: TemplateCatalog::new(
                CatalogKind::Digit,
                "digits",
                vec![Template::new("1", GrayImage::from_fn(3, 5, |x, _| Luma([if x == 1 { 255 } else { 0 }]))).with_digit(1)],
            ),
            modes: TemplateCatalog::new(
                CatalogKind::Mode,
                "mods",
                vec![Template::new("ingame", half_lit([255, 255, 255]))],
            ),
        }
    }

    fn config() -> PerceptionConfig {
        PerceptionConfig {
            mode_region: Region::new(0, 0, 4, 4),
            layout: SlotLayout {
                left_icons: vec![Region::new(10, 0, 4, 4)],
                left_counts: vec![Region::new(10, 10, 4, 4)],
                right_icons: vec![Region::new(20, 0, 4, 4)],
                right_counts: vec![Region::new(20, 10, 4, 4)],
            },
            mask: CircularMask {
                radius: 10,
                fill: [0, 0, 0],
                holes: Vec::new(),
            },
            ..PerceptionConfig::default()
        }
    }

    #[test]
    fn test_perception_over_synthetic_frame() {
        let catalogs = catalogs();
        let detector = ArenaDetector::new(&catalogs, &Vocabulary::new(["fox"]), &config());

        let frame = Frame::new(RgbImage::from_fn(30, 20, |x, y| {
            let mode = x < 2 && y < 4;
            let icon = ((10..12).contains(&x) || (20..22).contains(&x)) && y < 4;
            if mode {
                Rgb([255, 255, 255])
            } else if icon {
                Rgb([90, 90, 90])
            } else {
                Rgb([0, 0, 0])
            }
        }));

        assert_eq!(detector.classify(&frame), ScreenState::InGame);

        let snapshot = detector.read_slots(&frame).unwrap();
        assert_eq!(snapshot.left.len(), 1);
        assert_eq!(snapshot.right.len(), 1);
        assert!(snapshot.iter().all(|r| r.is_placeholder() && r.column.is_none()));
        assert!(snapshot.iter().all(|r| r.count == arena_core::Count::Known(0)));
    }
}
