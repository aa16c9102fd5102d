//! Screen-state classification from the mode marker region

use crate::frame::{Frame, Region};
use crate::template::{Importance, MatchOutcome, MatchResult, TemplateCatalog, TemplateMatcher};
use arena_core::ScreenState;
use tracing::{debug, warn};

/// Maps a frame to a `ScreenState` by matching the mode catalog, advisory.
pub struct ScreenClassifier<'a> {
    modes: &'a TemplateCatalog,
    matcher: TemplateMatcher,
    region: Region,
    threshold: f32,
}

impl<'a> ScreenClassifier<'a> {
    pub fn new(modes: &'a TemplateCatalog, region: Region, threshold: f32) -> Self {
        Self {
            modes,
            matcher: TemplateMatcher::new(),
            region,
            threshold,
        }
    }

    pub fn classify(&self, frame: &Frame) -> ScreenState {
        match self.best_mode(frame) {
            Some(m) => ScreenState::from_label(&m.label),
            None => ScreenState::Unknown,
        }
    }

    /// Matched mode template, with its raw label and score.
    pub fn best_mode(&self, frame: &Frame) -> Option<MatchResult> {
        let Some(crop) = frame.try_crop(&self.region) else {
            warn!(
                "Mode region {} does not fit the {}x{} frame",
                self.region,
                frame.width(),
                frame.height()
            );
            return None;
        };

        match self
            .matcher
            .match_best(&crop, self.modes, Importance::Advisory, self.threshold)
        {
            Ok(MatchOutcome::Matched(m)) => Some(m),
            Ok(MatchOutcome::NoMatch { best }) => {
                if let Some(best) = best {
                    debug!("No screen mode; closest {} ({:.3})", best.label, best.score);
                }
                None
            }
            Err(e) => {
                warn!("Mode matching failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{CatalogKind, Template};
    use image::{Rgb, RgbImage};

    const MARKER: Rgb<u8> = Rgb([250, 200, 40]);

    fn pattern(f: impl Fn(u32, u32) -> bool) -> RgbImage {
        RgbImage::from_fn(8, 8, |x, y| if f(x, y) { MARKER } else { Rgb([0, 0, 0]) })
    }

    fn modes() -> TemplateCatalog {
        TemplateCatalog::new(
            CatalogKind::Mode,
            "mods",
            vec![
                Template::new("main", pattern(|x, _| x < 4)),
                Template::new("win2", pattern(|_, y| y < 4)),
                Template::new("interm", pattern(|x, y| x >= 4 && y >= 4)),
            ],
        )
    }

    /// 20x20 frame with the 8x8 mode region at (2, 2) filled by `f`.
    fn frame(f: impl Fn(u32, u32) -> bool) -> Frame {
        let img = RgbImage::from_fn(20, 20, |x, y| {
            let inside = (2..10).contains(&x) && (2..10).contains(&y);
            if inside && f(x - 2, y - 2) { MARKER } else { Rgb([0, 0, 0]) }
        });
        Frame::new(img)
    }

    fn classifier(modes: &TemplateCatalog) -> ScreenClassifier<'_> {
        ScreenClassifier::new(modes, Region::new(2, 2, 8, 8), 0.8)
    }

    #[test]
    fn test_classifies_known_modes() {
        let modes = modes();
        let c = classifier(&modes);

        assert_eq!(c.classify(&frame(|x, _| x < 4)), ScreenState::Main);
        assert_eq!(c.classify(&frame(|_, y| y < 4)), ScreenState::Win);
        assert_eq!(c.classify(&frame(|x, y| x >= 4 && y >= 4)), ScreenState::Intermediate);
    }

    #[test]
    fn test_unmatched_screen_is_unknown() {
        let modes = modes();
        let c = classifier(&modes);

        assert_eq!(c.classify(&frame(|x, y| (x + y) % 2 == 0)), ScreenState::Unknown);
        assert_eq!(c.classify(&frame(|_, _| false)), ScreenState::Unknown);
    }

    #[test]
    fn test_inverted_marker_is_unknown() {
        let modes = modes();
        let c = classifier(&modes);

        // negative of "main": anti-correlated with it, only partly like "interm"
        assert_eq!(c.classify(&frame(|x, _| x >= 4)), ScreenState::Unknown);
    }

    #[test]
    fn test_marker_colour_must_match() {
        let modes = modes();
        let c = classifier(&modes);

        // same shape as "main" drawn in a different hue
        let img = RgbImage::from_fn(20, 20, |x, y| {
            let lit = (2..6).contains(&x) && (2..10).contains(&y);
            if lit { Rgb([40, 200, 250]) } else { Rgb([0, 0, 0]) }
        });
        assert_eq!(c.classify(&Frame::new(img)), ScreenState::Unknown);
    }

    #[test]
    fn test_region_outside_frame_is_unknown() {
        let modes = modes();
        let c = ScreenClassifier::new(&modes, Region::new(15, 15, 8, 8), 0.8);
        assert_eq!(c.classify(&frame(|x, _| x < 4)), ScreenState::Unknown);
    }

    #[test]
    fn test_best_mode_keeps_raw_label() {
        let modes = modes();
        let m = classifier(&modes).best_mode(&frame(|_, y| y < 4)).unwrap();
        assert_eq!(m.label, "win2");
        assert!(m.score > 0.99);
    }
}
