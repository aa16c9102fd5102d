//! Arena Computer Vision Library
//!
//! Screen perception for the arena agent: fixed-region extraction, template
//! catalogs, zero-mean normalized correlation matching, multi-digit
//! recognition and the slot/screen readers built on top of them.

pub mod bbox;
pub mod detection;
pub mod error;
pub mod frame;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use bbox::DigitCandidate;
pub use detection::{
    ArenaDetector, CaptureDump, DigitConfig, DigitReading, DigitRecognizer, PerceptionConfig,
    ScreenClassifier, SlotAggregator, SlotLayout,
};
pub use error::CvError;
pub use frame::{Frame, Region};
pub use template::{
    Catalogs, CatalogKind, DigitCatalog, DigitTemplate, Importance, MatchOutcome, MatchResult,
    Template, TemplateCatalog, TemplateLoader, TemplateMatcher,
};

// Error handling
pub type Result<T> = std::result::Result<T, CvError>;

/// Core traits for the CV system
pub mod traits {
    use super::*;
    use arena_core::{ScreenState, SlotSnapshot};

    /// What the control loop needs to know about a captured frame.
    pub trait Perception {
        /// Symbolic state of the frame. Never fails: unmatched screens are `Unknown`.
        fn classify(&self, frame: &Frame) -> ScreenState;

        /// Slot readouts for both sides. Icon identification is critical, so
        /// an unidentifiable slot is an error.
        fn read_slots(&self, frame: &Frame) -> Result<SlotSnapshot>;
    }
}
