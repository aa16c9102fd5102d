//! Arena domain model
//!
//! Pixel-free types shared by the perception pipeline and the control loop:
//! the label vocabulary, symbolic screen states, slot readouts and the
//! signed outcome records handed to the dataset.

pub mod error;
pub mod records;
pub mod state;
pub mod vocabulary;

pub use error::IntegrityViolation;
pub use records::{
    AccuracyTally, Count, FeatureVector, OutcomeRecord, Side, SlotRecord, SlotSnapshot,
};
pub use state::ScreenState;
pub use vocabulary::{is_placeholder, Vocabulary};
