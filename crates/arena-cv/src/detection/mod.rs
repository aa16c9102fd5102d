//! High-level detection module

pub mod classifier;
pub mod config;
pub mod detector;
pub mod digits;
pub mod slots;

pub use classifier::ScreenClassifier;
pub use config::{DigitConfig, PerceptionConfig, SlotLayout};
pub use detector::ArenaDetector;
pub use digits::{DigitReading, DigitRecognizer};
pub use slots::{CaptureDump, SlotAggregator};
