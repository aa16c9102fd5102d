//! Utility modules

pub mod image;
pub mod mask;

pub use image::ImageUtils;
pub use mask::CircularMask;
