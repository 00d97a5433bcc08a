//! Color math: luminance, contrast and color-blindness simulation.

pub mod blindness;
pub mod math;

pub use blindness::{simulate_color_blindness, Deficiency};
pub use math::{contrast_ratio, relative_luminance, Rgb};
