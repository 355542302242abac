//! Streaming statistics used by the two-pass rules.

pub mod kll_sketch;
pub mod moments;

pub use kll_sketch::KllSketch;
pub use moments::Moments;
