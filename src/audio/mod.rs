//! Audio input: frame sources, live capture, WAV handling.

pub mod capture;
pub mod source;
pub mod wav;

pub use source::{FrameSource, Framer};
