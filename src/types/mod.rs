//! Shared data structures for the detection loop
//!
//! - Frame: opaque image buffer produced by a frame source
//! - Detection: a single classifier result (label, confidence, geometry)
//! - Position: one GPS fix, immutable once built
//! - DetectionEvent: a sampled detection, persisted and published

mod frame;
mod detection;
mod position;
mod event;

pub use frame::*;
pub use detection::*;
pub use position::*;
pub use event::*;
