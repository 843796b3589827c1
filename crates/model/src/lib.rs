//! StrokeLab Data Model
//!
//! Defines the data contracts shared by every StrokeLab stage:
//! - **Frames:** per-frame keypoints and bat detections (JSONL input)
//! - **Signals:** derived feature vectors and velocity samples
//! - **Phases:** the six-span stroke timeline and the contact event
//! - **Evaluation:** aggregates, ratings, and the final result record
//! - **Artifacts:** the on-disk output bundle
//!
//! Keypoint coordinates are normalized to `[0.0, 1.0]` relative to the
//! source frame.

pub mod artifacts;
pub mod evaluation;
pub mod frame;
pub mod phase;
pub mod signal;

pub use artifacts::*;
pub use evaluation::*;
pub use frame::*;
pub use phase::*;
pub use signal::*;
