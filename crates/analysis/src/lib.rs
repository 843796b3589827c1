//! StrokeLab Analysis Core
//!
//! Turns a stream of pose frames into a phase-segmented, scored evaluation
//! of one batting stroke:
//! - **Features:** per-frame joint angles and tracked positions
//! - **Velocity:** windowed speeds, accelerations and torso rotation
//! - **Contact:** bat-ball contact from the blended speed peak
//! - **Segmentation:** six-phase timeline driven by adaptive thresholds
//! - **Scoring:** per-phase aggregates mapped to category ratings
//!
//! Stage code is pure computation over in-memory data. I/O is limited to
//! frame sources and the optional stage cache.

pub mod aggregate;
pub mod config;
pub mod contact;
pub mod features;
pub mod pipeline;
pub mod profile;
pub mod scoring;
pub mod segmentation;
pub mod source;
pub mod stream;
pub mod velocity;

pub use config::AnalysisConfig;
pub use contact::ContactDetector;
pub use features::FeatureExtractor;
pub use pipeline::{AnalysisOutput, Signals, StrokeAnalyzer};
pub use scoring::Scorer;
pub use segmentation::PhaseSegmenter;
pub use source::{FrameSource, JsonlFrameSource, VecFrameSource};
pub use stream::StreamingAnalyzer;
pub use velocity::VelocityEstimator;
