//! Velocity estimation over a sliding window of feature vectors.
//!
//! Speeds are backward finite differences across `window` frames divided by
//! the elapsed timestamp, so variable frame rates do not distort them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use strokelab_common::timing::elapsed_secs;
use strokelab_model::signal::{FeatureVector, Metric, TrackedPoint, VelocitySample};

/// Configuration for velocity estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Frames spanned by each difference (k >= 1).
    pub window: usize,

    /// Express speeds in shoulder widths per second.
    pub normalize_by_shoulder_width: bool,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window: 1,
            normalize_by_shoulder_width: true,
        }
    }
}

/// Streaming velocity estimator; one sample out per feature vector in.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    config: VelocityConfig,
    history: VecDeque<FeatureVector>,
    previous: Option<VelocitySample>,
}

impl VelocityEstimator {
    pub fn new(config: VelocityConfig) -> Self {
        let window = config.window.max(1);
        Self {
            config: VelocityConfig { window, ..config },
            history: VecDeque::with_capacity(window + 1),
            previous: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(VelocityConfig::default())
    }

    /// Batch form over a complete sequence.
    pub fn estimate(config: VelocityConfig, features: &[FeatureVector]) -> Vec<VelocitySample> {
        let mut estimator = Self::new(config);
        features.iter().map(|fv| estimator.push(fv)).collect()
    }

    /// Feed the next feature vector and get its velocity sample.
    pub fn push(&mut self, current: &FeatureVector) -> VelocitySample {
        self.history.push_back(current.clone());
        if self.history.len() > self.config.window + 1 {
            self.history.pop_front();
        }

        let mut sample = VelocitySample::missing(current.frame, current.timestamp_ns);

        if self.history.len() == self.config.window + 1 {
            if let Some(oldest) = self.history.front() {
                let elapsed = elapsed_secs(oldest.timestamp_ns, current.timestamp_ns);
                let scale = if self.config.normalize_by_shoulder_width {
                    current.metric(Metric::ShoulderWidth)
                } else {
                    Some(1.0)
                };

                for point in TrackedPoint::ALL {
                    let speed = match (
                        current.position(point),
                        oldest.position(point),
                        elapsed,
                        scale,
                    ) {
                        (Some(now), Some(then), Some(dt), Some(scale)) => {
                            Some(now.distance(&then) / dt / scale)
                        }
                        _ => None,
                    };
                    sample.speed.insert(point, speed);
                }

                sample.torso_rotation = match (
                    current.metric(Metric::TorsoAngle),
                    oldest.metric(Metric::TorsoAngle),
                    elapsed,
                ) {
                    (Some(now), Some(then), Some(dt)) => Some(wrapped_degrees(now - then).abs() / dt),
                    _ => None,
                };
            }
        }

        if let Some(previous) = &self.previous {
            let dt = elapsed_secs(previous.timestamp_ns, current.timestamp_ns);
            for point in TrackedPoint::ALL {
                let acceleration = match (sample.speed_of(point), previous.speed_of(point), dt) {
                    (Some(now), Some(then), Some(dt)) => Some((now - then) / dt),
                    _ => None,
                };
                sample.acceleration.insert(point, acceleration);
            }
        }

        self.previous = Some(sample.clone());
        sample
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.previous = None;
    }
}

/// Fold an angle difference into [-180, 180).
fn wrapped_degrees(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}
