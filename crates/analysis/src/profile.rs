//! Reference motion levels of one clip.
//!
//! Segmentation thresholds are relative to how the batter actually moves in
//! the clip: idle speed, swing speed and rotation rate are percentiles of
//! the clip's own velocity samples, each held above a floor so that an
//! almost motionless clip never trips a boundary.

use serde::{Deserialize, Serialize};
use strokelab_model::signal::VelocitySample;

/// Configuration for the signal profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Percentile (0-100) of wrist speed taken as idle.
    pub idle_percentile: f64,
    /// Percentile (0-100) of wrist speed taken as swing.
    pub swing_percentile: f64,
    /// Percentile (0-100) of torso rotation rate taken as rotating.
    pub rotation_percentile: f64,

    /// Lower bound for idle speed (shoulder widths/s).
    pub idle_floor: f64,
    /// Lower bound for swing speed (shoulder widths/s).
    pub swing_floor: f64,
    /// Lower bound for rotation rate (degrees/s).
    pub rotation_floor: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            idle_percentile: 20.0,
            swing_percentile: 75.0,
            rotation_percentile: 70.0,
            idle_floor: 0.5,
            swing_floor: 4.0,
            rotation_floor: 45.0,
        }
    }
}

/// Reference levels used by the phase segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalProfile {
    pub idle_speed: f64,
    pub swing_speed: f64,
    pub rotation_rate: f64,
    /// Samples with a wrist speed.
    pub speed_samples: usize,
    /// Samples with a rotation rate.
    pub rotation_samples: usize,
}

impl SignalProfile {
    pub fn from_samples(samples: &[VelocitySample], config: &ProfileConfig) -> Self {
        let speeds: Vec<f64> = samples.iter().filter_map(|s| s.wrist_speed()).collect();
        let rotations: Vec<f64> = samples.iter().filter_map(|s| s.torso_rotation).collect();

        let profile = Self {
            idle_speed: floored(percentile(&speeds, config.idle_percentile), config.idle_floor),
            swing_speed: floored(percentile(&speeds, config.swing_percentile), config.swing_floor),
            rotation_rate: floored(
                percentile(&rotations, config.rotation_percentile),
                config.rotation_floor,
            ),
            speed_samples: speeds.len(),
            rotation_samples: rotations.len(),
        };

        tracing::debug!(
            idle = profile.idle_speed,
            swing = profile.swing_speed,
            rotation = profile.rotation_rate,
            samples = profile.speed_samples,
            "Signal profile"
        );
        profile
    }
}

fn floored(value: Option<f64>, floor: f64) -> f64 {
    value.map_or(floor, |v| v.max(floor))
}

/// Linearly interpolated percentile of finite values; `None` when empty.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
