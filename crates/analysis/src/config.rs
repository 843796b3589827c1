//! Analysis configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strokelab_common::error::{StrokeError, StrokeResult};

use crate::contact::ContactConfig;
use crate::features::FeatureConfig;
use crate::profile::ProfileConfig;
use crate::scoring::ScoringConfig;
use crate::segmentation::SegmenterConfig;
use crate::velocity::VelocityConfig;

/// Every tuning value of a pipeline run.
///
/// Missing sections in a config file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub features: FeatureConfig,
    pub velocity: VelocityConfig,
    pub profile: ProfileConfig,
    pub contact: ContactConfig,
    pub segmenter: SegmenterConfig,
    pub scoring: ScoringConfig,
    /// Runs whose fraction of frames with keypoints falls below this are
    /// reported as data-poor.
    pub min_keypoint_coverage: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            velocity: VelocityConfig::default(),
            profile: ProfileConfig::default(),
            contact: ContactConfig::default(),
            segmenter: SegmenterConfig::default(),
            scoring: ScoringConfig::default(),
            min_keypoint_coverage: 0.5,
        }
    }
}

impl AnalysisConfig {
    pub fn is_low_coverage(&self, coverage: f64) -> bool {
        coverage < self.min_keypoint_coverage
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> StrokeResult<Self> {
        if !path.exists() {
            return Err(StrokeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| StrokeError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StrokeResult<()> {
        if self.velocity.window == 0 {
            return Err(StrokeError::config("velocity.window must be at least 1"));
        }

        let percentiles = [
            ("profile.idle_percentile", self.profile.idle_percentile),
            ("profile.swing_percentile", self.profile.swing_percentile),
            ("profile.rotation_percentile", self.profile.rotation_percentile),
        ];
        for (name, value) in percentiles {
            if !(0.0..=100.0).contains(&value) {
                return Err(StrokeError::config(format!("{name} must be within 0..=100")));
            }
        }

        let fractions = [
            ("features.visibility_floor", self.features.visibility_floor),
            ("contact.candidate_start", self.contact.candidate_start),
            ("contact.candidate_end", self.contact.candidate_end),
            ("contact.min_prominence", self.contact.min_prominence),
            ("contact.bat_weight", self.contact.bat_weight),
            ("min_keypoint_coverage", self.min_keypoint_coverage),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrokeError::config(format!("{name} must be within 0..=1")));
            }
        }
        if self.contact.candidate_start >= self.contact.candidate_end {
            return Err(StrokeError::config(
                "contact.candidate_start must be below contact.candidate_end",
            ));
        }

        let factors = [
            ("segmenter.stride_foot_displacement", self.segmenter.stride_foot_displacement),
            ("segmenter.stance_exit_factor", self.segmenter.stance_exit_factor),
            ("segmenter.downswing_entry_factor", self.segmenter.downswing_entry_factor),
            ("segmenter.rotation_entry_factor", self.segmenter.rotation_entry_factor),
            ("segmenter.impact_exit_factor", self.segmenter.impact_exit_factor),
            ("segmenter.recovery_factor", self.segmenter.recovery_factor),
            ("segmenter.recovery_rotation_factor", self.segmenter.recovery_rotation_factor),
            ("profile.idle_floor", self.profile.idle_floor),
            ("profile.swing_floor", self.profile.swing_floor),
            ("profile.rotation_floor", self.profile.rotation_floor),
            ("contact.min_peak", self.contact.min_peak),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value >= 0.0) {
                return Err(StrokeError::config(format!("{name} must be a non-negative number")));
            }
        }
        if self.segmenter.recovery_sustain_frames == 0 {
            return Err(StrokeError::config(
                "segmenter.recovery_sustain_frames must be at least 1",
            ));
        }

        self.scoring.validate()
    }
}
