//! Phase segmentation state machine.
//!
//! The segmenter walks the ordered `(FeatureVector, VelocitySample)` stream
//! once. Its state is the current [`Phase`]; the only move out of a state is
//! to `Phase::next()`, except that a known contact frame forces Impact from
//! any earlier phase. Skipped phases become empty spans, and `finish`
//! closes whatever is open at the last frame, so six spans always come out.

use serde::{Deserialize, Serialize};
use strokelab_model::frame::FrameIndex;
use strokelab_model::phase::{Phase, PhaseTimeline};
use strokelab_model::signal::{FeatureVector, Metric, VelocitySample};

use crate::profile::SignalProfile;

/// Boundary thresholds, as factors of the clip's [`SignalProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Front-foot travel from its first position, in shoulder widths.
    pub stride_foot_displacement: f64,
    /// Stance ends when wrist speed exceeds `idle * factor`.
    pub stance_exit_factor: f64,
    /// Downswing starts when wrist speed exceeds `swing * factor`.
    pub downswing_entry_factor: f64,
    /// ...or when torso rotation exceeds `rotation * factor`.
    pub rotation_entry_factor: f64,
    /// Impact ends when wrist speed drops below `swing * factor`.
    pub impact_exit_factor: f64,
    /// Recovery needs wrist speed below `idle * factor`.
    pub recovery_factor: f64,
    /// ...and torso rotation below `rotation * factor` when known.
    pub recovery_rotation_factor: f64,
    /// Consecutive quiet frames required to enter Recovery.
    pub recovery_sustain_frames: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            stride_foot_displacement: 0.5,
            stance_exit_factor: 1.5,
            downswing_entry_factor: 0.7,
            rotation_entry_factor: 1.0,
            impact_exit_factor: 0.9,
            recovery_factor: 1.2,
            recovery_rotation_factor: 0.5,
            recovery_sustain_frames: 3,
        }
    }
}

/// Streaming phase segmenter.
#[derive(Debug, Clone)]
pub struct PhaseSegmenter {
    config: SegmenterConfig,
    profile: SignalProfile,
    contact: Option<FrameIndex>,

    phase: Phase,
    entered: [Option<FrameIndex>; 6],
    first: Option<FrameIndex>,
    last: Option<FrameIndex>,

    foot_origin: Option<f64>,
    previous_speed: Option<f64>,
    previous_frame: Option<FrameIndex>,
    quiet_run: Option<(FrameIndex, u32)>,
}

impl PhaseSegmenter {
    /// `contact` is the detected contact frame, if any.
    pub fn new(config: SegmenterConfig, profile: SignalProfile, contact: Option<FrameIndex>) -> Self {
        Self {
            config,
            profile,
            contact,
            phase: Phase::Stance,
            entered: [None; 6],
            first: None,
            last: None,
            foot_origin: None,
            previous_speed: None,
            previous_frame: None,
            quiet_run: None,
        }
    }

    /// Phase the machine is currently in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consume the next frame. Frames must arrive in increasing order.
    pub fn push(&mut self, features: &FeatureVector, velocity: &VelocitySample) -> Phase {
        let frame = features.frame;
        let speed = velocity.wrist_speed();

        if self.foot_origin.is_none() {
            self.foot_origin = features.metric(Metric::FrontFootX);
        }

        if self.first.is_none() {
            self.first = Some(frame);
            self.entered[Phase::Stance.ordinal()] = Some(frame);
            if self.contact == Some(frame) {
                self.enter(Phase::Impact, frame);
            }
        } else if self.contact == Some(frame) && self.phase < Phase::Impact {
            self.enter(Phase::Impact, frame);
        } else if let Some((next, start)) = self.transition(frame, features, velocity, speed) {
            self.enter(next, start);
        }

        self.previous_speed = speed;
        self.previous_frame = Some(frame);
        self.last = Some(frame);
        self.phase
    }

    /// Close the open phase at the last frame; `None` if nothing was pushed.
    pub fn finish(self) -> Option<PhaseTimeline> {
        let first = self.first?;
        let last = self.last?;
        Some(PhaseTimeline::from_entries(first, last.saturating_add(1), self.entered))
    }

    /// Check the boundary leaving the current phase. Returns the next phase
    /// and the frame it starts at.
    fn transition(
        &mut self,
        frame: FrameIndex,
        features: &FeatureVector,
        velocity: &VelocitySample,
        speed: Option<f64>,
    ) -> Option<(Phase, FrameIndex)> {
        let cfg = &self.config;
        let profile = &self.profile;
        let next = self.phase.next()?;
        let rotation = velocity.torso_rotation;

        let fires = match self.phase {
            Phase::Stance => {
                let displaced = match (
                    features.metric(Metric::FrontFootX),
                    self.foot_origin,
                    features.metric(Metric::ShoulderWidth),
                ) {
                    (Some(x), Some(origin), Some(width)) => {
                        (x - origin).abs() / width > cfg.stride_foot_displacement
                    }
                    _ => false,
                };
                displaced || above(speed, profile.idle_speed * cfg.stance_exit_factor)
            }
            Phase::Stride => {
                above(speed, profile.swing_speed * cfg.downswing_entry_factor)
                    || above(rotation, profile.rotation_rate * cfg.rotation_entry_factor)
            }
            Phase::Downswing => {
                // With a known contact frame, Impact is entered only there.
                if self.contact.is_some() {
                    false
                } else if let (Some(prev), Some(now), Some(peak_frame)) =
                    (self.previous_speed, speed, self.previous_frame)
                {
                    if prev > profile.swing_speed && prev > now {
                        return Some((next, peak_frame));
                    }
                    false
                } else {
                    false
                }
            }
            Phase::Impact => {
                self.contact != Some(frame)
                    && below(speed, profile.swing_speed * cfg.impact_exit_factor)
            }
            Phase::FollowThrough => {
                let quiet = below(speed, profile.idle_speed * cfg.recovery_factor)
                    && rotation.map_or(true, |r| {
                        r < profile.rotation_rate * cfg.recovery_rotation_factor
                    });
                if !quiet {
                    self.quiet_run = None;
                    return None;
                }
                let (start, count) = match self.quiet_run {
                    Some((start, count)) => (start, count + 1),
                    None => (frame, 1),
                };
                self.quiet_run = Some((start, count));
                if count >= self.config.recovery_sustain_frames.max(1) {
                    return Some((next, start));
                }
                false
            }
            Phase::Recovery => false,
        };

        fires.then_some((next, frame))
    }

    fn enter(&mut self, phase: Phase, start: FrameIndex) {
        tracing::debug!(from = %self.phase, to = %phase, frame = start, "Phase transition");
        self.entered[phase.ordinal()] = Some(start);
        self.phase = phase;
        self.quiet_run = None;
    }
}

/// Segment a complete sequence in one call.
pub fn segment(
    config: &SegmenterConfig,
    profile: SignalProfile,
    contact: Option<FrameIndex>,
    features: &[FeatureVector],
    velocity: &[VelocitySample],
) -> Option<PhaseTimeline> {
    let mut segmenter = PhaseSegmenter::new(config.clone(), profile, contact);
    for (fv, vs) in features.iter().zip(velocity) {
        segmenter.push(fv, vs);
    }
    segmenter.finish()
}

fn above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v > threshold)
}

fn below(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v < threshold)
}
