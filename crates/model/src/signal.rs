//! Derived per-frame signals: feature vectors and velocity samples.
//!
//! Every value is an `Option<f64>`; `None` means "could not compute" and is
//! never conflated with a computed zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frame::{FrameIndex, TimestampNs};

/// Biomechanical measurement computed from a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Front shoulder–elbow–wrist angle, degrees [0, 180].
    ElbowAngle,
    /// Front shoulder-to-hip line vs vertical, degrees.
    SpineLean,
    /// Horizontal nose to front-knee distance in shoulder widths.
    HeadKneeOffset,
    /// Front heel to toe direction vs horizontal, degrees.
    FootAngle,
    /// Front ankle x coordinate (normalized).
    FrontFootX,
    /// Shoulder-to-shoulder distance (normalized).
    ShoulderWidth,
    /// Shoulder line angle, degrees.
    TorsoAngle,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::ElbowAngle,
        Metric::SpineLean,
        Metric::HeadKneeOffset,
        Metric::FootAngle,
        Metric::FrontFootX,
        Metric::ShoulderWidth,
        Metric::TorsoAngle,
    ];

    /// Column / display name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::ElbowAngle => "elbow_angle",
            Metric::SpineLean => "spine_lean",
            Metric::HeadKneeOffset => "head_knee_offset",
            Metric::FootAngle => "foot_angle",
            Metric::FrontFootX => "front_foot_x",
            Metric::ShoulderWidth => "shoulder_width",
            Metric::TorsoAngle => "torso_angle",
        }
    }
}

/// Point whose motion is tracked across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedPoint {
    LeadWrist,
    RearWrist,
    FrontAnkle,
    Head,
    BatCenter,
}

impl TrackedPoint {
    pub const ALL: [TrackedPoint; 5] = [
        TrackedPoint::LeadWrist,
        TrackedPoint::RearWrist,
        TrackedPoint::FrontAnkle,
        TrackedPoint::Head,
        TrackedPoint::BatCenter,
    ];
}

/// 2D point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Fixed-shape feature vector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub frame: FrameIndex,
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,
    /// Every [`Metric`] is present as a key.
    pub metrics: BTreeMap<Metric, Option<f64>>,
    /// Every [`TrackedPoint`] is present as a key.
    pub positions: BTreeMap<TrackedPoint, Option<Point2>>,
}

impl FeatureVector {
    /// A vector with every metric and position missing.
    pub fn missing(frame: FrameIndex, timestamp_ns: TimestampNs) -> Self {
        Self {
            frame,
            timestamp_ns,
            metrics: Metric::ALL.iter().map(|m| (*m, None)).collect(),
            positions: TrackedPoint::ALL.iter().map(|p| (*p, None)).collect(),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }

    pub fn position(&self, point: TrackedPoint) -> Option<Point2> {
        self.positions.get(&point).copied().flatten()
    }

    /// Number of metrics with a value.
    pub fn present_count(&self) -> usize {
        self.metrics.values().filter(|v| v.is_some()).count()
    }
}

/// Motion derived from consecutive feature vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocitySample {
    pub frame: FrameIndex,
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,
    /// Speed per tracked point (shoulder widths/s when normalized).
    pub speed: BTreeMap<TrackedPoint, Option<f64>>,
    /// Change of speed per second.
    pub acceleration: BTreeMap<TrackedPoint, Option<f64>>,
    /// Torso angle rate, degrees/s.
    pub torso_rotation: Option<f64>,
}

impl VelocitySample {
    pub fn missing(frame: FrameIndex, timestamp_ns: TimestampNs) -> Self {
        Self {
            frame,
            timestamp_ns,
            speed: TrackedPoint::ALL.iter().map(|p| (*p, None)).collect(),
            acceleration: TrackedPoint::ALL.iter().map(|p| (*p, None)).collect(),
            torso_rotation: None,
        }
    }

    pub fn speed_of(&self, point: TrackedPoint) -> Option<f64> {
        self.speed.get(&point).copied().flatten()
    }

    pub fn acceleration_of(&self, point: TrackedPoint) -> Option<f64> {
        self.acceleration.get(&point).copied().flatten()
    }

    /// Faster of the two wrists; present if either wrist is.
    pub fn wrist_speed(&self) -> Option<f64> {
        match (
            self.speed_of(TrackedPoint::LeadWrist),
            self.speed_of(TrackedPoint::RearWrist),
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vector_has_every_key() {
        let fv = FeatureVector::missing(4, 10);
        assert_eq!(fv.metrics.len(), Metric::ALL.len());
        assert_eq!(fv.positions.len(), TrackedPoint::ALL.len());
        assert_eq!(fv.present_count(), 0);
        assert_eq!(fv.metric(Metric::ElbowAngle), None);
    }

    #[test]
    fn test_wrist_speed_takes_faster_present_wrist() {
        let mut v = VelocitySample::missing(1, 0);
        assert_eq!(v.wrist_speed(), None);

        v.speed.insert(TrackedPoint::RearWrist, Some(1.5));
        assert_eq!(v.wrist_speed(), Some(1.5));

        v.speed.insert(TrackedPoint::LeadWrist, Some(2.5));
        assert_eq!(v.wrist_speed(), Some(2.5));
    }

    #[test]
    fn test_metric_names_are_unique() {
        let mut names: Vec<_> = Metric::ALL.iter().map(|m| m.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Metric::ALL.len());
    }

    #[test]
    fn test_missing_serializes_as_null() {
        let json = serde_json::to_string(&FeatureVector::missing(0, 0)).unwrap();
        assert!(json.contains("\"elbow_angle\":null"));
    }
}
