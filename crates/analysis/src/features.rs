//! Per-frame feature extraction.
//!
//! Every metric is computed from a fixed set of joints on the batter's
//! front side. A joint that is absent, below the visibility floor, or not a
//! finite number makes the metrics that need it missing; so does a
//! zero-length segment.

use serde::{Deserialize, Serialize};
use strokelab_model::frame::{FrameRecord, Joint, Side};
use strokelab_model::signal::{FeatureVector, Metric, Point2, TrackedPoint};

/// Configuration for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Side facing the bowler (left for a right-handed batter).
    pub front_side: Side,

    /// Keypoints with visibility below this are treated as missing.
    pub visibility_floor: f64,

    /// Bat boxes with confidence below this are ignored.
    pub bat_confidence_floor: f64,

    /// Segments shorter than this (normalized units) are degenerate.
    pub min_segment_length: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            front_side: Side::Left,
            visibility_floor: 0.5,
            bat_confidence_floor: 0.25,
            min_segment_length: 1e-4,
        }
    }
}

/// Stateless frame-to-features transform.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FeatureConfig::default())
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the feature vector of one frame.
    pub fn extract(&self, frame: &FrameRecord) -> FeatureVector {
        let front = self.config.front_side;
        let rear = front.opposite();
        let mut features = FeatureVector::missing(frame.index, frame.timestamp_ns);

        let front_shoulder = self.point(frame, Joint::shoulder(front));
        let rear_shoulder = self.point(frame, Joint::shoulder(rear));
        let elbow = self.point(frame, Joint::elbow(front));
        let wrist = self.point(frame, Joint::wrist(front));
        let hip = self.point(frame, Joint::hip(front));
        let knee = self.point(frame, Joint::knee(front));
        let ankle = self.point(frame, Joint::ankle(front));
        let heel = self.point(frame, Joint::heel(front));
        let toe = self.point(frame, Joint::foot_index(front));
        let nose = self.point(frame, Joint::Nose);

        let shoulder_width = match (front_shoulder, rear_shoulder) {
            (Some(a), Some(b)) => self.non_degenerate(a.distance(&b)),
            _ => None,
        };

        let elbow_angle = match (front_shoulder, elbow, wrist) {
            (Some(s), Some(e), Some(w)) => self.joint_angle(s, e, w),
            _ => None,
        };

        let spine_lean = match (front_shoulder, hip) {
            (Some(s), Some(h)) => self.incline(h, s, Axis::Vertical),
            _ => None,
        };

        let head_knee_offset = match (nose, knee, shoulder_width) {
            (Some(n), Some(k), Some(width)) => Some((n.x - k.x).abs() / width),
            _ => None,
        };

        let foot_angle = match (heel, toe) {
            (Some(h), Some(t)) => self.incline(h, t, Axis::Horizontal),
            _ => None,
        };

        // Left-to-right shoulder line, independent of batting side.
        let torso_angle = match (
            self.point(frame, Joint::LeftShoulder),
            self.point(frame, Joint::RightShoulder),
        ) {
            (Some(l), Some(r)) if l.distance(&r) >= self.config.min_segment_length => {
                Some((r.y - l.y).atan2(r.x - l.x).to_degrees())
            }
            _ => None,
        };

        features.metrics.insert(Metric::ElbowAngle, elbow_angle);
        features.metrics.insert(Metric::SpineLean, spine_lean);
        features.metrics.insert(Metric::HeadKneeOffset, head_knee_offset);
        features.metrics.insert(Metric::FootAngle, foot_angle);
        features.metrics.insert(Metric::FrontFootX, ankle.map(|a| a.x));
        features.metrics.insert(Metric::ShoulderWidth, shoulder_width);
        features.metrics.insert(Metric::TorsoAngle, torso_angle);

        let bat_center = frame
            .bat
            .filter(|bat| bat.confidence >= self.config.bat_confidence_floor)
            .map(|bat| bat.center())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| Point2::new(x, y));

        features.positions.insert(TrackedPoint::LeadWrist, wrist);
        features
            .positions
            .insert(TrackedPoint::RearWrist, self.point(frame, Joint::wrist(rear)));
        features.positions.insert(TrackedPoint::FrontAnkle, ankle);
        features.positions.insert(TrackedPoint::Head, nose);
        features.positions.insert(TrackedPoint::BatCenter, bat_center);

        features
    }

    fn point(&self, frame: &FrameRecord, joint: Joint) -> Option<Point2> {
        frame
            .keypoint(joint)
            .filter(|kp| kp.is_finite())
            .filter(|kp| kp.visibility.map_or(true, |v| v >= self.config.visibility_floor))
            .map(|kp| Point2::new(kp.x, kp.y))
    }

    fn non_degenerate(&self, length: f64) -> Option<f64> {
        (length >= self.config.min_segment_length).then_some(length)
    }

    /// Angle at `vertex` between the rays to `a` and `b`, degrees [0, 180].
    fn joint_angle(&self, a: Point2, vertex: Point2, b: Point2) -> Option<f64> {
        let v1 = (a.x - vertex.x, a.y - vertex.y);
        let v2 = (b.x - vertex.x, b.y - vertex.y);
        let mag1 = self.non_degenerate((v1.0 * v1.0 + v1.1 * v1.1).sqrt())?;
        let mag2 = self.non_degenerate((v2.0 * v2.0 + v2.1 * v2.1).sqrt())?;

        let cos_angle = ((v1.0 * v2.0 + v1.1 * v2.1) / (mag1 * mag2)).clamp(-1.0, 1.0);
        Some(cos_angle.acos().to_degrees())
    }

    /// Unsigned angle of the segment `from -> to` against an axis, degrees [0, 90].
    fn incline(&self, from: Point2, to: Point2, axis: Axis) -> Option<f64> {
        let dx = (to.x - from.x).abs();
        let dy = (to.y - from.y).abs();
        self.non_degenerate((dx * dx + dy * dy).sqrt())?;
        let degrees = match axis {
            Axis::Vertical => dx.atan2(dy),
            Axis::Horizontal => dy.atan2(dx),
        };
        Some(degrees.to_degrees())
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Vertical,
    Horizontal,
}
