//! Per-frame input records.
//!
//! Frames arrive as JSON Lines (one record per line) produced by the external
//! pose model, optionally preceded by a `#`-prefixed header line. Keypoint
//! coordinates are normalized to `[0.0, 1.0]` relative to the source frame
//! so that results survive resolution changes between clips.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Monotonic timestamp in nanoseconds since the start of the clip.
pub type TimestampNs = u64;

/// Zero-based frame index in the source clip.
pub type FrameIndex = u64;

/// Body side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Named body landmark supplied by the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Joint {
    /// Every joint, in serialization order.
    pub const ALL: [Joint; 17] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::LeftHeel,
        Joint::RightHeel,
        Joint::LeftFootIndex,
        Joint::RightFootIndex,
    ];

    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftShoulder,
            Side::Right => Joint::RightShoulder,
        }
    }

    pub fn elbow(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftElbow,
            Side::Right => Joint::RightElbow,
        }
    }

    pub fn wrist(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftWrist,
            Side::Right => Joint::RightWrist,
        }
    }

    pub fn hip(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftHip,
            Side::Right => Joint::RightHip,
        }
    }

    pub fn knee(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftKnee,
            Side::Right => Joint::RightKnee,
        }
    }

    pub fn ankle(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftAnkle,
            Side::Right => Joint::RightAnkle,
        }
    }

    pub fn heel(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftHeel,
            Side::Right => Joint::RightHeel,
        }
    }

    pub fn foot_index(side: Side) -> Self {
        match side {
            Side::Left => Joint::LeftFootIndex,
            Side::Right => Joint::RightFootIndex,
        }
    }
}

/// A detected landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized X coordinate [0.0, 1.0].
    pub x: f64,
    /// Normalized Y coordinate [0.0, 1.0], growing downwards.
    pub y: f64,
    /// Relative depth, when the model provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Model confidence that the landmark is visible [0.0, 1.0].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Whether the coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Bat bounding box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Detector confidence [0.0, 1.0].
    pub confidence: f64,
}

impl BatBox {
    /// Center point of the box.
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// One frame of keypoint data. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame index in the source clip.
    #[serde(rename = "frame")]
    pub index: FrameIndex,

    /// Monotonic nanoseconds since clip start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Landmark positions. A `null` value (or an absent joint) means the
    /// pose model could not place that joint in this frame.
    #[serde(default)]
    pub keypoints: BTreeMap<Joint, Option<Keypoint>>,

    /// Best bat detection for this frame, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bat: Option<BatBox>,
}

impl FrameRecord {
    /// Create a frame with no detected keypoints.
    pub fn empty(index: FrameIndex, timestamp_ns: TimestampNs) -> Self {
        Self {
            index,
            timestamp_ns,
            keypoints: BTreeMap::new(),
            bat: None,
        }
    }

    /// Builder-style keypoint insertion.
    pub fn with_keypoint(mut self, joint: Joint, keypoint: Keypoint) -> Self {
        self.keypoints.insert(joint, Some(keypoint));
        self
    }

    /// Builder-style bat box.
    pub fn with_bat(mut self, bat: BatBox) -> Self {
        self.bat = Some(bat);
        self
    }

    /// Keypoint for a joint, if detected.
    pub fn keypoint(&self, joint: Joint) -> Option<&Keypoint> {
        self.keypoints.get(&joint).and_then(Option::as_ref)
    }

    /// Whether at least one joint was detected.
    pub fn has_any_keypoint(&self) -> bool {
        self.keypoints.values().any(Option::is_some)
    }

    /// Timestamp as fractional seconds since clip start.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }
}

/// Header describing a frame stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Nominal frame rate of the source clip.
    #[serde(default)]
    pub fps_hint: Option<f64>,

    /// Source frame dimensions in pixels.
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,

    /// Name of the pose model or tool that produced the keypoints.
    #[serde(default)]
    pub source: String,
}

/// A raw bat detection, several of which may exist per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatDetection {
    pub frame: FrameIndex,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl BatDetection {
    pub fn to_box(&self) -> BatBox {
        BatBox {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
            confidence: self.confidence,
        }
    }
}

/// Keep the highest-confidence detection per frame.
///
/// Ties keep the detection that appeared first.
pub fn best_detections(detections: &[BatDetection]) -> BTreeMap<FrameIndex, BatBox> {
    let mut best: BTreeMap<FrameIndex, BatBox> = BTreeMap::new();
    for detection in detections {
        let candidate = detection.to_box();
        match best.get(&detection.frame) {
            Some(existing) if existing.confidence >= candidate.confidence => {}
            _ => {
                best.insert(detection.frame, candidate);
            }
        }
    }
    best
}

/// Attach the best detection for each frame. Frames without a detection
/// keep whatever bat box they already carry.
pub fn attach_detections(
    frames: Vec<FrameRecord>,
    detections: &BTreeMap<FrameIndex, BatBox>,
) -> Vec<FrameRecord> {
    frames
        .into_iter()
        .map(|mut frame| {
            if let Some(bat) = detections.get(&frame.index) {
                frame.bat = Some(*bat);
            }
            frame
        })
        .collect()
}

fn content_lines(jsonl: &str) -> impl Iterator<Item = &str> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Parse frames from JSONL content (one JSON object per line).
pub fn parse_frames(jsonl: &str) -> Result<Vec<FrameRecord>, serde_json::Error> {
    content_lines(jsonl).map(serde_json::from_str).collect()
}

/// Parse the `#`-prefixed header line, if present.
pub fn parse_header(jsonl: &str) -> Option<FrameStreamHeader> {
    jsonl
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix('#'))
        .and_then(|rest| serde_json::from_str(rest.trim()).ok())
}

/// Parse bat detections from JSONL content.
pub fn parse_detections(jsonl: &str) -> Result<Vec<BatDetection>, serde_json::Error> {
    content_lines(jsonl).map(serde_json::from_str).collect()
}

/// Serialize frames to JSONL format.
pub fn serialize_frames(frames: &[FrameRecord]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for frame in frames {
        output.push_str(&serde_json::to_string(frame)?);
        output.push('\n');
    }
    Ok(output)
}
