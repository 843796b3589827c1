//! Synthetic pose streams shared by the integration tests.

#![allow(dead_code)]

use strokelab_model::frame::{FrameRecord, Joint, Keypoint};

pub const FRAME_NS: u64 = 33_333_333;
pub const CONTACT_FRAME: u64 = 80;

/// Per-frame lead wrist displacement (normalized units).
fn wrist_step(frame: u64) -> f64 {
    match frame {
        0 => 0.0,
        60..=79 => 0.01,
        CONTACT_FRAME => 0.1,
        81..=89 => 0.005,
        _ => 0.001,
    }
}

/// Full-body pose for a right-handed batter with a moving lead wrist.
pub fn posed_frame(index: u64, wrist_x: f64) -> FrameRecord {
    FrameRecord::empty(index, index * FRAME_NS)
        .with_keypoint(Joint::Nose, Keypoint::new(0.50, 0.20))
        .with_keypoint(Joint::LeftShoulder, Keypoint::new(0.45, 0.30))
        .with_keypoint(Joint::RightShoulder, Keypoint::new(0.55, 0.30))
        .with_keypoint(Joint::LeftElbow, Keypoint::new(0.42, 0.40))
        .with_keypoint(Joint::LeftWrist, Keypoint::new(wrist_x, 0.50))
        .with_keypoint(Joint::RightWrist, Keypoint::new(0.52, 0.50))
        .with_keypoint(Joint::LeftHip, Keypoint::new(0.47, 0.55))
        .with_keypoint(Joint::LeftKnee, Keypoint::new(0.46, 0.70))
        .with_keypoint(Joint::LeftAnkle, Keypoint::new(0.45, 0.85))
        .with_keypoint(Joint::LeftHeel, Keypoint::new(0.44, 0.87))
        .with_keypoint(Joint::LeftFootIndex, Keypoint::new(0.48, 0.85))
}

/// A stroke: quiet stance, a 20-frame swing, a sharp spike at the contact
/// frame, then a slow follow-through. Shoulder width is 0.1 at 30 fps.
pub fn swing_frames(count: u64) -> Vec<FrameRecord> {
    let mut wrist_x = 0.30;
    (0..count)
        .map(|i| {
            wrist_x += wrist_step(i);
            posed_frame(i, wrist_x)
        })
        .collect()
}

/// `swing_frames` with every frame whose index ends in 5 blanked out.
pub fn swing_frames_with_gaps(count: u64) -> Vec<FrameRecord> {
    swing_frames(count)
        .into_iter()
        .map(|frame| {
            if frame.index % 10 == 5 {
                FrameRecord::empty(frame.index, frame.timestamp_ns)
            } else {
                frame
            }
        })
        .collect()
}

/// Frames with no detected keypoints at all.
pub fn blank_frames(count: u64) -> Vec<FrameRecord> {
    (0..count).map(|i| FrameRecord::empty(i, i * FRAME_NS)).collect()
}
