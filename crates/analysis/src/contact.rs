//! Bat-ball contact detection.
//!
//! # Algorithm
//!
//! 1. **Signal**: wrist speed per frame, or a min-max normalized blend of
//!    wrist and bat speed when bat detections are available.
//! 2. **Peak**: the largest present value inside the candidate window;
//!    ties resolve to the earliest frame.
//! 3. **Prominence**: the peak must stand out from the median of the
//!    surrounding `baseline_window` frames (peak excluded).
//! 4. **Decision**: a weak or non-prominent peak is reported as not found.

use serde::{Deserialize, Serialize};
use strokelab_model::frame::FrameIndex;
use strokelab_model::phase::{Contact, ContactEvent, ContactMethod};
use strokelab_model::signal::{TrackedPoint, VelocitySample};

/// Configuration for contact detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Start of the candidate window as a fraction of the sequence [0, 1].
    pub candidate_start: f64,
    /// End of the candidate window as a fraction of the sequence [0, 1].
    pub candidate_end: f64,

    /// Frames on each side of the peak used for the baseline.
    pub baseline_window: u64,

    /// Minimum wrist speed at the peak (shoulder widths/s).
    pub min_peak: f64,

    /// Minimum `(peak - baseline) / peak`.
    pub min_prominence: f64,

    /// Weight of bat speed in the blended signal; 0 disables blending.
    pub bat_weight: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            candidate_start: 0.0,
            candidate_end: 1.0,
            baseline_window: 10,
            min_peak: 4.0,
            min_prominence: 0.5,
            bat_weight: 0.4,
        }
    }
}

/// Batch contact detector over a complete velocity sequence.
#[derive(Debug, Clone)]
pub struct ContactDetector {
    config: ContactConfig,
}

impl ContactDetector {
    pub fn new(config: ContactConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ContactConfig::default())
    }

    pub fn detect(&self, samples: &[VelocitySample]) -> Contact {
        let wrist: Vec<Option<f64>> = samples.iter().map(|s| s.wrist_speed()).collect();
        if wrist.iter().all(Option::is_none) {
            tracing::warn!(frames = samples.len(), "Contact not found: no wrist speed samples");
            return Contact::not_found("no wrist speed samples");
        }

        let bat: Vec<Option<f64>> = samples
            .iter()
            .map(|s| s.speed_of(TrackedPoint::BatCenter))
            .collect();
        let blend = self.config.bat_weight > 0.0 && bat.iter().any(Option::is_some);

        let (signal, method) = if blend {
            (
                self.blended(&wrist, &bat),
                ContactMethod::BlendedVelocityPeak,
            )
        } else {
            (wrist.clone(), ContactMethod::WristVelocityPeak)
        };

        let (start, end) = self.candidate_range(samples.len());
        let Some(peak_pos) = earliest_max(&signal[start..end]).map(|i| i + start) else {
            return self.reject("no samples in candidate window");
        };
        let peak = signal[peak_pos].unwrap_or(0.0);
        let peak_frame = samples[peak_pos].frame;

        let raw_peak = wrist[peak_pos].unwrap_or(0.0);
        if raw_peak < self.config.min_peak || peak <= 0.0 {
            return self.reject(format!(
                "peak wrist speed {raw_peak:.2} at frame {peak_frame} below {:.2}",
                self.config.min_peak
            ));
        }

        let Some(baseline) = self.baseline(samples, &signal, peak_pos) else {
            return self.reject(format!("no baseline samples around frame {peak_frame}"));
        };

        let confidence = ((peak - baseline) / peak).clamp(0.0, 1.0);
        if confidence < self.config.min_prominence {
            return self.reject(format!(
                "peak at frame {peak_frame} not prominent ({confidence:.2} < {:.2})",
                self.config.min_prominence
            ));
        }

        tracing::debug!(frame = peak_frame, confidence, ?method, "Contact found");
        Contact::Found(ContactEvent {
            frame: peak_frame,
            confidence,
            method,
        })
    }

    fn reject(&self, reason: impl Into<String>) -> Contact {
        let reason = reason.into();
        tracing::warn!(%reason, "Contact not found");
        Contact::NotFound { reason }
    }

    /// `[start, end)` positions of the candidate window.
    fn candidate_range(&self, len: usize) -> (usize, usize) {
        let start_frac = self.config.candidate_start.clamp(0.0, 1.0);
        let end_frac = self.config.candidate_end.clamp(start_frac, 1.0);
        let start = ((len as f64) * start_frac).floor() as usize;
        let end = ((len as f64) * end_frac).ceil() as usize;
        (start.min(len), end.clamp(start.min(len), len))
    }

    /// `(1 - w) * wrist + w * bat` over min-max normalized series.
    ///
    /// Frames without bat speed use the normalized wrist value alone;
    /// frames without wrist speed are missing.
    fn blended(&self, wrist: &[Option<f64>], bat: &[Option<f64>]) -> Vec<Option<f64>> {
        let w = self.config.bat_weight.clamp(0.0, 1.0);
        let wrist_norm = min_max_normalize(wrist);
        let bat_norm = min_max_normalize(bat);
        wrist_norm
            .iter()
            .zip(bat_norm.iter())
            .map(|(wn, bn)| match (wn, bn) {
                (Some(wn), Some(bn)) => Some((1.0 - w) * wn + w * bn),
                (Some(wn), None) => Some(*wn),
                _ => None,
            })
            .collect()
    }

    /// Median of present values within `baseline_window` frames of the peak.
    fn baseline(
        &self,
        samples: &[VelocitySample],
        signal: &[Option<f64>],
        peak_pos: usize,
    ) -> Option<f64> {
        let peak_frame: FrameIndex = samples[peak_pos].frame;
        let window = self.config.baseline_window;
        let mut values: Vec<f64> = samples
            .iter()
            .zip(signal)
            .enumerate()
            .filter(|(pos, (sample, _))| {
                *pos != peak_pos && sample.frame.abs_diff(peak_frame) <= window
            })
            .filter_map(|(_, (_, value))| *value)
            .collect();

        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        Some(if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        })
    }
}

/// Position of the largest present value; ties go to the earliest.
fn earliest_max(values: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (pos, value) in values.iter().enumerate() {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((pos, v));
            }
        }
    }
    best.map(|(pos, _)| pos)
}

fn min_max_normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied().filter(|v| v.is_finite());
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    values
        .iter()
        .map(|v| {
            v.filter(|v| v.is_finite()).map(|v| {
                if range > 0.0 {
                    (v - min) / range
                } else {
                    0.0
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(speeds: &[Option<f64>]) -> Vec<VelocitySample> {
        speeds
            .iter()
            .enumerate()
            .map(|(i, speed)| {
                let mut s = VelocitySample::missing(i as u64, i as u64 * 33_333_333);
                s.speed.insert(TrackedPoint::LeadWrist, *speed);
                s
            })
            .collect()
    }

    fn smooth_with_spike(len: usize, at: usize, peak: f64) -> Vec<Option<f64>> {
        (0..len)
            .map(|i| {
                if i == 0 {
                    None
                } else if i == at {
                    Some(peak)
                } else {
                    Some(0.3 + 0.01 * (i % 5) as f64)
                }
            })
            .collect()
    }

    #[test]
    fn test_spike_is_found_with_high_confidence() {
        let contact = ContactDetector::with_defaults().detect(&samples(&smooth_with_spike(120, 80, 30.0)));
        let event = contact.event().expect("contact should be found");
        assert_eq!(event.frame, 80);
        assert!(event.confidence > 0.9);
        assert_eq!(event.method, ContactMethod::WristVelocityPeak);
    }

    #[test]
    fn test_ties_resolve_to_earliest() {
        let mut speeds = smooth_with_spike(60, 20, 12.0);
        speeds[35] = Some(12.0);
        let contact = ContactDetector::with_defaults().detect(&samples(&speeds));
        assert_eq!(contact.frame(), Some(20));
    }

    #[test]
    fn test_flat_signal_is_not_found() {
        let speeds = vec![Some(6.0); 40];
        let contact = ContactDetector::with_defaults().detect(&samples(&speeds));
        assert!(matches!(contact, Contact::NotFound { .. }));
    }

    #[test]
    fn test_weak_peak_is_not_found() {
        let contact = ContactDetector::with_defaults().detect(&samples(&smooth_with_spike(50, 25, 2.0)));
        assert!(contact.frame().is_none());
    }

    #[test]
    fn test_all_missing_is_not_found() {
        let contact = ContactDetector::with_defaults().detect(&samples(&[None; 30]));
        match contact {
            Contact::NotFound { reason } => assert!(reason.contains("no wrist speed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_candidate_window_restricts_search() {
        let mut speeds = smooth_with_spike(100, 10, 30.0);
        speeds[70] = Some(20.0);
        let config = ContactConfig {
            candidate_start: 0.5,
            candidate_end: 1.0,
            ..ContactConfig::default()
        };
        let contact = ContactDetector::new(config).detect(&samples(&speeds));
        assert_eq!(contact.frame(), Some(70));
    }

    #[test]
    fn test_bat_speed_shifts_blended_peak() {
        let mut s = samples(&smooth_with_spike(60, 30, 10.0));
        s[31].speed.insert(TrackedPoint::LeadWrist, Some(9.5));
        for (i, sample) in s.iter_mut().enumerate() {
            let bat = if i == 31 { 5.0 } else { 0.1 };
            sample.speed.insert(TrackedPoint::BatCenter, Some(bat));
        }

        let contact = ContactDetector::with_defaults().detect(&s);
        let event = contact.event().unwrap();
        assert_eq!(event.frame, 31);
        assert_eq!(event.method, ContactMethod::BlendedVelocityPeak);

        let wrist_only = ContactDetector::new(ContactConfig {
            bat_weight: 0.0,
            ..ContactConfig::default()
        })
        .detect(&s);
        assert_eq!(wrist_only.frame(), Some(30));
    }
}
