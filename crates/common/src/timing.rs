//! Frame timing utilities.
//!
//! Frame timestamps are monotonic nanoseconds relative to the start of the
//! source clip. Capture devices do not hold a constant frame rate, so every
//! rate computation in StrokeLab works from elapsed timestamps rather than
//! from frame counts. This module provides:
//! - Conversions between nanoseconds and seconds
//! - Elapsed-time calculation between two frames
//! - Frame-rate estimation with an irregularity measure

/// Convert a nanosecond value to seconds.
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Convert seconds to nanoseconds.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs * 1_000_000_000.0) as u64
}

/// Seconds elapsed from `earlier_ns` to `later_ns`.
///
/// Returns `None` when the interval is zero or negative, which makes any
/// rate computed across it undefined.
pub fn elapsed_secs(earlier_ns: u64, later_ns: u64) -> Option<f64> {
    if later_ns <= earlier_ns {
        return None;
    }
    Some(ns_to_secs(later_ns - earlier_ns))
}

/// Frame rate inferred from a sequence of timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRateEstimate {
    /// Median frames per second.
    pub fps: f64,
    /// Median frame interval in seconds.
    pub median_interval_secs: f64,
    /// Largest interval divided by the median (1.0 = perfectly regular).
    pub irregularity: f64,
    /// Number of intervals that went into the estimate.
    pub intervals: usize,
}

impl FrameRateEstimate {
    /// Estimate the frame rate of a timestamp sequence.
    ///
    /// Non-positive intervals are skipped. Returns `None` when fewer than
    /// one usable interval exists.
    pub fn from_timestamps(timestamps_ns: &[u64]) -> Option<Self> {
        let mut intervals: Vec<f64> = timestamps_ns
            .windows(2)
            .filter_map(|w| elapsed_secs(w[0], w[1]))
            .collect();

        if intervals.is_empty() {
            return None;
        }

        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        let largest = intervals[intervals.len() - 1];

        Some(Self {
            fps: 1.0 / median,
            median_interval_secs: median,
            irregularity: largest / median,
            intervals: intervals.len(),
        })
    }

    /// Whether any interval exceeds the median by more than `factor`.
    pub fn has_dropped_frames(&self, factor: f64) -> bool {
        self.irregularity > factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_to_secs_conversion() {
        assert!((ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert_eq!(secs_to_ns(2.0), 2_000_000_000);
    }

    #[test]
    fn test_elapsed_rejects_non_positive_intervals() {
        assert_eq!(elapsed_secs(10, 10), None);
        assert_eq!(elapsed_secs(20, 10), None);
        assert!((elapsed_secs(0, 500_000_000).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_frame_rate_estimate_regular_stream() {
        let timestamps: Vec<u64> = (0..31).map(|i| i * 33_333_333).collect();
        let estimate = FrameRateEstimate::from_timestamps(&timestamps).unwrap();
        assert!((estimate.fps - 30.0).abs() < 0.01);
        assert!((estimate.irregularity - 1.0).abs() < 1e-6);
        assert_eq!(estimate.intervals, 30);
        assert!(!estimate.has_dropped_frames(1.5));
    }

    #[test]
    fn test_frame_rate_estimate_detects_gap() {
        let timestamps = vec![0, 40_000_000, 80_000_000, 200_000_000, 240_000_000];
        let estimate = FrameRateEstimate::from_timestamps(&timestamps).unwrap();
        assert!((estimate.fps - 25.0).abs() < 0.01);
        assert!(estimate.has_dropped_frames(2.0));
    }

    #[test]
    fn test_frame_rate_estimate_needs_an_interval() {
        assert!(FrameRateEstimate::from_timestamps(&[]).is_none());
        assert!(FrameRateEstimate::from_timestamps(&[5]).is_none());
        assert!(FrameRateEstimate::from_timestamps(&[5, 5]).is_none());
    }
}
