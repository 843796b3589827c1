//! Stroke phases, the six-span timeline, and the contact event.

use serde::{Deserialize, Serialize};

use crate::frame::FrameIndex;

/// Ordered motion phase of a batting stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stance,
    Stride,
    Downswing,
    Impact,
    FollowThrough,
    Recovery,
}

impl Phase {
    /// All phases in stroke order.
    pub const ALL: [Phase; 6] = [
        Phase::Stance,
        Phase::Stride,
        Phase::Downswing,
        Phase::Impact,
        Phase::FollowThrough,
        Phase::Recovery,
    ];

    /// The only phase reachable from this one; `None` for Recovery.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Stance => Some(Phase::Stride),
            Phase::Stride => Some(Phase::Downswing),
            Phase::Downswing => Some(Phase::Impact),
            Phase::Impact => Some(Phase::FollowThrough),
            Phase::FollowThrough => Some(Phase::Recovery),
            Phase::Recovery => None,
        }
    }

    /// Position in stroke order.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Stance => "stance",
            Phase::Stride => "stride",
            Phase::Downswing => "downswing",
            Phase::Impact => "impact",
            Phase::FollowThrough => "follow_through",
            Phase::Recovery => "recovery",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Contiguous run of frames assigned to one phase.
///
/// An empty span (`len == 0`) still carries a position so the six spans
/// always tile the frame range in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpan {
    pub phase: Phase,
    /// First frame index (inclusive).
    pub start: FrameIndex,
    /// Number of frame indices covered.
    pub len: u64,
}

impl PhaseSpan {
    /// Inclusive last frame index, `None` for an empty span.
    pub fn end(&self) -> Option<FrameIndex> {
        (self.len > 0).then(|| self.start + self.len - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        frame >= self.start && frame < self.start + self.len
    }
}

/// Violations reported by [`PhaseTimeline::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("expected 6 spans, found {found}")]
    WrongSpanCount { found: usize },

    #[error("span {index} is {found}, expected {expected}")]
    OutOfOrder {
        index: usize,
        expected: Phase,
        found: Phase,
    },

    #[error("{phase} starts at {start}, expected {expected}")]
    Gap {
        phase: Phase,
        start: FrameIndex,
        expected: FrameIndex,
    },

    #[error("spans end at {end}, expected {expected}")]
    Coverage { end: FrameIndex, expected: FrameIndex },
}

/// The six phase spans of one run, in stroke order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimeline {
    spans: Vec<PhaseSpan>,
}

impl PhaseTimeline {
    /// Build a timeline covering `first..end_exclusive` from the start
    /// frames of the phases that were entered.
    ///
    /// Entered starts must be non-decreasing in phase order. A phase that
    /// was never entered becomes an empty span at the position of the next
    /// entered phase, or at `end_exclusive` when none follows. Stance
    /// always starts at `first`.
    pub fn from_entries(
        first: FrameIndex,
        end_exclusive: FrameIndex,
        entered: [Option<FrameIndex>; 6],
    ) -> Self {
        let end_exclusive = end_exclusive.max(first);
        let mut starts = [end_exclusive; 6];
        let mut following = end_exclusive;
        for i in (0..6).rev() {
            let start = if i == 0 { Some(first) } else { entered[i] };
            let start = start.map_or(following, |s| s.clamp(first, following));
            starts[i] = start;
            following = start;
        }

        let spans = Phase::ALL
            .iter()
            .enumerate()
            .map(|(i, phase)| {
                let next = if i + 1 < 6 { starts[i + 1] } else { end_exclusive };
                PhaseSpan {
                    phase: *phase,
                    start: starts[i],
                    len: next - starts[i],
                }
            })
            .collect();

        Self { spans }
    }

    pub fn spans(&self) -> &[PhaseSpan] {
        &self.spans
    }

    pub fn span(&self, phase: Phase) -> &PhaseSpan {
        &self.spans[phase.ordinal()]
    }

    /// Phase owning a frame index, if inside the covered range.
    pub fn phase_at(&self, frame: FrameIndex) -> Option<Phase> {
        self.spans
            .iter()
            .find(|span| span.contains(frame))
            .map(|span| span.phase)
    }

    /// Inclusive `(start, end)` per phase, `None` for empty spans.
    pub fn boundaries(&self) -> Vec<(Phase, Option<(FrameIndex, FrameIndex)>)> {
        self.spans
            .iter()
            .map(|span| (span.phase, span.end().map(|end| (span.start, end))))
            .collect()
    }

    /// Check that the spans tile `first..=last` in stroke order.
    pub fn validate(&self, first: FrameIndex, last: FrameIndex) -> Result<(), TimelineError> {
        if self.spans.len() != 6 {
            return Err(TimelineError::WrongSpanCount {
                found: self.spans.len(),
            });
        }

        let mut cursor = first;
        for (index, (span, expected)) in self.spans.iter().zip(Phase::ALL).enumerate() {
            if span.phase != expected {
                return Err(TimelineError::OutOfOrder {
                    index,
                    expected,
                    found: span.phase,
                });
            }
            if span.start != cursor {
                return Err(TimelineError::Gap {
                    phase: span.phase,
                    start: span.start,
                    expected: cursor,
                });
            }
            cursor = span.start + span.len;
        }

        if cursor != last + 1 {
            return Err(TimelineError::Coverage {
                end: cursor,
                expected: last + 1,
            });
        }
        Ok(())
    }
}

/// How a contact frame was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    /// Peak of wrist speed alone.
    WristVelocityPeak,
    /// Peak of blended wrist and bat speed.
    BlendedVelocityPeak,
}

/// A located bat-ball contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub frame: FrameIndex,
    /// Peak prominence over the local baseline [0.0, 1.0].
    pub confidence: f64,
    pub method: ContactMethod,
}

/// Outcome of contact detection; never omitted from a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Contact {
    Found(ContactEvent),
    NotFound { reason: String },
}

impl Contact {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Contact::NotFound {
            reason: reason.into(),
        }
    }

    pub fn frame(&self) -> Option<FrameIndex> {
        match self {
            Contact::Found(event) => Some(event.frame),
            Contact::NotFound { .. } => None,
        }
    }

    pub fn event(&self) -> Option<&ContactEvent> {
        match self {
            Contact::Found(event) => Some(event),
            Contact::NotFound { .. } => None,
        }
    }
}
