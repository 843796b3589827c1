//! Aggregated statistics, category ratings, and the final evaluation record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frame::FrameIndex;
use crate::phase::{Contact, Phase, PhaseTimeline};
use crate::signal::Metric;

/// Coaching category scored for every stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Footwork,
    HeadAlignment,
    SwingControl,
    Balance,
    FollowThrough,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Footwork,
        Category::HeadAlignment,
        Category::SwingControl,
        Category::Balance,
        Category::FollowThrough,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Footwork => "Footwork",
            Category::HeadAlignment => "Head Position",
            Category::SwingControl => "Swing Control",
            Category::Balance => "Balance",
            Category::FollowThrough => "Follow-through",
        }
    }
}

/// Statistic selected from a [`Stats`] block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Min,
    Max,
    Variance,
}

/// Descriptive statistics over the valid samples of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population variance.
    pub variance: f64,
}

impl Stats {
    /// Statistics of the given values; `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: values.len() as u64,
            mean,
            min,
            max,
            variance,
        })
    }

    /// Combine blocks exactly: count-weighted mean and pooled variance.
    pub fn pool<'a>(blocks: impl IntoIterator<Item = &'a Stats>) -> Option<Self> {
        let blocks: Vec<&Stats> = blocks.into_iter().filter(|s| s.count > 0).collect();
        let count: u64 = blocks.iter().map(|s| s.count).sum();
        if count == 0 {
            return None;
        }
        let total = count as f64;
        let mean = blocks.iter().map(|s| s.mean * s.count as f64).sum::<f64>() / total;
        let sum_sq = blocks
            .iter()
            .map(|s| s.count as f64 * (s.variance + (s.mean - mean).powi(2)))
            .sum::<f64>();
        Some(Self {
            count,
            mean,
            min: blocks.iter().map(|s| s.min).fold(f64::INFINITY, f64::min),
            max: blocks.iter().map(|s| s.max).fold(f64::NEG_INFINITY, f64::max),
            variance: sum_sq / total,
        })
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Variance => self.variance,
        }
    }
}

/// Aggregate for one `(phase, category)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Aggregate {
    Stats(Stats),
    InsufficientData,
}

impl Aggregate {
    pub fn stats(&self) -> Option<&Stats> {
        match self {
            Aggregate::Stats(stats) => Some(stats),
            Aggregate::InsufficientData => None,
        }
    }
}

/// What a category is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    /// Per-frame feature values inside each span.
    Metric(Metric),
    /// Follow-through length over Downswing length, reported on the
    /// Follow-through span only.
    FollowThroughRatio,
}

/// Per-phase summary of one category's source series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub phase: Phase,
    pub category: Category,
    pub source: CategorySource,
    /// Frame indices inside the span.
    pub frames: u64,
    pub aggregate: Aggregate,
}

/// Category score, or explicitly none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Rating {
    /// Integer score in `1..=10`.
    Scored { value: u8 },
    Unscored,
}

impl Rating {
    pub fn value(&self) -> Option<u8> {
        match self {
            Rating::Scored { value } => Some(*value),
            Rating::Unscored => None,
        }
    }
}

/// Scored category with its feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub rating: Rating,
    pub feedback: String,
    /// Valid samples divided by frames in the pooled phases [0.0, 1.0].
    pub coverage: f64,
}

/// Primary output of a pipeline run.
///
/// Holds no wall-clock data; identical input and configuration produce an
/// identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub categories: BTreeMap<Category, CategoryResult>,
    /// Weighted mean of scored categories, one decimal; `None` if none scored.
    pub overall: Option<f64>,
    pub contact: Contact,
    pub phases: PhaseTimeline,
    pub summaries: Vec<MetricSummary>,
    /// `false` when the run was cancelled before the stream ended.
    pub complete: bool,
    pub frames_processed: u64,
    /// Fraction of frames with at least one detected keypoint.
    pub data_coverage: f64,
}

impl EvaluationResult {
    pub fn rating(&self, category: Category) -> Rating {
        self.categories
            .get(&category)
            .map_or(Rating::Unscored, |result| result.rating)
    }

    pub fn scored_count(&self) -> usize {
        self.categories
            .values()
            .filter(|result| matches!(result.rating, Rating::Scored { .. }))
            .count()
    }
}

/// One row of the per-frame metrics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsLogRow {
    pub frame: FrameIndex,
    pub timestamp_secs: f64,
    pub metrics: BTreeMap<Metric, Option<f64>>,
    pub wrist_speed: Option<f64>,
    pub phase: Option<Phase>,
}
