//! Band-based category scoring.
//!
//! Each category pools its per-phase statistics over a configured set of
//! phases, picks one statistic, and looks it up in an ordered list of score
//! bands. A category without valid samples is unscored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strokelab_common::error::{StrokeError, StrokeResult};
use strokelab_model::evaluation::{
    Category, CategoryResult, CategorySource, MetricSummary, Rating, Statistic, Stats,
};
use strokelab_model::phase::{Phase, PhaseTimeline};

use crate::aggregate::category_source;

/// Half-open value range `[min, max)` mapped to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: f64,
    pub max: f64,
    pub score: u8,
    pub feedback: String,
}

impl ScoreBand {
    fn new(min: f64, max: f64, score: u8, feedback: &str) -> Self {
        Self {
            min,
            max,
            score,
            feedback: feedback.to_string(),
        }
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }
}

/// Scoring rule for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Phases whose statistics are pooled.
    pub phases: Vec<Phase>,
    pub statistic: Statistic,
    /// Checked in order; the first containing band wins.
    pub bands: Vec<ScoreBand>,
    /// Score when no band contains the value.
    pub fallback_score: u8,
    pub fallback_feedback: String,
    /// Weight in the overall score.
    pub weight: f64,
    /// Valid samples required to score.
    pub min_samples: u64,
}

/// Configuration for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rules: BTreeMap<Category, CategoryRule>,
    /// Feedback for unscored categories; `{category}` is replaced by its label.
    pub insufficient_feedback: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        use Phase::*;

        let mut rules = BTreeMap::new();
        rules.insert(
            Category::Footwork,
            CategoryRule {
                phases: vec![Stance, Stride, Downswing, Impact],
                statistic: Statistic::Mean,
                bands: vec![
                    ScoreBand::new(25.0, 35.0, 10, "Front foot opens cleanly to about 30 degrees."),
                    ScoreBand::new(20.0, 40.0, 8, "Nice base. Open the front foot a touch closer to 30 degrees."),
                    ScoreBand::new(15.0, 45.0, 6, "Front-foot angle is drifting from 30 degrees; work on planting it."),
                    ScoreBand::new(5.0, 60.0, 4, "Front foot is over- or under-rotated, costing stability."),
                ],
                fallback_score: 2,
                fallback_feedback: "Work on planting the front foot about 30 degrees open.".to_string(),
                weight: 1.0,
                min_samples: 1,
            },
        );
        rules.insert(
            Category::HeadAlignment,
            CategoryRule {
                phases: vec![Stride, Downswing, Impact],
                statistic: Statistic::Mean,
                bands: vec![
                    ScoreBand::new(0.0, 0.25, 10, "Head stays steady over the front knee. Solid."),
                    ScoreBand::new(0.25, 0.5, 8, "Head is mostly over the knee; keep it there through impact."),
                    ScoreBand::new(0.5, 0.75, 6, "Some head drift; keep your eyes level and over the ball."),
                    ScoreBand::new(0.75, 1.0, 4, "Head falls away from the line; minimize side drift."),
                ],
                fallback_score: 2,
                fallback_feedback: "Keep your head more stable through the shot.".to_string(),
                weight: 1.0,
                min_samples: 1,
            },
        );
        rules.insert(
            Category::SwingControl,
            CategoryRule {
                phases: vec![Downswing, Impact],
                statistic: Statistic::Mean,
                bands: vec![
                    ScoreBand::new(150.0, 181.0, 10, "Elbow extension looks controlled through impact."),
                    ScoreBand::new(140.0, 150.0, 9, "Good extension through the line."),
                    ScoreBand::new(130.0, 140.0, 8, "Solid arm path; a little more extension at impact."),
                    ScoreBand::new(120.0, 130.0, 6, "Let the bat extend further through the ball."),
                    ScoreBand::new(110.0, 120.0, 5, "Elbow is folding early; feel the bat extend through the line."),
                    ScoreBand::new(90.0, 110.0, 3, "Avoid over-folding the elbow before impact."),
                ],
                fallback_score: 1,
                fallback_feedback: "Elbow is heavily folded through the swing.".to_string(),
                weight: 1.0,
                min_samples: 1,
            },
        );
        rules.insert(
            Category::Balance,
            CategoryRule {
                phases: vec![Stance, Stride, Downswing, Impact, FollowThrough],
                statistic: Statistic::Mean,
                bands: vec![
                    ScoreBand::new(0.0, 5.0, 10, "Spine stays tall and compact. Good balance."),
                    ScoreBand::new(5.0, 10.0, 8, "Balanced with a slight lean."),
                    ScoreBand::new(10.0, 15.0, 6, "Noticeable spine lean; think tall chest."),
                    ScoreBand::new(15.0, 20.0, 4, "Reduce spine lean to stay balanced over the stance."),
                ],
                fallback_score: 2,
                fallback_feedback: "Heavy spine lean is pulling you off balance.".to_string(),
                weight: 1.0,
                min_samples: 1,
            },
        );
        rules.insert(
            Category::FollowThrough,
            CategoryRule {
                phases: vec![FollowThrough],
                statistic: Statistic::Mean,
                bands: vec![
                    ScoreBand::new(1.5, f64::MAX, 10, "Follow-through duration is healthy; let the bat finish high."),
                    ScoreBand::new(1.1, 1.5, 8, "Follow-through duration is healthy; let the bat finish high."),
                    ScoreBand::new(0.8, 1.1, 6, "Let the bat continue a little longer after impact."),
                    ScoreBand::new(0.5, 0.8, 4, "Follow-through is cut short compared with the downswing."),
                ],
                fallback_score: 2,
                fallback_feedback: "Let the bat continue naturally after impact; avoid cutting the swing short."
                    .to_string(),
                weight: 1.0,
                min_samples: 1,
            },
        );

        Self {
            rules,
            insufficient_feedback: "Insufficient data to assess {category}.".to_string(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> StrokeResult<()> {
        for category in Category::ALL {
            let rule = self.rules.get(&category).ok_or_else(|| {
                StrokeError::config(format!("no scoring rule for {}", category.label()))
            })?;

            if rule.phases.is_empty() {
                return Err(StrokeError::config(format!(
                    "{}: rule pools no phases",
                    category.label()
                )));
            }
            if !(rule.weight.is_finite() && rule.weight >= 0.0) {
                return Err(StrokeError::config(format!(
                    "{}: weight must be a non-negative number",
                    category.label()
                )));
            }
            if !(1..=10).contains(&rule.fallback_score) {
                return Err(StrokeError::config(format!(
                    "{}: fallback score {} outside 1..=10",
                    category.label(),
                    rule.fallback_score
                )));
            }
            for band in &rule.bands {
                if !(1..=10).contains(&band.score) {
                    return Err(StrokeError::config(format!(
                        "{}: band score {} outside 1..=10",
                        category.label(),
                        band.score
                    )));
                }
                if !(band.min < band.max) {
                    return Err(StrokeError::config(format!(
                        "{}: band [{}, {}) is empty",
                        category.label(),
                        band.min,
                        band.max
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Category ratings plus the overall score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub categories: BTreeMap<Category, CategoryResult>,
    pub overall: Option<f64>,
}

/// Maps aggregated statistics to ratings.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> StrokeResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn score(&self, summaries: &[MetricSummary], timeline: &PhaseTimeline) -> Scorecard {
        let mut categories = BTreeMap::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for category in Category::ALL {
            let Some(rule) = self.config.rules.get(&category) else {
                categories.insert(category, self.unscored(category, 0.0));
                continue;
            };

            let frames: u64 = rule
                .phases
                .iter()
                .map(|phase| timeline.span(*phase).len)
                .sum();
            let pooled = Stats::pool(
                summaries
                    .iter()
                    .filter(|s| s.category == category && rule.phases.contains(&s.phase))
                    .filter_map(|s| s.aggregate.stats()),
            );

            let samples = pooled.map_or(0, |stats| stats.count);
            let coverage = match category_source(category) {
                CategorySource::FollowThroughRatio if samples > 0 => 1.0,
                _ if frames > 0 => (samples as f64 / frames as f64).min(1.0),
                _ => 0.0,
            };

            let result = match pooled {
                Some(stats) if samples >= rule.min_samples.max(1) => {
                    let value = stats.get(rule.statistic);
                    let (score, feedback) = rule
                        .bands
                        .iter()
                        .find(|band| band.contains(value))
                        .map(|band| (band.score, band.feedback.clone()))
                        .unwrap_or((rule.fallback_score, rule.fallback_feedback.clone()));
                    let score = score.clamp(1, 10);

                    if rule.weight > 0.0 {
                        weighted += rule.weight * score as f64;
                        total_weight += rule.weight;
                    }
                    tracing::debug!(category = category.label(), value, score, samples, "Category scored");

                    CategoryResult {
                        rating: Rating::Scored { value: score },
                        feedback,
                        coverage,
                    }
                }
                _ => {
                    tracing::debug!(category = category.label(), samples, "Category unscored");
                    self.unscored(category, coverage)
                }
            };
            categories.insert(category, result);
        }

        let overall = (total_weight > 0.0).then(|| (weighted / total_weight * 10.0).round() / 10.0);
        Scorecard {
            categories,
            overall,
        }
    }

    fn unscored(&self, category: Category, coverage: f64) -> CategoryResult {
        CategoryResult {
            rating: Rating::Unscored,
            feedback: self
                .config
                .insufficient_feedback
                .replace("{category}", category.label()),
            coverage,
        }
    }
}
