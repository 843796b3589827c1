//! Per-phase aggregation of category source metrics.

use strokelab_model::evaluation::{Aggregate, Category, CategorySource, MetricSummary, Stats};
use strokelab_model::phase::{Phase, PhaseSpan, PhaseTimeline};
use strokelab_model::signal::{FeatureVector, Metric};

/// Source a category is judged on.
pub fn category_source(category: Category) -> CategorySource {
    match category {
        Category::Footwork => CategorySource::Metric(Metric::FootAngle),
        Category::HeadAlignment => CategorySource::Metric(Metric::HeadKneeOffset),
        Category::SwingControl => CategorySource::Metric(Metric::ElbowAngle),
        Category::Balance => CategorySource::Metric(Metric::SpineLean),
        Category::FollowThrough => CategorySource::FollowThroughRatio,
    }
}

/// Follow-through length over Downswing length; `None` if either is empty.
pub fn follow_through_ratio(timeline: &PhaseTimeline) -> Option<f64> {
    let downswing = timeline.span(Phase::Downswing).len;
    let follow = timeline.span(Phase::FollowThrough).len;
    (downswing > 0 && follow > 0).then(|| follow as f64 / downswing as f64)
}

/// Summarizes feature values inside each phase span.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One summary per `(phase, category)`, phases in stroke order.
    pub fn summarize(&self, timeline: &PhaseTimeline, features: &[FeatureVector]) -> Vec<MetricSummary> {
        let mut summaries = Vec::with_capacity(Phase::ALL.len() * Category::ALL.len());

        for span in timeline.spans() {
            let in_span: Vec<&FeatureVector> =
                features.iter().filter(|fv| span.contains(fv.frame)).collect();

            for category in Category::ALL {
                let source = category_source(category);
                let values: Vec<f64> = match source {
                    CategorySource::Metric(metric) => in_span
                        .iter()
                        .filter_map(|fv| fv.metric(metric))
                        .filter(|v| v.is_finite())
                        .collect(),
                    CategorySource::FollowThroughRatio => {
                        ratio_in(span, timeline).into_iter().collect()
                    }
                };

                let aggregate = match Stats::from_values(&values) {
                    Some(stats) => Aggregate::Stats(stats),
                    None => Aggregate::InsufficientData,
                };

                summaries.push(MetricSummary {
                    phase: span.phase,
                    category,
                    source,
                    frames: span.len,
                    aggregate,
                });
            }
        }

        let insufficient = summaries
            .iter()
            .filter(|s| s.aggregate == Aggregate::InsufficientData)
            .count();
        tracing::debug!(summaries = summaries.len(), insufficient, "Metrics aggregated");
        summaries
    }
}

fn ratio_in(span: &PhaseSpan, timeline: &PhaseTimeline) -> Option<f64> {
    (span.phase == Phase::FollowThrough)
        .then(|| follow_through_ratio(timeline))
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(elbows: &[Option<f64>]) -> Vec<FeatureVector> {
        elbows
            .iter()
            .enumerate()
            .map(|(i, elbow)| {
                let mut fv = FeatureVector::missing(i as u64, i as u64);
                fv.metrics.insert(Metric::ElbowAngle, *elbow);
                fv
            })
            .collect()
    }

    #[test]
    fn test_stats_per_span_ignore_missing() {
        let timeline =
            PhaseTimeline::from_entries(0, 6, [Some(0), Some(3), None, None, None, None]);
        let fvs = features(&[Some(100.0), None, Some(120.0), Some(150.0), Some(170.0), None]);
        let summaries = MetricsAggregator::new().summarize(&timeline, &fvs);

        assert_eq!(summaries.len(), 30);
        let stance = summaries
            .iter()
            .find(|s| s.phase == Phase::Stance && s.category == Category::SwingControl)
            .unwrap();
        let stats = stance.aggregate.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 110.0).abs() < 1e-9);
        assert_eq!(stance.frames, 3);

        let stride = summaries
            .iter()
            .find(|s| s.phase == Phase::Stride && s.category == Category::SwingControl)
            .unwrap();
        assert_eq!(stride.aggregate.stats().unwrap().max, 170.0);
    }

    #[test]
    fn test_follow_through_ratio_on_its_span() {
        let timeline = PhaseTimeline::from_entries(
            0,
            40,
            [Some(0), Some(5), Some(10), Some(20), Some(22), Some(37)],
        );
        assert_eq!(follow_through_ratio(&timeline), Some(1.5));

        let summaries = MetricsAggregator::new().summarize(&timeline, &features(&[None; 40]));
        for summary in summaries.iter().filter(|s| s.category == Category::FollowThrough) {
            assert_eq!(summary.source, CategorySource::FollowThroughRatio);
            match summary.phase {
                Phase::FollowThrough => {
                    let stats = summary.aggregate.stats().unwrap();
                    assert_eq!(stats.count, 1);
                    assert_eq!(stats.mean, 1.5);
                }
                _ => assert_eq!(summary.aggregate, Aggregate::InsufficientData),
            }
        }
    }

    #[test]
    fn test_follow_through_ratio_needs_both_spans() {
        let no_downswing =
            PhaseTimeline::from_entries(0, 20, [Some(0), Some(5), None, Some(8), Some(10), Some(15)]);
        assert_eq!(no_downswing.span(Phase::Downswing).len, 0);
        assert_eq!(follow_through_ratio(&no_downswing), None);

        let no_follow =
            PhaseTimeline::from_entries(0, 20, [Some(0), Some(5), Some(8), Some(10), None, Some(12)]);
        assert_eq!(follow_through_ratio(&no_follow), None);
        let summaries = MetricsAggregator::new().summarize(&no_follow, &features(&[None; 20]));
        assert!(summaries
            .iter()
            .filter(|s| s.category == Category::FollowThrough)
            .all(|s| s.aggregate == Aggregate::InsufficientData));
    }

    #[test]
    fn test_empty_span_is_insufficient() {
        let timeline = PhaseTimeline::from_entries(0, 3, [None; 6]);
        let summaries = MetricsAggregator::new().summarize(&timeline, &features(&[Some(90.0); 3]));
        for summary in summaries.iter().filter(|s| s.phase != Phase::Stance) {
            assert_eq!(summary.aggregate, Aggregate::InsufficientData);
        }
    }

    #[test]
    fn test_missing_metric_is_insufficient() {
        let timeline = PhaseTimeline::from_entries(0, 3, [None; 6]);
        let summaries = MetricsAggregator::new().summarize(&timeline, &features(&[Some(90.0); 3]));
        let footwork = summaries
            .iter()
            .find(|s| s.phase == Phase::Stance && s.category == Category::Footwork)
            .unwrap();
        assert_eq!(footwork.aggregate, Aggregate::InsufficientData);
    }
}
