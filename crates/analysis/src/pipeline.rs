//! Pipeline orchestration: frames in, evaluation out.
//!
//! Stage order is fixed: features and velocity per frame, then the signal
//! profile and contact detection over the whole sequence, then phase
//! segmentation, per-phase aggregation and scoring. Stage outputs are
//! memoized through [`PipelineCache`] when a cache is attached and the input
//! stream was consumed to the end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strokelab_cache::{Fingerprint, FingerprintHasher, PipelineCache};
use strokelab_common::error::{StrokeError, StrokeResult};
use strokelab_model::evaluation::{EvaluationResult, MetricsLogRow};
use strokelab_model::frame::FrameRecord;
use strokelab_model::phase::{Contact, PhaseTimeline};
use strokelab_model::signal::{FeatureVector, VelocitySample};

use crate::aggregate::MetricsAggregator;
use crate::config::AnalysisConfig;
use crate::contact::ContactDetector;
use crate::features::FeatureExtractor;
use crate::profile::SignalProfile;
use crate::scoring::Scorer;
use crate::segmentation::segment;
use crate::source::{FrameOrderValidator, FrameSource, VecFrameSource};
use crate::velocity::VelocityEstimator;

const STAGE_SIGNALS: &str = "signals";
const STAGE_CONTACT: &str = "contact";
const STAGE_EVALUATION: &str = "evaluation";

/// Per-frame derived signals of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub features: Vec<FeatureVector>,
    pub velocity: Vec<VelocitySample>,
    pub frames_with_keypoints: u64,
}

impl Signals {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn data_coverage(&self) -> f64 {
        if self.features.is_empty() {
            0.0
        } else {
            self.frames_with_keypoints as f64 / self.features.len() as f64
        }
    }
}

/// Incrementally builds [`Signals`] and the input fingerprint.
pub struct SignalBuilder {
    extractor: FeatureExtractor,
    estimator: VelocityEstimator,
    validator: FrameOrderValidator,
    hasher: FingerprintHasher,
    signals: Signals,
}

impl SignalBuilder {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            estimator: VelocityEstimator::new(config.velocity.clone()),
            validator: FrameOrderValidator::new(),
            hasher: FingerprintHasher::new(),
            signals: Signals::default(),
        }
    }

    /// Consume one frame. Fails on an out-of-order frame.
    pub fn push(&mut self, frame: &FrameRecord) -> StrokeResult<()> {
        self.validator.check(frame)?;
        self.hasher.update_json(frame)?;

        let features = self.extractor.extract(frame);
        let velocity = self.estimator.push(&features);
        if frame.has_any_keypoint() {
            self.signals.frames_with_keypoints += 1;
        }
        self.signals.features.push(features);
        self.signals.velocity.push(velocity);
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.signals.len()
    }

    pub fn finish(self) -> (Signals, Fingerprint) {
        (self.signals, self.hasher.finish())
    }
}

/// Result of one run, ready to be written as an artifact bundle.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub evaluation: EvaluationResult,
    pub metrics_log: Vec<MetricsLogRow>,
    pub input_fingerprint: Fingerprint,
    pub config_fingerprint: Fingerprint,
}

/// Runs the full analysis pipeline.
pub struct StrokeAnalyzer {
    config: AnalysisConfig,
    scorer: Scorer,
    cache: Option<Arc<PipelineCache>>,
}

impl StrokeAnalyzer {
    pub fn new(config: AnalysisConfig) -> StrokeResult<Self> {
        config.validate()?;
        let scorer = Scorer::new(config.scoring.clone())?;
        Ok(Self {
            config,
            scorer,
            cache: None,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: AnalysisConfig::default(),
            scorer: Scorer::with_defaults(),
            cache: None,
        }
    }

    /// Memoize stage outputs in `cache`.
    pub fn with_cache(mut self, cache: Arc<PipelineCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<PipelineCache>> {
        self.cache.as_ref()
    }

    /// Analyze an in-memory frame sequence.
    pub fn analyze_frames(&self, frames: &[FrameRecord]) -> StrokeResult<AnalysisOutput> {
        if frames.is_empty() {
            return Err(StrokeError::EmptyStream);
        }

        let mut hasher = FingerprintHasher::new();
        for frame in frames {
            hasher.update_json(frame)?;
        }
        let input = hasher.finish();

        let signals = self.cached(Some(input), STAGE_SIGNALS, &self.signals_key(), || {
            let mut builder = SignalBuilder::new(&self.config);
            for frame in frames {
                builder.push(frame)?;
            }
            Ok(builder.finish().0)
        })?;

        let profile = self.profile_stage(&signals);
        let contact = self.contact_stage(&signals, Some(input))?;
        self.finish(&signals, profile, contact, input, true)
    }

    /// Drain `source` and analyze it synchronously.
    pub fn analyze_source(&self, source: &mut dyn FrameSource) -> StrokeResult<AnalysisOutput> {
        tracing::info!(source = source.name(), "Analyzing frame source");
        let mut builder = SignalBuilder::new(&self.config);
        while let Some(frame) = source.next_frame()? {
            builder.push(&frame)?;
        }
        if builder.frames() == 0 {
            return Err(StrokeError::EmptyStream);
        }

        let (signals, input) = builder.finish();
        let profile = self.profile_stage(&signals);
        let contact = self.contact_stage(&signals, Some(input))?;
        self.finish(&signals, profile, contact, input, true)
    }

    /// Convenience for callers holding an owned frame list.
    pub fn analyze_vec(&self, frames: Vec<FrameRecord>) -> StrokeResult<AnalysisOutput> {
        self.analyze_source(&mut VecFrameSource::new(frames))
    }

    pub(crate) fn profile_stage(&self, signals: &Signals) -> SignalProfile {
        SignalProfile::from_samples(&signals.velocity, &self.config.profile)
    }

    /// Contact detection. `input` is `None` for runs that must not touch
    /// the cache.
    pub(crate) fn contact_stage(
        &self,
        signals: &Signals,
        input: Option<Fingerprint>,
    ) -> StrokeResult<Contact> {
        let key = (&self.config.features, &self.config.velocity, &self.config.contact);
        let contact = self.cached(input, STAGE_CONTACT, &key, || {
            Ok(ContactDetector::new(self.config.contact.clone()).detect(&signals.velocity))
        })?;
        match &contact {
            Contact::Found(event) => tracing::info!(
                frame = event.frame,
                confidence = event.confidence,
                method = ?event.method,
                "Contact detected"
            ),
            Contact::NotFound { reason } => tracing::info!(reason = %reason, "No contact detected"),
        }
        Ok(contact)
    }

    /// Segmentation, aggregation and scoring.
    pub(crate) fn evaluation_stage(
        &self,
        signals: &Signals,
        profile: SignalProfile,
        contact: Contact,
        input: Option<Fingerprint>,
        complete: bool,
    ) -> StrokeResult<EvaluationResult> {
        self.cached(input, STAGE_EVALUATION, &self.config, || {
            let timeline = segment(
                &self.config.segmenter,
                profile,
                contact.frame(),
                &signals.features,
                &signals.velocity,
            )
            .ok_or(StrokeError::EmptyStream)?;
            self.check_timeline(signals, &timeline)?;

            let summaries = MetricsAggregator::new().summarize(&timeline, &signals.features);
            let scorecard = self.scorer.score(&summaries, &timeline);

            Ok(EvaluationResult {
                categories: scorecard.categories,
                overall: scorecard.overall,
                contact: contact.clone(),
                phases: timeline,
                summaries,
                complete,
                frames_processed: signals.len() as u64,
                data_coverage: signals.data_coverage(),
            })
        })
    }

    /// Evaluation plus metrics log for a finished signal set.
    pub(crate) fn finish(
        &self,
        signals: &Signals,
        profile: SignalProfile,
        contact: Contact,
        input: Fingerprint,
        complete: bool,
    ) -> StrokeResult<AnalysisOutput> {
        let cache_input = complete.then_some(input);
        let evaluation = self.evaluation_stage(signals, profile, contact, cache_input, complete)?;
        let metrics_log = metrics_log(signals, &evaluation.phases);

        if self.config.is_low_coverage(evaluation.data_coverage) {
            tracing::warn!(
                coverage = evaluation.data_coverage,
                "Most frames have no keypoints, ratings may be unscored"
            );
        }

        tracing::info!(
            frames = evaluation.frames_processed,
            scored = evaluation.scored_count(),
            overall = ?evaluation.overall,
            complete,
            "Analysis finished"
        );

        Ok(AnalysisOutput {
            evaluation,
            metrics_log,
            input_fingerprint: input,
            config_fingerprint: Fingerprint::of(&self.config)?,
        })
    }

    fn signals_key(&self) -> (&crate::features::FeatureConfig, &crate::velocity::VelocityConfig) {
        (&self.config.features, &self.config.velocity)
    }

    fn check_timeline(&self, signals: &Signals, timeline: &PhaseTimeline) -> StrokeResult<()> {
        let (Some(first), Some(last)) = (signals.features.first(), signals.features.last()) else {
            return Err(StrokeError::EmptyStream);
        };
        timeline
            .validate(first.frame, last.frame)
            .map_err(|e| StrokeError::analysis(format!("inconsistent phase timeline: {e}")))
    }

    fn cached<T, C, F>(
        &self,
        input: Option<Fingerprint>,
        stage: &str,
        config: &C,
        compute: F,
    ) -> StrokeResult<T>
    where
        T: Serialize + serde::de::DeserializeOwned,
        C: Serialize + ?Sized,
        F: FnOnce() -> StrokeResult<T>,
    {
        match (&self.cache, input) {
            (Some(cache), Some(input)) => cache.get_or_compute(input, stage, config, compute),
            _ => compute(),
        }
    }
}

/// One row per processed frame, tagged with its phase.
pub fn metrics_log(signals: &Signals, timeline: &PhaseTimeline) -> Vec<MetricsLogRow> {
    signals
        .features
        .iter()
        .zip(&signals.velocity)
        .map(|(fv, vs)| MetricsLogRow {
            frame: fv.frame,
            timestamp_secs: strokelab_common::timing::ns_to_secs(fv.timestamp_ns),
            metrics: fv.metrics.clone(),
            wrist_speed: vs.wrist_speed(),
            phase: timeline.phase_at(fv.frame),
        })
        .collect()
}
