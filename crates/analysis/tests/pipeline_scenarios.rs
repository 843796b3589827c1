mod common;

use std::sync::Arc;

use common::{blank_frames, swing_frames, swing_frames_with_gaps, CONTACT_FRAME};
use strokelab_analysis::{AnalysisConfig, StrokeAnalyzer};
use strokelab_cache::{Fingerprint, FsCacheStore, MemoryCacheStore, PipelineCache};
use strokelab_common::error::StrokeError;
use strokelab_model::evaluation::{Category, Rating};
use strokelab_model::frame::FrameRecord;
use strokelab_model::phase::{Contact, ContactMethod, Phase};

#[test]
fn swing_spike_is_detected_as_contact() {
    let analyzer = StrokeAnalyzer::with_defaults();
    let output = analyzer.analyze_frames(&swing_frames(120)).unwrap();
    let evaluation = &output.evaluation;

    let Contact::Found(event) = &evaluation.contact else {
        panic!("expected contact, got {:?}", evaluation.contact);
    };
    assert_eq!(event.frame, CONTACT_FRAME);
    assert_eq!(event.method, ContactMethod::WristVelocityPeak);
    assert!(event.confidence > analyzer.config().contact.min_prominence);

    let phases = &evaluation.phases;
    phases.validate(0, 119).unwrap();
    assert_eq!(phases.span(Phase::Stride).start, 60);
    assert_eq!(phases.span(Phase::Downswing).start, 61);
    assert_eq!(phases.span(Phase::Impact).start, CONTACT_FRAME);
    assert!(phases.span(Phase::Impact).contains(CONTACT_FRAME));
    assert_eq!(phases.span(Phase::FollowThrough).start, 81);
    assert_eq!(phases.span(Phase::Recovery).start, 90);
    assert_eq!(phases.span(Phase::Recovery).end(), Some(119));
}

#[test]
fn swing_scores_every_category() {
    let output = StrokeAnalyzer::with_defaults()
        .analyze_frames(&swing_frames(120))
        .unwrap();
    let evaluation = &output.evaluation;

    assert!(evaluation.complete);
    assert_eq!(evaluation.frames_processed, 120);
    assert_eq!(evaluation.scored_count(), Category::ALL.len());
    for category in Category::ALL {
        let value = evaluation.rating(category).value().unwrap();
        assert!((1..=10).contains(&value), "{category:?} scored {value}");
        assert!(!evaluation.categories[&category].feedback.is_empty());
    }
    let overall = evaluation.overall.unwrap();
    assert!((1.0..=10.0).contains(&overall));
    assert_eq!(evaluation.summaries.len(), Phase::ALL.len() * Category::ALL.len());
    assert_eq!(output.metrics_log.len(), 120);
}

#[test]
fn all_missing_input_yields_unscored_stance() {
    let output = StrokeAnalyzer::with_defaults()
        .analyze_frames(&blank_frames(50))
        .unwrap();
    let evaluation = &output.evaluation;

    assert!(matches!(evaluation.contact, Contact::NotFound { .. }));
    assert_eq!(evaluation.phases.span(Phase::Stance).len, 50);
    for phase in &Phase::ALL[1..] {
        assert!(evaluation.phases.span(*phase).is_empty());
    }
    evaluation.phases.validate(0, 49).unwrap();

    assert_eq!(evaluation.scored_count(), 0);
    assert!(evaluation.overall.is_none());
    for category in Category::ALL {
        assert_eq!(evaluation.rating(category), Rating::Unscored);
        assert!(evaluation.categories[&category]
            .feedback
            .contains(category.label()));
    }
    assert_eq!(evaluation.data_coverage, 0.0);
    assert!(evaluation.complete);
}

#[test]
fn repeated_runs_are_identical() {
    let analyzer = StrokeAnalyzer::with_defaults();
    let frames = swing_frames(120);
    let first = analyzer.analyze_frames(&frames).unwrap();
    let second = analyzer.analyze_frames(&frames).unwrap();

    assert_eq!(first.evaluation, second.evaluation);
    assert_eq!(first.metrics_log, second.metrics_log);
    assert_eq!(first.input_fingerprint, second.input_fingerprint);
    assert_eq!(first.config_fingerprint, second.config_fingerprint);
}

#[test]
fn evaluation_signature_is_stable() {
    let signature = |count| {
        let output = StrokeAnalyzer::with_defaults()
            .analyze_frames(&swing_frames(count))
            .unwrap();
        Fingerprint::of(&output.evaluation).unwrap()
    };

    let reference = signature(120);
    assert_eq!(signature(120), reference);
    assert_ne!(signature(110), reference);
}

#[test]
fn cache_hit_matches_forced_miss() {
    let frames = swing_frames(120);
    let uncached = StrokeAnalyzer::with_defaults().analyze_frames(&frames).unwrap();

    let cache = Arc::new(PipelineCache::new(Arc::new(MemoryCacheStore::new())));
    let analyzer = StrokeAnalyzer::with_defaults().with_cache(cache.clone());
    let miss = analyzer.analyze_frames(&frames).unwrap();
    let hit = analyzer.analyze_frames(&frames).unwrap();

    assert_eq!(cache.stats().hits, 3);
    assert_eq!(miss.evaluation, uncached.evaluation);
    assert_eq!(hit.evaluation, uncached.evaluation);
    assert_eq!(hit.metrics_log, uncached.metrics_log);
}

#[test]
fn filesystem_cache_survives_a_new_analyzer() {
    let dir = std::env::temp_dir().join("strokelab_test_fs_pipeline_cache");
    let _ = std::fs::remove_dir_all(&dir);
    let frames = swing_frames(120);

    let store = Arc::new(FsCacheStore::open(&dir).unwrap());
    let first = StrokeAnalyzer::with_defaults()
        .with_cache(Arc::new(PipelineCache::new(store.clone())))
        .analyze_frames(&frames)
        .unwrap();

    let cache = Arc::new(PipelineCache::new(store));
    let second = StrokeAnalyzer::with_defaults()
        .with_cache(cache.clone())
        .analyze_frames(&frames)
        .unwrap();

    assert_eq!(cache.stats().hits, 3);
    assert_eq!(first.evaluation, second.evaluation);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn changed_config_misses_the_cache() {
    let frames = swing_frames(120);
    let cache = Arc::new(PipelineCache::new(Arc::new(MemoryCacheStore::new())));
    StrokeAnalyzer::with_defaults()
        .with_cache(cache.clone())
        .analyze_frames(&frames)
        .unwrap();

    let mut config = AnalysisConfig::default();
    config.segmenter.recovery_sustain_frames = 5;
    StrokeAnalyzer::new(config)
        .unwrap()
        .with_cache(cache.clone())
        .analyze_frames(&frames)
        .unwrap();

    // Signals and contact do not depend on the segmenter.
    assert_eq!(cache.stats().hits, 2);
    assert_eq!(cache.stats().misses, 4);
}

#[test]
fn sparse_gaps_do_not_move_contact() {
    let output = StrokeAnalyzer::with_defaults()
        .analyze_frames(&swing_frames_with_gaps(120))
        .unwrap();
    let evaluation = &output.evaluation;

    assert_eq!(evaluation.contact.frame(), Some(CONTACT_FRAME));
    assert!(evaluation.phases.span(Phase::Impact).contains(CONTACT_FRAME));
    evaluation.phases.validate(0, 119).unwrap();
    assert!((evaluation.data_coverage - 0.9).abs() < 1e-12);
    assert_eq!(evaluation.scored_count(), Category::ALL.len());

    let blank_row = &output.metrics_log[15];
    assert!(blank_row.wrist_speed.is_none());
    assert!(blank_row.metrics.values().all(Option::is_none));
}

#[test]
fn contact_lies_inside_downswing_or_impact() {
    for count in [90, 100, 120, 150] {
        let evaluation = StrokeAnalyzer::with_defaults()
            .analyze_frames(&swing_frames(count))
            .unwrap()
            .evaluation;
        let Some(contact) = evaluation.contact.frame() else {
            continue;
        };
        let phase = evaluation.phases.phase_at(contact);
        assert!(
            matches!(phase, Some(Phase::Downswing) | Some(Phase::Impact)),
            "contact {contact} fell in {phase:?} for {count} frames"
        );
    }
}

#[test]
fn empty_input_is_an_error() {
    let err = StrokeAnalyzer::with_defaults().analyze_frames(&[]).unwrap_err();
    assert!(matches!(err, StrokeError::EmptyStream));
    assert!(err.is_input_error());
}

#[test]
fn out_of_order_input_is_an_error() {
    let frames = vec![
        FrameRecord::empty(0, 0),
        FrameRecord::empty(1, 10),
        FrameRecord::empty(1, 20),
    ];
    let err = StrokeAnalyzer::with_defaults()
        .analyze_frames(&frames)
        .unwrap_err();
    assert!(matches!(err, StrokeError::OutOfOrder { previous: 1, current: 1 }));
    assert!(err.is_input_error());
}
