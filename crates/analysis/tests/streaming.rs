mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::swing_frames;
use strokelab_analysis::{FrameSource, StrokeAnalyzer, StreamingAnalyzer, VecFrameSource};
use strokelab_cache::{MemoryCacheStore, PipelineCache};
use strokelab_common::error::StrokeResult;
use strokelab_model::frame::FrameRecord;

/// Yields frames and raises the cancel flag once `trip_at` is reached.
struct TrippingSource {
    inner: VecFrameSource,
    produced: u64,
    trip_at: u64,
    cancel: Arc<AtomicBool>,
}

impl FrameSource for TrippingSource {
    fn next_frame(&mut self) -> StrokeResult<Option<FrameRecord>> {
        if self.produced == self.trip_at {
            self.cancel.store(true, Ordering::SeqCst);
        }
        self.produced += 1;
        self.inner.next_frame()
    }

    fn name(&self) -> &str {
        "tripping"
    }
}

/// Raises the cancel flag from another thread shortly after `trip_at` is
/// handed out, so the flag can land while the consumer waits on the channel.
struct DelayedCancelSource {
    inner: VecFrameSource,
    produced: u64,
    trip_at: u64,
    cancel: Arc<AtomicBool>,
}

impl FrameSource for DelayedCancelSource {
    fn next_frame(&mut self) -> StrokeResult<Option<FrameRecord>> {
        if self.produced == self.trip_at {
            let cancel = self.cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_micros(50));
                cancel.store(true, Ordering::SeqCst);
            });
        }
        self.produced += 1;
        self.inner.next_frame()
    }

    fn name(&self) -> &str {
        "delayed-cancel"
    }
}

#[tokio::test]
async fn streaming_matches_batch() {
    let analyzer = Arc::new(StrokeAnalyzer::with_defaults());
    let batch = analyzer.analyze_frames(&swing_frames(120)).unwrap();

    let streaming = StreamingAnalyzer::new(analyzer.clone()).with_channel_capacity(4);
    let streamed = streaming
        .run(VecFrameSource::new(swing_frames(120)))
        .await
        .unwrap();

    assert!(streamed.evaluation.complete);
    assert_eq!(streamed.evaluation, batch.evaluation);
    assert_eq!(streamed.metrics_log, batch.metrics_log);
    assert_eq!(streamed.input_fingerprint, batch.input_fingerprint);
}

#[tokio::test]
async fn cancelled_run_is_partial_and_uncached() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = Arc::new(PipelineCache::new(store.clone()));
    let analyzer = Arc::new(StrokeAnalyzer::with_defaults().with_cache(cache));
    let streaming = StreamingAnalyzer::new(analyzer).with_channel_capacity(1);

    let source = TrippingSource {
        inner: VecFrameSource::new(swing_frames(120)),
        produced: 0,
        trip_at: 50,
        cancel: streaming.cancel_flag(),
    };
    let output = streaming.run(source).await.unwrap();
    let evaluation = &output.evaluation;

    assert!(!evaluation.complete);
    assert!(evaluation.frames_processed > 0);
    assert!(evaluation.frames_processed < 120);
    evaluation
        .phases
        .validate(0, evaluation.frames_processed - 1)
        .unwrap();
    assert_eq!(output.metrics_log.len() as u64, evaluation.frames_processed);
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_wait_never_reports_complete() {
    const FRAMES: u64 = 50;

    for _ in 0..200 {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = Arc::new(PipelineCache::new(store.clone()));
        let analyzer = Arc::new(StrokeAnalyzer::with_defaults().with_cache(cache));
        let streaming = StreamingAnalyzer::new(analyzer).with_channel_capacity(1);

        let source = DelayedCancelSource {
            inner: VecFrameSource::new(swing_frames(FRAMES)),
            produced: 0,
            trip_at: 10,
            cancel: streaming.cancel_flag(),
        };
        let output = streaming.run(source).await.unwrap();
        let evaluation = &output.evaluation;

        if evaluation.frames_processed < FRAMES {
            assert!(
                !evaluation.complete,
                "{} of {FRAMES} frames marked complete",
                evaluation.frames_processed
            );
            assert!(store.is_empty());
        }
        if evaluation.complete {
            assert_eq!(evaluation.frames_processed, FRAMES);
        }
    }
}

#[tokio::test]
async fn exhausted_source_is_complete() {
    let streaming = StreamingAnalyzer::new(Arc::new(StrokeAnalyzer::with_defaults()))
        .with_channel_capacity(1);
    let output = streaming
        .run(VecFrameSource::new(swing_frames(30)))
        .await
        .unwrap();
    assert!(output.evaluation.complete);
    assert_eq!(output.evaluation.frames_processed, 30);
}
