//! Streaming driver.
//!
//! A blocking producer task pulls frames from the source and hands them over
//! a bounded channel; the consumer derives signals frame by frame and checks
//! the cancel flag between frames. Once the stream ends (or is cancelled),
//! the signal profile and contact detection run concurrently and the
//! remaining stages follow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strokelab_common::error::{StrokeError, StrokeResult};
use strokelab_model::frame::FrameRecord;
use tokio::sync::mpsc;

use crate::pipeline::{AnalysisOutput, SignalBuilder, StrokeAnalyzer};
use crate::source::FrameSource;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub struct StreamingAnalyzer {
    analyzer: Arc<StrokeAnalyzer>,
    channel_capacity: usize,
    cancel: Arc<AtomicBool>,
}

impl StreamingAnalyzer {
    pub fn new(analyzer: Arc<StrokeAnalyzer>) -> Self {
        Self {
            analyzer,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Shared flag; setting it stops the run after the current frame.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run the pipeline over `source`.
    ///
    /// A cancelled run still produces a result over the frames seen so far,
    /// marked incomplete. Cancelling before any frame was consumed yields
    /// [`StrokeError::EmptyStream`].
    pub async fn run<S>(&self, mut source: S) -> StrokeResult<AnalysisOutput>
    where
        S: FrameSource + 'static,
    {
        // `Ok(None)` marks the end of the source. A channel that closes
        // without it means the producer stopped early.
        let (tx, mut rx) = mpsc::channel::<StrokeResult<Option<FrameRecord>>>(self.channel_capacity);
        let producer_cancel = self.cancel.clone();
        let source_name = source.name().to_string();

        let producer = tokio::task::spawn_blocking(move || {
            while !producer_cancel.load(Ordering::SeqCst) {
                let next = source.next_frame();
                let last = !matches!(next, Ok(Some(_)));
                if tx.blocking_send(next).is_err() || last {
                    break;
                }
            }
        });

        tracing::info!(source = %source_name, "Streaming analysis started");

        let mut builder = SignalBuilder::new(self.analyzer.config());
        let mut complete = true;
        let mut failure = None;

        loop {
            if self.is_cancelled() {
                complete = false;
                break;
            }
            match rx.recv().await {
                Some(Ok(Some(frame))) => {
                    if let Err(e) = builder.push(&frame) {
                        failure = Some(e);
                        break;
                    }
                }
                Some(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                Some(Ok(None)) => break,
                None => {
                    complete = false;
                    break;
                }
            }
        }

        // Unblocks a producer waiting on a full channel.
        drop(rx);
        producer
            .await
            .map_err(|e| StrokeError::analysis(format!("frame producer failed: {e}")))?;

        if let Some(e) = failure {
            return Err(e);
        }
        if builder.frames() == 0 {
            return Err(StrokeError::EmptyStream);
        }
        if !complete {
            tracing::warn!(frames = builder.frames(), "Analysis cancelled, result is partial");
        }

        let (signals, input) = builder.finish();
        let signals = Arc::new(signals);
        let cache_input = complete.then_some(input);

        let profile_task = {
            let analyzer = self.analyzer.clone();
            let signals = signals.clone();
            tokio::task::spawn_blocking(move || analyzer.profile_stage(&signals))
        };
        let contact_task = {
            let analyzer = self.analyzer.clone();
            let signals = signals.clone();
            tokio::task::spawn_blocking(move || analyzer.contact_stage(&signals, cache_input))
        };
        let (profile, contact) = tokio::join!(profile_task, contact_task);
        let profile = profile.map_err(join_error)?;
        let contact = contact.map_err(join_error)??;

        let analyzer = self.analyzer.clone();
        tokio::task::spawn_blocking(move || {
            analyzer.finish(&signals, profile, contact, input, complete)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(e: tokio::task::JoinError) -> StrokeError {
    StrokeError::analysis(format!("analysis task failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecFrameSource;

    #[tokio::test]
    async fn test_empty_source() {
        let streaming = StreamingAnalyzer::new(Arc::new(StrokeAnalyzer::with_defaults()));
        let result = streaming.run(VecFrameSource::new(Vec::new())).await;
        assert!(matches!(result, Err(StrokeError::EmptyStream)));
    }

    #[tokio::test]
    async fn test_cancel_before_start_is_empty() {
        let streaming = StreamingAnalyzer::new(Arc::new(StrokeAnalyzer::with_defaults()));
        streaming.cancel();
        let frames = (0..10).map(|i| FrameRecord::empty(i, i * 1_000)).collect();
        let result = streaming.run(VecFrameSource::new(frames)).await;
        assert!(matches!(result, Err(StrokeError::EmptyStream)));
    }

    #[tokio::test]
    async fn test_out_of_order_source_fails() {
        let streaming = StreamingAnalyzer::new(Arc::new(StrokeAnalyzer::with_defaults()))
            .with_channel_capacity(1);
        let frames = vec![
            FrameRecord::empty(0, 0),
            FrameRecord::empty(2, 2_000),
            FrameRecord::empty(1, 3_000),
        ];
        let result = streaming.run(VecFrameSource::new(frames)).await;
        assert!(matches!(result, Err(StrokeError::OutOfOrder { .. })));
    }
}
