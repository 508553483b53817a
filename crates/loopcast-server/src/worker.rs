//! Per-stream worker: pulls samples from a framer, pushes them to the sink,
//! and paces between pushes. Runs on a blocking thread; file reads and the
//! pacing sleep both block it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loopcast_media::{MediaError, MediaKind, MediaSample, Pacer, SampleSink, SinkError};
use thiserror::Error;

/// Cooperative cancellation shared by a session's workers. Checked between
/// samples; a read or push already in flight is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a stream stopped early.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("worker panicked")]
    Panicked,
}

#[derive(Debug)]
pub enum StreamEnd {
    /// Source fully delivered.
    Exhausted,
    /// Session cancellation observed between samples.
    Cancelled,
    Failed(StreamError),
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Exhausted => f.write_str("exhausted"),
            StreamEnd::Cancelled => f.write_str("cancelled"),
            StreamEnd::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Result of one stream of one session.
#[derive(Debug)]
pub struct StreamOutcome {
    pub kind: MediaKind,
    pub samples_pushed: u64,
    pub bytes_pushed: u64,
    pub end: StreamEnd,
}

impl StreamOutcome {
    pub(crate) fn panicked(kind: MediaKind) -> Self {
        Self {
            kind,
            samples_pushed: 0,
            bytes_pushed: 0,
            end: StreamEnd::Failed(StreamError::Panicked),
        }
    }
}

/// Everything a worker needs besides its sample source.
pub(crate) struct StreamWorker {
    pub session_id: u64,
    pub kind: MediaKind,
    pub sink: Arc<dyn SampleSink>,
    pub pacer: Arc<dyn Pacer>,
    pub cancel: CancelFlag,
}

impl StreamWorker {
    /// Drive `samples` to the sink until exhausted, cancelled or failed.
    ///
    /// No sample is pushed once cancellation has been observed, including a
    /// sample whose read finished after the flag was raised.
    pub fn run<I>(self, samples: I) -> StreamOutcome
    where
        I: Iterator<Item = Result<MediaSample, MediaError>>,
    {
        let mut samples = samples;
        let mut samples_pushed = 0u64;
        let mut bytes_pushed = 0u64;

        let end = loop {
            if self.cancel.is_cancelled() {
                break StreamEnd::Cancelled;
            }
            let sample = match samples.next() {
                None => break StreamEnd::Exhausted,
                Some(Ok(sample)) => sample,
                Some(Err(e)) => break StreamEnd::Failed(e.into()),
            };
            if self.cancel.is_cancelled() {
                break StreamEnd::Cancelled;
            }

            let len = sample.len() as u64;
            let duration = sample.duration;
            if let Err(e) = self.sink.push(sample) {
                break StreamEnd::Failed(e.into());
            }
            samples_pushed += 1;
            bytes_pushed += len;
            tracing::trace!(
                session_id = self.session_id,
                stream = %self.kind,
                len,
                "sample pushed"
            );

            self.pacer.pace(duration);
        };

        match &end {
            StreamEnd::Failed(e) => tracing::warn!(
                session_id = self.session_id,
                stream = %self.kind,
                pushed = samples_pushed,
                error = %e,
                "stream aborted"
            ),
            other => tracing::info!(
                session_id = self.session_id,
                stream = %self.kind,
                pushed = samples_pushed,
                end = %other,
                "stream finished"
            ),
        }

        StreamOutcome {
            kind: self.kind,
            samples_pushed,
            bytes_pushed,
            end,
        }
    }
}
