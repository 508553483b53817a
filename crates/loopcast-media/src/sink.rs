//! # Sample Sink
//!
//! The seam between the framers and the external real-time transport. A
//! transport attaches one sink per track; everything after `push` (packetizing,
//! timestamps, RTP, encryption) belongs to the transport.

use std::sync::Arc;

use thiserror::Error;

use crate::sample::MediaSample;

/// Transport refused a sample. Fatal to the stream that pushed it.
#[derive(Debug, Error)]
#[error("sink rejected sample: {reason}")]
pub struct SinkError {
    reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Accepts timestamped media samples for delivery.
///
/// `push` is called from a blocking worker, one sample at a time, in file
/// order. Ownership of the sample moves to the sink.
pub trait SampleSink: Send + Sync {
    fn push(&self, sample: MediaSample) -> Result<(), SinkError>;
}

impl<T: SampleSink + ?Sized> SampleSink for Arc<T> {
    fn push(&self, sample: MediaSample) -> Result<(), SinkError> {
        (**self).push(sample)
    }
}

impl<T: SampleSink + ?Sized> SampleSink for Box<T> {
    fn push(&self, sample: MediaSample) -> Result<(), SinkError> {
        (**self).push(sample)
    }
}
