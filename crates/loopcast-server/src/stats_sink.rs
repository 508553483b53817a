//! A sink that accepts everything and only counts. Stands in for a transport
//! during dry runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use loopcast_media::{MediaKind, MediaSample, SampleSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkStats {
    pub samples: u64,
    pub bytes: u64,
    /// Sum of nominal durations pushed.
    pub media_time: Duration,
}

#[derive(Debug)]
pub struct StatsSink {
    kind: MediaKind,
    samples: AtomicU64,
    bytes: AtomicU64,
    media_time_ns: AtomicU64,
}

impl StatsSink {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            samples: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            media_time_ns: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            samples: self.samples.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            media_time: Duration::from_nanos(self.media_time_ns.load(Ordering::Relaxed)),
        }
    }
}

impl SampleSink for StatsSink {
    fn push(&self, sample: MediaSample) -> Result<(), SinkError> {
        let n = self.samples.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes.fetch_add(sample.len() as u64, Ordering::Relaxed);
        self.media_time_ns
            .fetch_add(sample.duration.as_nanos() as u64, Ordering::Relaxed);
        tracing::debug!(stream = %self.kind, n, len = sample.len(), "dry-run sample");
        Ok(())
    }
}
