use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// One unit handed to the transport: an opaque payload plus its nominal
/// playout duration.
/// The payload is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSample {
    pub payload: Bytes,
    pub duration: Duration,
}

impl MediaSample {
    pub fn new(payload: impl Into<Bytes>, duration: Duration) -> Self {
        Self {
            payload: payload.into(),
            duration,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Which of the two per-session streams a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}
