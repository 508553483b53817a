use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of one media source. Scoped to the stream that owns the source.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid WAV container: {0}")]
    InvalidContainer(&'static str),
    #[error("unsupported audio format: {sample_rate} Hz, {channels} channel(s) (expected 8000 Hz mono)")]
    UnsupportedFormat { sample_rate: u32, channels: u16 },
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("seek failed: {0}")]
    Seek(#[source] io::Error),
}

impl MediaError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MediaError::Open {
            path: path.into(),
            source,
        }
    }
}
