//! # Video Framer
//!
//! Splits a raw Annex B elementary stream into access units and emits one
//! per tick at a fixed nominal duration (1/30 s by default). There is no
//! container: boundaries come from start codes alone, found by a pluggable
//! [`StartCodeScanner`].

pub mod nal;
pub mod scanner;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::iter::FusedIterator;
use std::path::Path;
use std::time::Duration;

use crate::error::MediaError;
use crate::sample::MediaSample;

pub use scanner::{AlignedWindow, AnyScanner, ByteScan, ScannerKind, StartCodeScanner};

/// An open, seekable elementary-stream source.
#[derive(Debug)]
pub struct VideoSourceHandle<R = BufReader<File>> {
    reader: R,
}

impl VideoSourceHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MediaError::open(path, e))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read + Seek> VideoSourceHandle<R> {
    pub fn from_reader(reader: R) -> Self {
        Self { reader }
    }

    /// Consume the handle into a framer emitting one access unit per
    /// `frame_duration`.
    pub fn into_framer<S: StartCodeScanner>(self, frame_duration: Duration, scanner: S) -> VideoFramer<R, S> {
        VideoFramer {
            source: self.reader,
            scanner,
            frame_duration,
            done: false,
        }
    }
}

/// Lazy, finite sequence of access units.
///
/// Ends with `None` at end of stream. A read or seek error is yielded once as
/// `Some(Err(_))`, after which the framer is exhausted.
#[derive(Debug)]
pub struct VideoFramer<R, S = AnyScanner> {
    source: R,
    scanner: S,
    frame_duration: Duration,
    done: bool,
}

impl<R, S> VideoFramer<R, S> {
    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}

impl<R: Read + Seek, S: StartCodeScanner> Iterator for VideoFramer<R, S> {
    type Item = Result<MediaSample, MediaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.scanner.next_access_unit(&mut self.source) {
            Ok(Some(unit)) => Some(Ok(MediaSample::new(unit, self.frame_duration))),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek, S: StartCodeScanner> FusedIterator for VideoFramer<R, S> {}

/// Duration of one frame at `fps` frames per second.
pub fn frame_duration(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}
