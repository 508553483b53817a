//! # loopcast-media
//!
//! Turns two static media files into paced, correctly bounded sample units
//! for a real-time transport.
//!
//! ## Crate structure
//!
//! - [`sample`]: `MediaSample`, the unit handed to a transport
//! - [`sink`]: `SampleSink`, the seam to the external transport
//! - [`pacer`]: `Pacer`, the open-loop delay applied after each push
//! - [`audio`]: WAV container parsing and fixed-duration audio chunking
//! - [`video`]: Annex B access-unit framing and NAL classification
//! - [`error`]: `MediaError`

pub mod audio;
pub mod error;
pub mod pacer;
pub mod sample;
pub mod sink;
pub mod video;

mod read;

pub use audio::{AudioFormat, AudioFramer, AudioSourceHandle};
pub use error::MediaError;
pub use pacer::{Pacer, SleepPacer, Unpaced};
pub use sample::{MediaKind, MediaSample};
pub use sink::{SampleSink, SinkError};
pub use video::{ScannerKind, StartCodeScanner, VideoFramer, VideoSourceHandle};
