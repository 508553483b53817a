//! # Audio Framer
//!
//! Reads a RIFF/WAVE container holding pre-encoded companded PCM and slices
//! the `data` chunk into fixed-duration samples. No resampling or re-encoding
//! happens here: the file must already be in the wire format.
//!
//! At 8 kHz mono with one byte per sample, a 20 ms frame is 160 bytes. The
//! last chunk of a file may be shorter; it is emitted as read, never padded.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Take};
use std::iter::FusedIterator;
use std::path::Path;
use std::time::Duration;

use bytes::Buf;

use crate::error::MediaError;
use crate::read::read_full;
use crate::sample::MediaSample;

/// Sample rate every audio source must declare.
pub const REQUIRED_SAMPLE_RATE: u32 = 8000;
/// Channel count every audio source must declare.
pub const REQUIRED_CHANNELS: u16 = 1;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_ALAW: u16 = 0x0006;
const WAVE_FORMAT_MULAW: u16 = 0x0007;

/// Sample encoding declared by the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pcm,
    ALaw,
    MuLaw,
    Other(u16),
}

impl Encoding {
    fn from_tag(tag: u16) -> Self {
        match tag {
            WAVE_FORMAT_PCM => Encoding::Pcm,
            WAVE_FORMAT_ALAW => Encoding::ALaw,
            WAVE_FORMAT_MULAW => Encoding::MuLaw,
            other => Encoding::Other(other),
        }
    }

    /// A-law or mu-law: logarithmic 8-bit encodings.
    pub fn is_companded(&self) -> bool {
        matches!(self, Encoding::ALaw | Encoding::MuLaw)
    }
}

/// Decoded `fmt ` chunk fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub encoding: Encoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Bytes for one sample across all channels.
    pub fn bytes_per_frame(&self) -> usize {
        let per_channel = self.bits_per_sample.div_ceil(8).max(1) as usize;
        per_channel * self.channels as usize
    }

    /// Payload bytes covering `duration` of audio. Never zero.
    pub fn chunk_len(&self, duration: Duration) -> usize {
        let bytes_per_sec = self.sample_rate as u128 * self.bytes_per_frame() as u128;
        let len = bytes_per_sec * duration.as_nanos() / 1_000_000_000;
        usize::try_from(len).unwrap_or(usize::MAX).max(1)
    }
}

/// An open audio source whose header has been parsed and validated as
/// 8 kHz mono. The reader is positioned at the first payload byte.
#[derive(Debug)]
pub struct AudioSourceHandle<R = BufReader<File>> {
    reader: R,
    format: AudioFormat,
    data_len: Option<u64>,
}

impl AudioSourceHandle {
    /// Open and validate a WAV file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MediaError::open(path, e))?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> AudioSourceHandle<R> {
    /// Parse the container header from `reader` and check the format.
    ///
    /// Fails before any payload is read if the source is not 8 kHz mono.
    pub fn from_reader(mut reader: R) -> Result<Self, MediaError> {
        let (format, data_len) = read_header(&mut reader)?;

        if format.sample_rate != REQUIRED_SAMPLE_RATE || format.channels != REQUIRED_CHANNELS {
            return Err(MediaError::UnsupportedFormat {
                sample_rate: format.sample_rate,
                channels: format.channels,
            });
        }
        if !format.encoding.is_companded() || format.bits_per_sample != 8 {
            tracing::warn!(
                encoding = ?format.encoding,
                bits_per_sample = format.bits_per_sample,
                "audio is not 8-bit companded PCM, streaming bytes as-is"
            );
        }

        Ok(Self {
            reader,
            format,
            data_len,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channels
    }

    /// Declared `data` chunk size, or `None` when the writer left it unset
    /// and the payload runs to end of file.
    pub fn data_len(&self) -> Option<u64> {
        self.data_len
    }

    /// Consume the handle into a framer emitting `frame_duration` chunks.
    pub fn into_framer(self, frame_duration: Duration) -> AudioFramer<R> {
        let chunk_len = self.format.chunk_len(frame_duration);
        AudioFramer {
            reader: self.reader.take(self.data_len.unwrap_or(u64::MAX)),
            chunk_len,
            frame_duration,
            done: false,
        }
    }
}

/// Lazy, finite sequence of fixed-duration audio samples.
///
/// Ends with `None` at end of payload. A read error is yielded once as
/// `Some(Err(_))`, after which the framer is exhausted.
#[derive(Debug)]
pub struct AudioFramer<R> {
    reader: Take<R>,
    chunk_len: usize,
    frame_duration: Duration,
    done: bool,
}

impl<R> AudioFramer<R> {
    /// Bytes per full chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}

impl<R: Read> Iterator for AudioFramer<R> {
    type Item = Result<MediaSample, MediaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = vec![0u8; self.chunk_len];
        match read_full(&mut self.reader, &mut chunk) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                if n < self.chunk_len {
                    // Short read only happens at end of payload.
                    self.done = true;
                    chunk.truncate(n);
                }
                Some(Ok(MediaSample::new(chunk, self.frame_duration)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(MediaError::Read(e)))
            }
        }
    }
}

impl<R: Read> FusedIterator for AudioFramer<R> {}

// ─── RIFF/WAVE header ───────────────────────────────────────────────────────

/// Walk the RIFF chunk list up to the `data` chunk.
///
/// Returns the decoded format and the declared payload length, leaving the
/// reader at the first payload byte.
fn read_header<R: Read + Seek>(reader: &mut R) -> Result<(AudioFormat, Option<u64>), MediaError> {
    let mut riff = [0u8; 12];
    read_exact(reader, &mut riff, "truncated RIFF header")?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(MediaError::InvalidContainer("missing RIFF/WAVE signature"));
    }

    let mut format = None;
    loop {
        let mut header = [0u8; 8];
        let n = read_full(reader, &mut header).map_err(MediaError::Read)?;
        if n < header.len() {
            return Err(MediaError::InvalidContainer("no data chunk"));
        }
        let id = [header[0], header[1], header[2], header[3]];
        let size = (&header[4..]).get_u32_le();
        // Chunk bodies are padded to an even length.
        let padded = size as u64 + (size as u64 & 1);

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(MediaError::InvalidContainer("fmt chunk too short"));
                }
                let mut body = [0u8; 16];
                read_exact(reader, &mut body, "truncated fmt chunk")?;
                let mut b = &body[..];
                let tag = b.get_u16_le();
                let channels = b.get_u16_le();
                let sample_rate = b.get_u32_le();
                let _byte_rate = b.get_u32_le();
                let _block_align = b.get_u16_le();
                let bits_per_sample = b.get_u16_le();
                skip(reader, padded - 16)?;

                format = Some(AudioFormat {
                    encoding: Encoding::from_tag(tag),
                    sample_rate,
                    channels,
                    bits_per_sample,
                });
            }
            b"data" => {
                let format =
                    format.ok_or(MediaError::InvalidContainer("data chunk precedes fmt chunk"))?;
                // Streaming writers leave the size at u32::MAX. A declared 0
                // is an empty payload, not an unknown one.
                let data_len = match size {
                    u32::MAX => None,
                    n => Some(n as u64),
                };
                return Ok((format, data_len));
            }
            _ => skip(reader, padded)?,
        }
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], truncated: &'static str) -> Result<(), MediaError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MediaError::InvalidContainer(truncated)
        } else {
            MediaError::Read(e)
        }
    })
}

fn skip<R: Seek>(reader: &mut R, len: u64) -> Result<(), MediaError> {
    if len > 0 {
        reader
            .seek(SeekFrom::Current(len as i64))
            .map_err(MediaError::Seek)?;
    }
    Ok(())
}
