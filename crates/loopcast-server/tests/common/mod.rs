//! Fixture files shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::time::Duration;

use loopcast_server::config::{MediaConfig, SessionConfig};
use tempfile::{NamedTempFile, TempDir};

const WAVE_FORMAT_ALAW: u16 = 0x0006;

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// A RIFF/WAVE file with a single-channel 8-bit `fmt ` chunk.
pub fn wav(format_tag: u16, sample_rate: u32, payload: &[u8]) -> Vec<u8> {
    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&format_tag.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&8u16.to_le_bytes());

    let body = [chunk(b"fmt ", &fmt), chunk(b"data", payload)].concat();
    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(&body);
    out
}

pub fn alaw_wav(payload_len: usize) -> Vec<u8> {
    wav(WAVE_FORMAT_ALAW, 8000, &vec![0xD5; payload_len])
}

/// `units` HEVC slices, each a 4-byte start code plus 8 bytes, so every
/// marker sits on a 4-byte boundary.
pub fn hevc_stream(units: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(units * 12);
    for i in 0..units {
        out.extend_from_slice(&[0, 0, 0, 1, 0x02, 0x01]);
        out.extend_from_slice(&[i as u8, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    }
    out
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Both backing files inside one temp dir, plus a media config pointing at them.
pub struct Fixture {
    pub dir: TempDir,
    pub media: MediaConfig,
}

impl Fixture {
    pub fn new(audio_payload_len: usize, video_units: usize) -> Self {
        Self::with_audio(alaw_wav(audio_payload_len), video_units)
    }

    pub fn with_audio(audio: Vec<u8>, video_units: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let audio_path = dir.path().join("audio.wav");
        let video_path = dir.path().join("video.h265");
        std::fs::write(&audio_path, audio).unwrap();
        std::fs::write(&video_path, hevc_stream(video_units)).unwrap();
        let media = MediaConfig {
            audio_path,
            video_path,
            ..MediaConfig::default()
        };
        Self { dir, media }
    }
}

pub fn deadline(d: Duration) -> SessionConfig {
    SessionConfig { deadline: d }
}
