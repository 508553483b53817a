//! Frame both backing files without pacing and summarize what a session
//! would stream.

use std::fmt;
use std::time::Duration;

use loopcast_media::video::nal::{NalClass, NalHeader};
use loopcast_media::{AudioFormat, AudioSourceHandle, VideoSourceHandle};

use crate::config::MediaConfig;
use crate::session::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioProbe {
    pub format: AudioFormat,
    pub chunk_len: usize,
    pub chunks: u64,
    pub bytes: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoProbe {
    pub units: u64,
    pub bytes: u64,
    pub largest_unit: usize,
    pub keyframes: u64,
    pub parameter_sets: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub audio: AudioProbe,
    pub video: VideoProbe,
}

pub fn probe(media: &MediaConfig) -> Result<ProbeReport, SessionError> {
    Ok(ProbeReport {
        audio: probe_audio(media)?,
        video: probe_video(media)?,
    })
}

fn probe_audio(media: &MediaConfig) -> Result<AudioProbe, SessionError> {
    let handle = AudioSourceHandle::open(&media.audio_path).map_err(SessionError::Audio)?;
    let format = handle.format();
    let framer = handle.into_framer(media.audio_frame);
    let chunk_len = framer.chunk_len();

    let mut chunks = 0u64;
    let mut bytes = 0u64;
    for sample in framer {
        let sample = sample.map_err(SessionError::Audio)?;
        chunks += 1;
        bytes += sample.len() as u64;
    }

    Ok(AudioProbe {
        format,
        chunk_len,
        chunks,
        bytes,
        duration: media.audio_frame * chunks as u32,
    })
}

fn probe_video(media: &MediaConfig) -> Result<VideoProbe, SessionError> {
    let framer = VideoSourceHandle::open(&media.video_path)
        .map_err(SessionError::Video)?
        .into_framer(media.video_frame, media.scanner.scanner());

    let mut report = VideoProbe::default();
    for sample in framer {
        let sample = sample.map_err(SessionError::Video)?;
        report.units += 1;
        report.bytes += sample.len() as u64;
        report.largest_unit = report.largest_unit.max(sample.len());
        match NalHeader::parse(&sample.payload, media.video_codec).map(|h| h.class) {
            Some(NalClass::Keyframe) => report.keyframes += 1,
            Some(NalClass::ParameterSet) => report.parameter_sets += 1,
            _ => {}
        }
    }
    report.duration = media.video_frame * report.units as u32;
    Ok(report)
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.audio;
        writeln!(
            f,
            "audio: {:?} {} Hz {} ch {}-bit, {} chunks of {} bytes ({} bytes, {:.2}s)",
            a.format.encoding,
            a.format.sample_rate,
            a.format.channels,
            a.format.bits_per_sample,
            a.chunks,
            a.chunk_len,
            a.bytes,
            a.duration.as_secs_f64()
        )?;
        let v = &self.video;
        write!(
            f,
            "video: {} access units ({} keyframes, {} parameter sets), {} bytes, largest {} bytes, {:.2}s",
            v.units,
            v.keyframes,
            v.parameter_sets,
            v.bytes,
            v.largest_unit,
            v.duration.as_secs_f64()
        )
    }
}
