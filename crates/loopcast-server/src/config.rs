//! Configuration: a TOML file with `[media]`, `[session]` and `[signaling]`
//! tables. Every key is optional; the raw input is resolved into typed values
//! with defaults applied.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use loopcast_media::video::nal::Codec;
use loopcast_media::video::{self, ScannerKind};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Accepted audio frame durations. One second of 8 kHz audio is 8000 bytes.
const AUDIO_FRAME_MS: RangeInclusive<u64> = 1..=1000;
const VIDEO_FPS: RangeInclusive<u32> = 1..=240;
pub const DEADLINE_SECS: RangeInclusive<u64> = 1..=86_400;

// ─── Raw input ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub media: MediaConfigInput,
    pub session: SessionConfigInput,
    pub signaling: SignalingConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaConfigInput {
    pub audio_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub audio_frame_ms: Option<u64>,
    pub video_fps: Option<u32>,
    pub scanner: Option<String>,
    pub video_codec: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfigInput {
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignalingConfigInput {
    pub listen: Option<String>,
    pub bearer_token: Option<String>,
    pub static_dir: Option<PathBuf>,
}

// ─── Resolved ───────────────────────────────────────────────────────────────

/// Backing files and framing constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    pub audio_path: PathBuf,
    pub video_path: PathBuf,
    pub audio_frame: Duration,
    pub video_frame: Duration,
    pub scanner: ScannerKind,
    pub video_codec: Codec,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_path: PathBuf::from("audio.wav"),
            video_path: PathBuf::from("video.h265"),
            audio_frame: Duration::from_millis(20),
            video_frame: video::frame_duration(30),
            scanner: ScannerKind::Aligned,
            video_codec: Codec::H265,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wall-clock lifetime of a session, armed at creation.
    pub deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingConfig {
    pub listen: SocketAddr,
    /// Compared for exact equality against `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    pub static_dir: Option<PathBuf>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 7009)),
            bearer_token: None,
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub media: MediaConfig,
    pub session: SessionConfig,
    pub signaling: SignalingConfig,
}

impl ConfigInput {
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let defaults = Config::default();
        let m = self.media;

        let audio_frame = match m.audio_frame_ms {
            Some(ms) if !AUDIO_FRAME_MS.contains(&ms) => {
                return Err(invalid(format!(
                    "media.audio_frame_ms must be in {}..={}, got {ms}",
                    AUDIO_FRAME_MS.start(),
                    AUDIO_FRAME_MS.end()
                )))
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.media.audio_frame,
        };
        let video_frame = match m.video_fps {
            Some(fps) if !VIDEO_FPS.contains(&fps) => {
                return Err(invalid(format!(
                    "media.video_fps must be in {}..={}, got {fps}",
                    VIDEO_FPS.start(),
                    VIDEO_FPS.end()
                )))
            }
            Some(fps) => video::frame_duration(fps),
            None => defaults.media.video_frame,
        };
        let scanner = match m.scanner {
            Some(s) => s.parse().map_err(ConfigError::Invalid)?,
            None => defaults.media.scanner,
        };
        let video_codec = match m.video_codec {
            Some(s) => s.parse().map_err(ConfigError::Invalid)?,
            None => defaults.media.video_codec,
        };

        let deadline = match self.session.deadline_secs {
            Some(secs) if !DEADLINE_SECS.contains(&secs) => {
                return Err(invalid(format!(
                    "session.deadline_secs must be in {}..={}, got {secs}",
                    DEADLINE_SECS.start(),
                    DEADLINE_SECS.end()
                )))
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.session.deadline,
        };

        let listen = match self.signaling.listen {
            Some(addr) => addr
                .trim()
                .parse()
                .map_err(|e| invalid(format!("signaling.listen {addr:?}: {e}")))?,
            None => defaults.signaling.listen,
        };
        let bearer_token = self
            .signaling
            .bearer_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Config {
            media: MediaConfig {
                audio_path: m.audio_path.unwrap_or(defaults.media.audio_path),
                video_path: m.video_path.unwrap_or(defaults.media.video_path),
                audio_frame,
                video_frame,
                scanner,
                video_codec,
            },
            session: SessionConfig { deadline },
            signaling: SignalingConfig {
                listen,
                bearer_token,
                static_dir: self.signaling.static_dir,
            },
        })
    }
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Config::default());
        }
        let parsed: ConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
