//! # Loopcast Server
//!
//! Streams one WAV file and one Annex-B video file to each connected peer,
//! paced in real time, for at most a fixed deadline.
//!
//! - [`config`]: TOML configuration with defaults
//! - [`session`]: per-session workers, deadline and close handling
//! - [`worker`]: the per-stream push loop and cancellation flag
//! - [`signaling`]: HTTP offer/answer boundary over an external transport
//! - [`probe`]: offline framing summary of the backing files
//! - [`stats_sink`]: counting sink for dry runs

pub mod config;
pub mod probe;
pub mod session;
pub mod signaling;
pub mod stats_sink;
pub mod worker;
