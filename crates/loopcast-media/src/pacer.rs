//! # Pacing
//!
//! Workers call [`Pacer::pace`] once after every successful push, passing the
//! nominal duration of the sample just delivered. The baseline is open loop:
//! sleep for exactly that long, with no feedback from the transport. A
//! feedback-driven pacer can replace it without touching the framers.

use std::time::Duration;

/// Delay policy applied between consecutive samples of one stream.
pub trait Pacer: Send + Sync {
    fn pace(&self, sample_duration: Duration);
}

/// Sleeps the calling thread for the sample's duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepPacer;

impl Pacer for SleepPacer {
    fn pace(&self, sample_duration: Duration) {
        std::thread::sleep(sample_duration);
    }
}

/// Never waits. Used for probing files and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpaced;

impl Pacer for Unpaced {
    fn pace(&self, _sample_duration: Duration) {}
}
