// Audio clock - Time derived from the number of frames rendered so far

use super::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Clock driven by a frame counter.
///
/// The audio callback (or the offline renderer) calls `advance` after each
/// block; any clone of the clock observes the new position. Cloning shares
/// the counter, so one clone can live on the audio thread while another is
/// handed to the Scheduler.
#[derive(Debug, Clone)]
pub struct AudioClock {
    /// Frames rendered so far
    frame_position: Arc<AtomicU64>,
    /// Sample rate (for frame -> seconds conversions)
    sample_rate: f64,
    offline: bool,
}

impl AudioClock {
    /// Clock following a live audio device
    pub fn new(sample_rate: f64) -> Self {
        Self::with_mode(sample_rate, false)
    }

    /// Clock following an offline renderer
    pub fn offline(sample_rate: f64) -> Self {
        Self::with_mode(sample_rate, true)
    }

    fn with_mode(sample_rate: f64, offline: bool) -> Self {
        Self {
            frame_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate.max(1.0),
            offline,
        }
    }

    /// Current frame position
    pub fn current_frame(&self) -> u64 {
        self.frame_position.load(Ordering::Relaxed)
    }

    /// Advance frame position (called after each rendered block)
    pub fn advance(&self, frames: usize) {
        self.frame_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Convert seconds to the nearest frame at this clock's sample rate
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    /// Frame offset of `at` inside the block starting at the current frame.
    ///
    /// Times already in the past map to offset 0 (play immediately).
    pub fn frames_from_now(&self, at: f64) -> u32 {
        let target = self.seconds_to_frames(at);
        let delta = target.saturating_sub(self.current_frame());
        delta.min(u32::MAX as u64) as u32
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Clock for AudioClock {
    fn audio_time(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate
    }

    fn is_offline(&self) -> bool {
        self.offline
    }
}
