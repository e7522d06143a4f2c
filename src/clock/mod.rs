// Clock - Monotonic time sources for the scheduling engine
// Every Scheduler, TransportEngine and ClockSync reads time through this trait

pub mod audio_clock;

pub use audio_clock::AudioClock;

use std::cell::Cell;
use std::time::Instant;

/// A monotonic time source measured in seconds.
///
/// Online clocks follow real time and are polled by a periodic timer.
/// Offline clocks are driven by a renderer that synthesizes ahead of real
/// time, so the Scheduler must be flushed manually.
pub trait Clock {
    /// Current time in seconds. Never decreases.
    fn audio_time(&self) -> f64;

    /// True when time is driven by an offline renderer instead of wall time
    fn is_offline(&self) -> bool {
        false
    }
}

/// Clock backed by `Instant`, starting at zero on creation
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Origin of this clock (audio time 0.0)
    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn audio_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock whose time is set explicitly by its owner.
///
/// Used by hosts that already own a time base (a render loop, a test) and
/// want the engine to follow it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
    offline: bool,
}

impl ManualClock {
    /// Online manual clock starting at 0.0
    pub fn new() -> Self {
        Self {
            now: Cell::new(0.0),
            offline: false,
        }
    }

    /// Offline manual clock starting at 0.0
    pub fn offline() -> Self {
        Self {
            now: Cell::new(0.0),
            offline: true,
        }
    }

    /// Move the clock to `seconds`. Earlier values are ignored.
    pub fn set(&self, seconds: f64) {
        if seconds > self.now.get() {
            self.now.set(seconds);
        }
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.now.set(self.now.get() + seconds);
        }
    }
}

impl Clock for ManualClock {
    fn audio_time(&self) -> f64 {
        self.now.get()
    }

    fn is_offline(&self) -> bool {
        self.offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.set(1.5);
        assert_eq!(clock.audio_time(), 1.5);

        clock.set(1.0);
        assert_eq!(clock.audio_time(), 1.5);

        clock.advance(0.25);
        assert_eq!(clock.audio_time(), 1.75);

        clock.advance(-1.0);
        assert_eq!(clock.audio_time(), 1.75);
    }

    #[test]
    fn test_manual_clock_offline_flag() {
        assert!(!ManualClock::new().is_offline());
        assert!(ManualClock::offline().is_offline());
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let clock = WallClock::new();
        let a = clock.audio_time();
        let b = clock.audio_time();
        assert!(b >= a);
        assert!(!clock.is_offline());
    }
}
