// Tempo tracker - Estimates BPM from inbound clock pulse cadence

use super::clamp_bpm;
use crate::messaging::TimedClockMessage;
use crate::midi::{ClockMessage, PULSES_PER_QUARTER};
use std::collections::VecDeque;

/// Rolling average of the last quarter note worth of pulse intervals
#[derive(Debug, Clone, Default)]
pub struct TempoTracker {
    last_pulse: Option<f64>,
    intervals: VecDeque<f64>,
    sum: f64,
}

impl TempoTracker {
    const WINDOW: usize = PULSES_PER_QUARTER as usize;

    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all pulses, e.g. after a start or stop
    pub fn reset(&mut self) {
        self.last_pulse = None;
        self.intervals.clear();
        self.sum = 0.0;
    }

    /// Record a pulse at `at` seconds and return the current estimate.
    ///
    /// Pulses that do not move forward in time are dropped.
    pub fn on_pulse(&mut self, at: f64) -> Option<f64> {
        if let Some(last) = self.last_pulse {
            let interval = at - last;
            if !interval.is_finite() || interval <= 0.0 {
                return self.bpm();
            }
            self.intervals.push_back(interval);
            self.sum += interval;
            if self.intervals.len() > Self::WINDOW {
                if let Some(old) = self.intervals.pop_front() {
                    self.sum -= old;
                }
            }
        }
        self.last_pulse = Some(at);
        self.bpm()
    }

    /// Feed one inbound message; start and stop reset the window
    pub fn on_message(&mut self, timed: &TimedClockMessage) -> Option<f64> {
        match timed.message {
            ClockMessage::Clock => self.on_pulse(timed.timestamp_micros as f64 / 1_000_000.0),
            ClockMessage::Start | ClockMessage::Stop => {
                self.reset();
                None
            }
            ClockMessage::Continue => self.bpm(),
        }
    }

    /// Current estimate, clamped to 20..300 BPM. None until two pulses.
    pub fn bpm(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        let mean = self.sum / self.intervals.len() as f64;
        Some(clamp_bpm(60.0 / (mean * PULSES_PER_QUARTER as f64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::seconds_per_clock_tick;

    #[test]
    fn test_needs_two_pulses() {
        let mut tracker = TempoTracker::new();
        assert_eq!(tracker.on_pulse(1.0), None);
        assert!(tracker.on_pulse(1.0 + seconds_per_clock_tick(120.0)).is_some());
    }

    #[test]
    fn test_steady_pulses() {
        let mut tracker = TempoTracker::new();
        let tick = seconds_per_clock_tick(128.0);
        let mut bpm = None;
        for i in 0..48 {
            bpm = tracker.on_pulse(i as f64 * tick);
        }
        assert!((bpm.unwrap() - 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_follows_tempo_change() {
        let mut tracker = TempoTracker::new();
        let mut t = 0.0;
        for _ in 0..30 {
            tracker.on_pulse(t);
            t += seconds_per_clock_tick(100.0);
        }
        // A full window at the new tempo replaces the old intervals
        for _ in 0..=24 {
            tracker.on_pulse(t);
            t += seconds_per_clock_tick(140.0);
        }
        assert!((tracker.bpm().unwrap() - 140.0).abs() < 1e-6);
    }

    #[test]
    fn test_estimate_is_clamped_and_ignores_backwards_pulses() {
        let mut tracker = TempoTracker::new();
        tracker.on_pulse(0.0);
        tracker.on_pulse(0.0001);
        assert_eq!(tracker.bpm(), Some(300.0));

        tracker.on_pulse(0.00005);
        assert_eq!(tracker.bpm(), Some(300.0));
    }

    #[test]
    fn test_start_resets() {
        let mut tracker = TempoTracker::new();
        tracker.on_message(&TimedClockMessage::new(ClockMessage::Clock, 0));
        tracker.on_message(&TimedClockMessage::new(ClockMessage::Clock, 20_833));
        assert!(tracker.bpm().is_some());

        tracker.on_message(&TimedClockMessage::new(ClockMessage::Start, 30_000));
        assert_eq!(tracker.bpm(), None);
    }
}
