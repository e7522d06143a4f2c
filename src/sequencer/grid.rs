// Grid - Tempo, grid shape and swing of a step pattern
// Pure timing math: step durations, swing offsets, step indices

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the step grid
/// Example: 1 bar of 16th notes = GridSpec { bars: 1, division: 16 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub bars: u32,     // One of 1, 2, 4, 8
    pub division: u32, // Steps per bar: one of 1, 2, 4, 8, 16, 32, 64
}

impl GridSpec {
    pub const ALLOWED_BARS: [u32; 4] = [1, 2, 4, 8];
    pub const ALLOWED_DIVISIONS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

    pub fn new(bars: u32, division: u32) -> Self {
        Self { bars, division }
    }

    /// Common 1 bar of sixteenth notes
    pub fn sixteenths() -> Self {
        Self::new(1, 16)
    }

    /// Number of steps in the grid (bars * division), may be 0 when malformed
    pub fn total_steps(&self) -> u32 {
        self.bars.saturating_mul(self.division)
    }

    /// Step count used for wrapping step indices, never 0
    pub fn loop_length(&self) -> u32 {
        self.total_steps().max(1)
    }

    /// Division clamped to at least 1
    pub fn steps_per_bar(&self) -> u32 {
        self.division.max(1)
    }

    /// Whether both fields are in the supported enumerations
    pub fn is_supported(&self) -> bool {
        Self::ALLOWED_BARS.contains(&self.bars) && Self::ALLOWED_DIVISIONS.contains(&self.division)
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::sixteenths()
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bar(s) x 1/{}", self.bars, self.division)
    }
}

/// Largest usable swing amount, just below 1
const MAX_SWING: f64 = 1.0 - f64::EPSILON;

/// Everything the transport needs to derive step timing.
///
/// Replaced wholesale on every tempo/grid edit; the engine never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub bpm: f64,
    pub grid_spec: GridSpec,
    /// Off-beat delay amount in [0, 1)
    #[serde(default)]
    pub swing: f64,
}

impl TransportConfig {
    pub fn new(bpm: f64, grid_spec: GridSpec) -> Self {
        Self {
            bpm,
            grid_spec,
            swing: 0.0,
        }
    }

    pub fn with_swing(mut self, swing: f64) -> Self {
        self.swing = swing;
        self
    }

    /// Tempo clamped to at least 1 BPM (guards division by zero)
    fn safe_bpm(&self) -> f64 {
        if self.bpm.is_finite() && self.bpm >= 1.0 {
            self.bpm
        } else {
            1.0
        }
    }

    /// Swing clamped into [0, 1); a full step of swing would land an
    /// off-beat on the next downbeat
    fn safe_swing(&self) -> f64 {
        if self.swing.is_finite() && self.swing > 0.0 {
            self.swing.min(MAX_SWING)
        } else {
            0.0
        }
    }

    /// Duration of one step in seconds: (4 / division) * (60 / bpm)
    pub fn step_duration_sec(&self) -> f64 {
        (4.0 / self.grid_spec.steps_per_bar() as f64) * (60.0 / self.safe_bpm())
    }

    pub fn total_steps(&self) -> u32 {
        self.grid_spec.total_steps()
    }

    /// Wrap an absolute step counter into [0, total_steps)
    pub fn normalize_step(&self, absolute_step: i64) -> usize {
        absolute_step.rem_euclid(self.grid_spec.loop_length() as i64) as usize
    }

    /// Delay applied to a step's boundary.
    ///
    /// Only odd steps within a bar (off-beats) are delayed, by
    /// `step_duration * swing / 2`. Downbeats never move.
    pub fn swing_offset_sec(&self, step_index: usize) -> f64 {
        let swing = self.safe_swing();
        if swing <= 0.0 {
            return 0.0;
        }
        let step_in_bar = step_index % self.grid_spec.steps_per_bar() as usize;
        if step_in_bar % 2 == 1 {
            self.step_duration_sec() * swing * 0.5
        } else {
            0.0
        }
    }

    /// Unwrapped step counter at `time_sec` for a transport anchored at
    /// `start_time_sec`
    pub fn absolute_step_at(&self, time_sec: f64, start_time_sec: f64) -> i64 {
        let steps = (time_sec - start_time_sec) / self.step_duration_sec();
        // Absorb rounding left over from re-anchoring the start time
        (steps + 1e-9).floor() as i64
    }

    /// Audio time at which `absolute_step` begins, swing included
    pub fn boundary_time(&self, absolute_step: i64, start_time_sec: f64) -> f64 {
        start_time_sec
            + absolute_step as f64 * self.step_duration_sec()
            + self.swing_offset_sec(self.normalize_step(absolute_step))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(120.0, GridSpec::default())
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM, {}, swing {:.2}", self.bpm, self.grid_spec, self.swing)
    }
}
