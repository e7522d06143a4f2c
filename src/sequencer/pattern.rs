// Pattern - Grid of pad velocities read at every step
// The transport never owns pattern data; it reads it through PatternSource

use super::grid::GridSpec;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Unique identifier for patterns
pub type PatternId = u64;

/// One pad to trigger on a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadHit {
    pub pad: usize,
    /// Velocity in (0.0, 1.0]
    pub velocity: f32,
}

/// Read access to the current pattern contents.
///
/// Implemented by whatever layer owns pattern data; the step hook asks it
/// which pads sound on a given step.
pub trait PatternSource {
    /// Pads with a non-zero velocity on `step` (a transport step index)
    fn hits(&self, step: usize) -> Vec<PadHit>;
}

/// Receiver of pad triggers (the sample playback graph)
pub trait TriggerSink {
    fn trigger(&mut self, hit: PadHit, audio_time: f64);
}

/// Velocities stored by bar, step and pad. 0.0 means "off".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    grid: GridSpec,
    pads: usize,
    /// velocities[bar][step][pad]
    velocities: Vec<Vec<Vec<f32>>>,
}

impl Pattern {
    /// Create an empty pattern
    pub fn new(id: PatternId, name: String, grid: GridSpec, pads: usize) -> Self {
        let bars = grid.bars.max(1) as usize;
        let steps = grid.steps_per_bar() as usize;
        Self {
            id,
            name,
            grid,
            pads,
            velocities: vec![vec![vec![0.0; pads]; steps]; bars],
        }
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn pad_count(&self) -> usize {
        self.pads
    }

    /// Set a cell. Out-of-range cells are ignored; velocity is clamped to [0, 1].
    pub fn set(&mut self, bar: usize, step: usize, pad: usize, velocity: f32) {
        if let Some(cell) = self
            .velocities
            .get_mut(bar)
            .and_then(|b| b.get_mut(step))
            .and_then(|s| s.get_mut(pad))
        {
            *cell = velocity.clamp(0.0, 1.0);
        }
    }

    pub fn get(&self, bar: usize, step: usize, pad: usize) -> f32 {
        self.velocities
            .get(bar)
            .and_then(|b| b.get(step))
            .and_then(|s| s.get(pad))
            .copied()
            .unwrap_or(0.0)
    }

    /// Toggle a cell between off and `velocity`
    pub fn toggle(&mut self, bar: usize, step: usize, pad: usize, velocity: f32) {
        let current = self.get(bar, step, pad);
        let next = if current > 0.0 { 0.0 } else { velocity };
        self.set(bar, step, pad, next);
    }

    pub fn clear(&mut self) {
        for bar in &mut self.velocities {
            for step in bar {
                step.fill(0.0);
            }
        }
    }

    /// Number of active cells
    pub fn hit_count(&self) -> usize {
        self.velocities
            .iter()
            .flatten()
            .flatten()
            .filter(|v| **v > 0.0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.hit_count() == 0
    }
}

impl PatternSource for Pattern {
    fn hits(&self, step: usize) -> Vec<PadHit> {
        let steps_per_bar = self.grid.steps_per_bar() as usize;
        let bar = (step / steps_per_bar) % self.velocities.len().max(1);
        let step_in_bar = step % steps_per_bar;

        self.velocities
            .get(bar)
            .and_then(|b| b.get(step_in_bar))
            .map(|pads| {
                pads.iter()
                    .enumerate()
                    .filter(|(_, v)| **v > 0.0)
                    .map(|(pad, v)| PadHit { pad, velocity: *v })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Build the transport's step hook: each step reads the pattern as it is
/// at that moment and forwards its hits to the sink at the step's audio time.
pub fn step_trigger<P, S>(pattern: Rc<RefCell<P>>, sink: Rc<RefCell<S>>) -> impl FnMut(usize, f64)
where
    P: PatternSource + ?Sized + 'static,
    S: TriggerSink + ?Sized + 'static,
{
    move |step, audio_time| {
        let hits = pattern.borrow().hits(step);
        let mut sink = sink.borrow_mut();
        for hit in hits {
            sink.trigger(hit, audio_time);
        }
    }
}
