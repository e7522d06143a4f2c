// Offline render - Runs the transport against an offline clock
// Time advances block by block as fast as the caller can pull it

use super::grid::TransportConfig;
use super::pattern::{PadHit, PatternSource, TriggerSink, step_trigger};
use super::scheduler::{Scheduler, SchedulerConfig};
use super::transport::TransportEngine;
use crate::clock::{AudioClock, Clock};
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

/// A pad trigger produced by an offline render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedHit {
    pub pad: usize,
    pub velocity: f32,
    pub audio_time: f64,
    /// Absolute frame of `audio_time` at the render sample rate
    pub frame: u64,
}

/// Render settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub duration_sec: f64,
    pub sample_rate: f64,
    /// Frames pulled per iteration, capped at the scheduler lookahead
    pub block_frames: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            duration_sec: 4.0,
            sample_rate: 48_000.0,
            block_frames: 512,
        }
    }
}

struct HitCollector {
    clock: AudioClock,
    hits: Vec<RenderedHit>,
}

impl TriggerSink for HitCollector {
    fn trigger(&mut self, hit: PadHit, audio_time: f64) {
        self.hits.push(RenderedHit {
            pad: hit.pad,
            velocity: hit.velocity,
            audio_time,
            frame: self.clock.seconds_to_frames(audio_time),
        });
    }
}

/// Render `pattern` under `config` for `options.duration_sec` seconds.
///
/// The result depends only on its inputs, never on wall time. Hits are
/// returned in time order; hits at or past the end are dropped.
pub fn render_offline<P>(
    config: TransportConfig,
    pattern: P,
    options: RenderOptions,
) -> Vec<RenderedHit>
where
    P: PatternSource + 'static,
{
    let clock = AudioClock::offline(options.sample_rate);
    let shared_clock: Rc<dyn Clock> = Rc::new(clock.clone());
    let scheduler = Scheduler::new(Rc::clone(&shared_clock), SchedulerConfig::default());

    let collector = Rc::new(RefCell::new(HitCollector {
        clock: clock.clone(),
        hits: Vec::new(),
    }));
    let hook = step_trigger(Rc::new(RefCell::new(pattern)), Rc::clone(&collector));
    let mut engine = TransportEngine::new(shared_clock, scheduler.clone(), config, hook);

    let total_frames = clock.seconds_to_frames(options.duration_sec);
    // The clock may never jump past the lookahead window in one pull, or a
    // boundary would elapse before anything armed it
    let lookahead_frames = clock.seconds_to_frames(scheduler.config().lookahead_sec).max(1);
    let block = options.block_frames.clamp(1, lookahead_frames as usize);

    engine.start();
    while clock.current_frame() < total_frames {
        engine.tick();
        scheduler.flush();
        clock.advance(block);
    }
    engine.stop();

    let mut hits = std::mem::take(&mut collector.borrow_mut().hits);
    hits.retain(|h| h.audio_time < options.duration_sec);
    hits.sort_by(|a, b| a.audio_time.total_cmp(&b.audio_time));

    debug!(
        "offline render: {:.3}s at {} Hz, {} hits",
        options.duration_sec,
        options.sample_rate,
        hits.len()
    );
    hits
}
