// Transport - Step clock synchronized to the audio clock
// Turns tempo/grid/swing into step boundaries armed one step ahead

use super::grid::TransportConfig;
use super::scheduler::Scheduler;
use crate::clock::Clock;
use crate::observer::{Observers, Subscription};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Snapshot broadcast to subscribers on every step change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportState {
    pub is_playing: bool,
    /// Current step in [0, total_steps)
    pub current_step: usize,
}

/// Audio hook invoked at each step boundary with (step_index, audio_time)
pub type StepHook = Rc<RefCell<dyn FnMut(usize, f64)>>;

/// Transport engine
///
/// Owns the playing flag and the step counters; reads time from its Clock
/// and hands boundary callbacks to its Scheduler. The only audible output
/// goes through the `on_step` hook.
pub struct TransportEngine {
    clock: Rc<dyn Clock>,
    scheduler: Scheduler,
    config: TransportConfig,
    on_step: StepHook,
    listeners: Observers<TransportState>,

    is_playing: bool,
    start_time_sec: f64,
    /// Last emitted normalized step
    last_step: Option<usize>,
    /// Unwrapped counterpart of `last_step`
    last_absolute_step: Option<i64>,
    /// Highest absolute boundary handed to the scheduler
    last_scheduled_step: Option<i64>,
    /// Highest absolute boundary whose callback has actually run, and its time
    last_fired_step: Rc<Cell<Option<(i64, f64)>>>,
}

impl TransportEngine {
    /// Create a stopped engine
    pub fn new(
        clock: Rc<dyn Clock>,
        scheduler: Scheduler,
        config: TransportConfig,
        on_step: impl FnMut(usize, f64) + 'static,
    ) -> Self {
        Self {
            clock,
            scheduler,
            config,
            on_step: Rc::new(RefCell::new(on_step)),
            listeners: Observers::new(),
            is_playing: false,
            start_time_sec: 0.0,
            last_step: None,
            last_absolute_step: None,
            last_scheduled_step: None,
            last_fired_step: Rc::new(Cell::new(None)),
        }
    }

    /// Start playback from step 0. No-op if already playing.
    ///
    /// The starting step is triggered right away at the start time; the
    /// following boundary is queued on the scheduler.
    pub fn start(&mut self) {
        if self.is_playing {
            return;
        }

        self.is_playing = true;
        self.start_time_sec = self.clock.audio_time();
        self.reset_counters();

        self.scheduler.clear();
        self.scheduler.start();

        let absolute = self
            .config
            .absolute_step_at(self.clock.audio_time(), self.start_time_sec)
            .max(0);
        let step = self.config.normalize_step(absolute);
        self.last_absolute_step = Some(absolute);
        self.last_step = Some(step);

        debug!("transport start at {:.6}s ({})", self.start_time_sec, self.config);
        self.emit();

        let at = self.config.boundary_time(absolute, self.start_time_sec);
        self.last_fired_step.set(Some((absolute, at)));
        (&mut *self.on_step.borrow_mut())(step, at);

        self.arm_boundaries(absolute + 1, self.start_time_sec);
    }

    /// Stop playback. No-op if not playing.
    pub fn stop(&mut self) {
        if !self.is_playing {
            return;
        }

        self.is_playing = false;
        self.scheduler.stop();
        self.scheduler.clear();

        debug!("transport stop at step {:?}", self.last_step);
        self.reset_counters();
        self.emit();
    }

    /// Replace the configuration.
    ///
    /// While playing, the start time is re-anchored so the displayed step
    /// and its swing offset are unchanged at the moment of the edit, then
    /// the next boundary is rescheduled under the new timing.
    pub fn set_config(&mut self, next: TransportConfig) {
        self.config = next;
        if !self.is_playing {
            return;
        }

        let now = self.clock.audio_time();
        let absolute = self.last_absolute_step.unwrap_or(0);
        let step = self.config.normalize_step(absolute);

        self.start_time_sec = now
            - absolute as f64 * self.config.step_duration_sec()
            - self.config.swing_offset_sec(step);

        self.scheduler.clear();
        self.last_scheduled_step = None;

        debug!(
            "transport reconfigured at {:.6}s: {} (step {})",
            now, self.config, step
        );

        if self.last_step != Some(step) {
            self.last_step = Some(step);
            self.emit();
        }

        // Boundaries already fired under the old timing must not sound twice,
        // and nothing may land before the last one that did
        let mut next_boundary = absolute + 1;
        if let Some((fired, fired_at)) = self.last_fired_step.get() {
            next_boundary = next_boundary.max(fired + 1);
            while self.config.boundary_time(next_boundary, self.start_time_sec) <= fired_at {
                next_boundary += 1;
            }
        }
        self.arm_boundaries(next_boundary, now);
    }

    /// Register a listener. It immediately receives the current snapshot.
    pub fn subscribe(&self, listener: impl FnMut(&TransportState) + 'static) -> Subscription {
        let subscription = self.listeners.subscribe(listener);
        self.listeners.notify_last(&self.state());
        subscription
    }

    /// Catch up with the clock.
    ///
    /// Safe at any cadence. When several steps elapsed since the last call
    /// only the most recent one is emitted.
    pub fn tick(&mut self) {
        if !self.is_playing {
            return;
        }

        let now = self.clock.audio_time();
        let absolute = self.config.absolute_step_at(now, self.start_time_sec);

        let advanced = match self.last_absolute_step {
            Some(last) => absolute > last,
            None => true,
        };
        if !advanced {
            return;
        }

        let step = self.config.normalize_step(absolute);
        self.last_step = Some(step);
        self.last_absolute_step = Some(absolute);
        trace!("transport step {} (absolute {}) at {:.6}s", step, absolute, now);

        self.arm_boundaries(absolute + 1, now);
        self.emit();
    }

    /// Host loop entry point: catch up, then run the scheduler's timer
    pub fn poll(&mut self, wall: Instant) -> usize {
        self.tick();
        self.scheduler.poll(wall)
    }

    /// Arm `first`, then keep arming until one boundary lies past the
    /// scheduler's lookahead horizon. At slow tempos that is just `first`;
    /// on fast grids it covers every boundary the next flush may fire.
    fn arm_boundaries(&mut self, first: i64, now: f64) {
        self.schedule_step_boundary(first);

        let horizon = now + self.scheduler.config().lookahead_sec;
        let mut last = self.last_scheduled_step.unwrap_or(first);
        while self.config.boundary_time(last, self.start_time_sec) <= horizon {
            last += 1;
            self.schedule_step_boundary(last);
        }
    }

    /// Queue the boundary for `absolute_step`, at most once per index
    fn schedule_step_boundary(&mut self, absolute_step: i64) {
        if let Some(last) = self.last_scheduled_step {
            if absolute_step <= last {
                return;
            }
        }
        self.last_scheduled_step = Some(absolute_step);

        let step = self.config.normalize_step(absolute_step);
        let at = self.config.boundary_time(absolute_step, self.start_time_sec);
        let on_step = Rc::clone(&self.on_step);
        let fired = Rc::clone(&self.last_fired_step);

        trace!("boundary {} (step {}) armed for {:.6}s", absolute_step, step, at);
        self.scheduler.schedule(at, move |audio_time| {
            if fired.get().is_some_and(|(f, _)| f >= absolute_step) {
                return;
            }
            fired.set(Some((absolute_step, audio_time)));
            (&mut *on_step.borrow_mut())(step, audio_time);
        });
    }

    /// Forget the timeline. The displayed step is left alone so a stopped
    /// engine keeps reporting where it halted; `start` overwrites it.
    fn reset_counters(&mut self) {
        self.last_absolute_step = None;
        self.last_scheduled_step = None;
        self.last_fired_step.set(None);
    }

    fn emit(&self) {
        self.listeners.emit(&self.state());
    }

    /// Current snapshot
    pub fn state(&self) -> TransportState {
        TransportState {
            is_playing: self.is_playing,
            current_step: self.last_step.unwrap_or(0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Audio time the current timeline is anchored to
    pub fn start_time_sec(&self) -> f64 {
        self.start_time_sec
    }

    /// Unwrapped step counter, None while stopped
    pub fn absolute_step(&self) -> Option<i64> {
        self.last_absolute_step
    }
}
