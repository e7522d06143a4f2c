// Clock-role sync - Internal clock, MIDI clock master or MIDI clock slave
// Master sends start/stop plus 24 pulses per quarter note on its own scheduler

mod tempo;

pub use tempo::TempoTracker;

use crate::clock::Clock;
use crate::messaging::ClockConsumer;
use crate::midi::{ClockMessage, ClockOutput, PULSES_PER_QUARTER, seconds_per_clock_tick};
use crate::observer::{Observers, Subscription};
use crate::sequencer::{Scheduler, SchedulerConfig};
use log::{debug, info, trace, warn};
use ringbuf::traits::Consumer;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Clamp a tempo to the supported range; NaN falls back to the minimum
pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        MIN_BPM
    } else {
        bpm.clamp(MIN_BPM, MAX_BPM)
    }
}

/// Where the step clock comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// The transport drives itself; nothing is sent or received
    #[default]
    Internal,
    /// MIDI clock, direction given by the role
    MidiClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClockRole {
    #[default]
    Master,
    Slave,
}

/// Who owns tempo and play state right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClockAuthority {
    #[default]
    Internal,
    External,
}

impl ClockAuthority {
    fn of(mode: SyncMode, role: ClockRole) -> Self {
        match (mode, role) {
            (SyncMode::MidiClock, ClockRole::Slave) => ClockAuthority::External,
            _ => ClockAuthority::Internal,
        }
    }
}

/// Snapshot broadcast to subscribers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncState {
    pub bpm: f64,
    /// Pulse position inside the current quarter note, 0..24
    pub phase: u8,
    pub is_playing: bool,
    pub mode: SyncMode,
    pub role: ClockRole,
    pub clock_authority: ClockAuthority,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            phase: 0,
            is_playing: false,
            mode: SyncMode::Internal,
            role: ClockRole::Master,
            clock_authority: ClockAuthority::Internal,
        }
    }
}

impl SyncState {
    fn is_sending_clock(&self) -> bool {
        self.mode == SyncMode::MidiClock && self.role == ClockRole::Master
    }

    fn is_receiving_clock(&self) -> bool {
        self.mode == SyncMode::MidiClock && self.role == ClockRole::Slave
    }

    fn advance_phase(&mut self) {
        self.phase = (self.phase + 1) % PULSES_PER_QUARTER;
    }
}

struct SyncInner {
    scheduler: Scheduler,
    state: SyncState,
    output: Option<Box<dyn ClockOutput>>,
    /// Bumped whenever the pulse loop stops; stale pulses compare and bail
    pulse_generation: u64,
    pulse_active: bool,
    /// Target time of the last pulse sent since the transport started
    last_pulse_at: Option<f64>,
}

impl SyncInner {
    fn send(&mut self, message: ClockMessage, at: f64) {
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.send(message, at) {
                warn!("MIDI clock send failed ({:?}): {}", message, e);
            }
        }
    }

    fn stop_pulses(&mut self) {
        if self.pulse_active {
            debug!("clock pulse loop stopped");
        }
        self.pulse_generation = self.pulse_generation.wrapping_add(1);
        self.pulse_active = false;
        self.scheduler.clear();
        self.scheduler.stop();
    }
}

/// Clock-role sync layer.
///
/// Runs beside the transport on a `Scheduler` it creates for itself, so
/// stopping the pulse loop never touches the transport's queue. Pass the
/// transport's clock to keep both on one timeline; the host polls
/// `scheduler()` the same way it polls the transport's.
pub struct ClockSync {
    inner: Rc<RefCell<SyncInner>>,
    listeners: Observers<SyncState>,
}

impl ClockSync {
    pub fn new(clock: Rc<dyn Clock>, config: SchedulerConfig, bpm: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SyncInner {
                scheduler: Scheduler::new(clock, config),
                state: SyncState {
                    bpm: clamp_bpm(bpm),
                    ..SyncState::default()
                },
                output: None,
                pulse_generation: 0,
                pulse_active: false,
                last_pulse_at: None,
            })),
            listeners: Observers::new(),
        }
    }

    /// Select (or remove) the outbound clock port.
    ///
    /// A running master loop restarts on the new output without resending
    /// start.
    pub fn set_output(&mut self, output: Option<Box<dyn ClockOutput>>) {
        let restart = {
            let mut inner = self.inner.borrow_mut();
            inner.stop_pulses();
            inner.output = output;
            inner.state.is_playing && inner.state.is_sending_clock()
        };
        if restart {
            self.start_pulses(false);
        }
    }

    pub fn has_output(&self) -> bool {
        self.inner.borrow().output.is_some()
    }

    pub fn set_mode(&mut self, mode: SyncMode) {
        if self.inner.borrow().state.mode == mode {
            return;
        }
        self.reconfigure(|state| state.mode = mode);
    }

    pub fn set_role(&mut self, role: ClockRole) {
        if self.inner.borrow().state.role == role {
            return;
        }
        self.reconfigure(|state| state.role = role);
    }

    /// Assign the tempo, clamped to 20..300 BPM.
    ///
    /// A running master loop restarts at the new pulse period.
    pub fn set_bpm(&mut self, bpm: f64) {
        let bpm = clamp_bpm(bpm);
        let restart = {
            let mut inner = self.inner.borrow_mut();
            inner.stop_pulses();
            inner.state.bpm = bpm;
            inner.state.is_playing && inner.state.is_sending_clock()
        };
        debug!("sync tempo: {:.2} BPM", bpm);
        if restart {
            self.start_pulses(false);
        }
        self.emit();
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing {
            self.start_transport();
        } else {
            self.stop_transport();
        }
    }

    /// Transport started locally. In master role, sends start then pulses.
    pub fn start_transport(&mut self) {
        let send_clock = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_playing {
                return;
            }
            inner.state.is_playing = true;
            inner.state.phase = 0;
            inner.state.is_sending_clock()
        };
        if send_clock {
            self.start_pulses(true);
        }
        self.emit();
    }

    /// Transport stopped locally. In master role, halts pulses and sends stop.
    pub fn stop_transport(&mut self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_playing {
                return;
            }
            inner.state.is_playing = false;
            inner.state.phase = 0;
            inner.last_pulse_at = None;
            let was_sending = inner.pulse_active;
            inner.stop_pulses();
            if was_sending {
                let now = inner.scheduler.now();
                inner.send(ClockMessage::Stop, now);
            }
        }
        self.emit();
    }

    /// Apply one inbound clock message. Only the slave role listens.
    pub fn handle_message(&mut self, message: ClockMessage) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_receiving_clock() {
                trace!("ignoring inbound {:?} (not a clock slave)", message);
                return;
            }

            let state = &mut inner.state;
            match message {
                ClockMessage::Start => {
                    state.is_playing = true;
                    state.phase = 0;
                    true
                }
                ClockMessage::Stop => {
                    state.is_playing = false;
                    state.phase = 0;
                    true
                }
                ClockMessage::Continue => {
                    let changed = !state.is_playing;
                    state.is_playing = true;
                    changed
                }
                ClockMessage::Clock => {
                    state.advance_phase();
                    false
                }
            }
        };

        if changed {
            debug!("external clock: {:?}", message);
            self.emit();
        }
    }

    /// Apply every message queued by the MIDI input thread.
    /// Returns how many were consumed.
    pub fn drain_inbound(&mut self, consumer: &mut ClockConsumer) -> usize {
        let mut count = 0;
        while let Some(timed) = consumer.try_pop() {
            self.handle_message(timed.message);
            count += 1;
        }
        count
    }

    /// Register a listener; it immediately receives the current state.
    ///
    /// Play, tempo, mode and role changes are broadcast; pulse phase is not
    /// (read it through `state`).
    pub fn subscribe(&self, listener: impl FnMut(&SyncState) + 'static) -> Subscription {
        let subscription = self.listeners.subscribe(listener);
        self.listeners.notify_last(&self.state());
        subscription
    }

    pub fn state(&self) -> SyncState {
        self.inner.borrow().state
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }

    /// Stop any pulse loop, apply the change, then restart it if we are
    /// still playing as master
    fn reconfigure(&mut self, change: impl FnOnce(&mut SyncState)) {
        let restart = {
            let mut inner = self.inner.borrow_mut();
            inner.stop_pulses();
            change(&mut inner.state);
            inner.state.clock_authority = ClockAuthority::of(inner.state.mode, inner.state.role);
            info!(
                "sync mode: {:?}, role: {:?}, authority: {:?}",
                inner.state.mode, inner.state.role, inner.state.clock_authority
            );
            inner.state.is_playing && inner.state.is_sending_clock()
        };
        if restart {
            self.start_pulses(true);
        }
        self.emit();
    }

    /// Start the pulse loop. With `send_start` the stream begins afresh at
    /// the current time; otherwise it carries on one period (at the current
    /// tempo) after the last pulse already sent, since the stopped loop may
    /// have sent pulses up to the end of the lookahead window.
    fn start_pulses(&mut self, send_start: bool) {
        let (scheduler, generation, first) = {
            let mut inner = self.inner.borrow_mut();
            if inner.output.is_none() {
                debug!("no MIDI clock output selected, not sending clock");
                return;
            }
            inner.stop_pulses();
            inner.pulse_active = true;
            let now = inner.scheduler.now();
            if send_start {
                inner.last_pulse_at = None;
                inner.send(ClockMessage::Start, now);
            }
            let first = match inner.last_pulse_at {
                Some(last) => (last + seconds_per_clock_tick(inner.state.bpm)).max(now),
                None => now,
            };
            (inner.scheduler.clone(), inner.pulse_generation, first)
        };

        debug!("clock pulse loop started at {:.6}s", first);
        scheduler.start();
        Self::arm_pulse(&scheduler, Rc::downgrade(&self.inner), first, generation);
    }

    fn arm_pulse(scheduler: &Scheduler, inner: Weak<RefCell<SyncInner>>, at: f64, generation: u64) {
        let handle = scheduler.clone();
        scheduler.schedule(at, move |at| {
            let Some(rc) = inner.upgrade() else {
                return;
            };
            let next = {
                let mut sync = rc.borrow_mut();
                if !sync.pulse_active || sync.pulse_generation != generation {
                    return;
                }
                sync.send(ClockMessage::Clock, at);
                sync.last_pulse_at = Some(at);
                sync.state.advance_phase();
                at + seconds_per_clock_tick(sync.state.bpm)
            };
            Self::arm_pulse(&handle, inner, next, generation);
        });
    }

    fn emit(&self) {
        let state = self.state();
        self.listeners.emit(&state);
    }
}
