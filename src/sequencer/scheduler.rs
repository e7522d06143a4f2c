// Scheduler - Lookahead queue of fire-once callbacks
// Decides coarsely (every poll) but commits exact audio times

use crate::clock::Clock;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Callback run when a scheduled item becomes due.
/// Receives the item's own target time, not the flush time.
pub type ScheduledFn = Box<dyn FnOnce(f64)>;

/// Scheduler timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Forward window (seconds) in which queued items are considered due
    pub lookahead_sec: f64,
    /// Period of the polling timer (milliseconds)
    pub poll_interval_ms: u64,
}

impl SchedulerConfig {
    pub const DEFAULT_LOOKAHEAD_SEC: f64 = 0.1;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 25;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_sec: Self::DEFAULT_LOOKAHEAD_SEC,
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Host visibility, for environments that can be sent to the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// One pending callback
struct ScheduledItem {
    at: f64,
    f: ScheduledFn,
}

struct SchedulerInner {
    clock: Rc<dyn Clock>,
    config: SchedulerConfig,
    queue: Vec<ScheduledItem>,
    running: bool,
    visibility: Visibility,
    /// Wall instant of the next timer tick (None until the first poll)
    next_poll: Option<Instant>,
}

/// Lookahead scheduler.
///
/// Cloning yields another handle to the same queue. All handles must stay on
/// one thread: the scheduler is driven cooperatively by `poll` (online) or
/// `flush` (offline).
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                clock,
                config,
                queue: Vec::new(),
                running: false,
                visibility: Visibility::Visible,
                next_poll: None,
            })),
        }
    }

    /// Start the periodic flush. Idempotent.
    ///
    /// With an offline clock the timer never fires; the renderer calls
    /// `flush` itself.
    pub fn start(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.running {
            return;
        }
        inner.running = true;
        inner.next_poll = None;
        debug!(
            "scheduler started (offline: {}, lookahead: {}s)",
            inner.clock.is_offline(),
            inner.config.lookahead_sec
        );
    }

    /// Halt the periodic flush. Pending items stay queued. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.running {
            inner.running = false;
            inner.next_poll = None;
            debug!("scheduler stopped ({} pending)", inner.queue.len());
        }
    }

    /// Enqueue a fire-once callback for absolute time `at` (seconds).
    ///
    /// Items in the past fire on the very next flush.
    pub fn schedule(&self, at: f64, f: impl FnOnce(f64) + 'static) {
        self.inner.borrow_mut().queue.push(ScheduledItem {
            at,
            f: Box::new(f),
        });
    }

    /// Drop every pending item without firing it
    pub fn clear(&self) {
        self.inner.borrow_mut().queue.clear();
    }

    /// Fire every item whose target time is inside the lookahead horizon.
    ///
    /// Due items run in ascending target-time order (ties keep insertion
    /// order). Items scheduled by a callback are fired in the same flush when
    /// they are already inside the horizon, so a self re-arming loop keeps up
    /// with its own period. Returns the number of items fired.
    pub fn flush(&self) -> usize {
        let horizon = {
            let inner = self.inner.borrow();
            inner.clock.audio_time() + inner.config.lookahead_sec
        };

        let mut fired = 0;
        loop {
            let mut due = {
                let mut inner = self.inner.borrow_mut();
                let (due, pending): (Vec<_>, Vec<_>) = inner
                    .queue
                    .drain(..)
                    .partition(|item| item.at <= horizon);
                inner.queue = pending;
                due
            };
            if due.is_empty() {
                return fired;
            }

            due.sort_by(|a, b| a.at.total_cmp(&b.at));
            fired += due.len();
            for item in due {
                trace!("firing item at {:.6}s", item.at);
                (item.f)(item.at);
            }
        }
    }

    /// Periodic timer tick, called by the host loop as often as it likes.
    ///
    /// Flushes at most once per poll interval, and only while started,
    /// visible and online. Returns the number of items fired.
    pub fn poll(&self, wall: Instant) -> usize {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.running
                || inner.visibility == Visibility::Hidden
                || inner.clock.is_offline()
            {
                return 0;
            }
            if let Some(next) = inner.next_poll {
                if wall < next {
                    return 0;
                }
            }
            inner.next_poll = Some(wall + inner.config.poll_interval());
        }
        self.flush()
    }

    /// Track host visibility.
    ///
    /// Hiding pauses the timer. Showing restarts it and forces an immediate
    /// flush so overdue items go out once instead of in a burst of stale
    /// ticks; steps that elapsed while hidden are not replayed.
    pub fn set_visibility(&self, visibility: Visibility, wall: Instant) {
        let resume = {
            let mut inner = self.inner.borrow_mut();
            if inner.visibility == visibility {
                return;
            }
            inner.visibility = visibility;
            debug!("scheduler visibility: {:?}", visibility);
            match visibility {
                Visibility::Hidden => {
                    inner.next_poll = None;
                    false
                }
                Visibility::Visible => {
                    inner.next_poll = Some(wall + inner.config.poll_interval());
                    inner.running && !inner.clock.is_offline()
                }
            }
        };

        if resume {
            self.flush();
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.inner.borrow().visibility
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    pub fn pending_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Target times of pending items, ascending
    pub fn pending_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.inner.borrow().queue.iter().map(|i| i.at).collect();
        times.sort_by(f64::total_cmp);
        times
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config
    }

    /// Current time of the clock this scheduler runs on
    pub fn now(&self) -> f64 {
        self.inner.borrow().clock.audio_time()
    }

    pub fn is_offline(&self) -> bool {
        self.inner.borrow().clock.is_offline()
    }
}
