// padseq - Audio-clock synchronized step sequencer transport

pub mod clock;
pub mod config;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod observer;
pub mod sequencer;
pub mod sync;

// Re-export commonly used types for convenience
pub use clock::{AudioClock, Clock, ManualClock, WallClock};
pub use config::{SessionConfig, SyncConfig};
pub use error::{ConfigError, MidiError};
pub use midi::{ClockMessage, ClockOutput};
pub use observer::Subscription;
pub use sequencer::{
    GridSpec, Pattern, RenderOptions, RenderedHit, Scheduler, SchedulerConfig, TransportConfig,
    TransportEngine, TransportState, Visibility, render_offline,
};
pub use sync::{ClockAuthority, ClockRole, ClockSync, SyncMode, SyncState, TempoTracker};
