// Sequencer module
// Step grid timing, lookahead scheduling, transport and offline rendering

pub mod grid;
pub mod pattern;
pub mod render;
pub mod scheduler;
pub mod transport;

pub use grid::{GridSpec, TransportConfig};
pub use pattern::{PadHit, Pattern, PatternId, PatternSource, TriggerSink, step_trigger};
pub use render::{RenderOptions, RenderedHit, render_offline};
pub use scheduler::{Scheduler, SchedulerConfig, Visibility};
pub use transport::{StepHook, TransportEngine, TransportState};
