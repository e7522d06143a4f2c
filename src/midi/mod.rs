// Module MIDI : codec des messages d'horloge et adaptateurs midir

pub mod device;
pub mod event;
pub mod input;
pub mod output;

pub use device::{MidiDeviceInfo, MidiDeviceManager};
pub use event::{ClockMessage, PULSES_PER_QUARTER, seconds_per_clock_tick};
pub use input::MidirClockInput;
pub use output::{ClockOutput, MidirClockOutput};
