// Messaging between device callback threads and the control loop

pub mod channels;

pub use channels::{ClockConsumer, ClockProducer, TimedClockMessage, create_clock_channel};
