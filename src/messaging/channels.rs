// Lock-free channels between device threads and the control loop

use crate::midi::event::ClockMessage;
use ringbuf::{HeapRb, traits::Split};

/// Inbound clock message stamped with the driver timestamp (microseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedClockMessage {
    pub message: ClockMessage,
    pub timestamp_micros: u64,
}

impl TimedClockMessage {
    pub fn new(message: ClockMessage, timestamp_micros: u64) -> Self {
        Self {
            message,
            timestamp_micros,
        }
    }
}

pub type ClockProducer = ringbuf::HeapProd<TimedClockMessage>;
pub type ClockConsumer = ringbuf::HeapCons<TimedClockMessage>;

pub fn create_clock_channel(capacity: usize) -> (ClockProducer, ClockConsumer) {
    let rb = HeapRb::<TimedClockMessage>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_clock_channel_preserves_order() {
        let (mut tx, mut rx) = create_clock_channel(4);
        for (i, message) in [ClockMessage::Start, ClockMessage::Clock, ClockMessage::Stop]
            .into_iter()
            .enumerate()
        {
            tx.try_push(TimedClockMessage {
                message,
                timestamp_micros: i as u64,
            })
            .unwrap();
        }

        let received: Vec<ClockMessage> = std::iter::from_fn(|| rx.try_pop())
            .map(|m| m.message)
            .collect();
        assert_eq!(
            received,
            vec![ClockMessage::Start, ClockMessage::Clock, ClockMessage::Stop]
        );
    }

    #[test]
    fn test_full_channel_rejects_push() {
        let (mut tx, _rx) = create_clock_channel(1);
        let message = TimedClockMessage {
            message: ClockMessage::Clock,
            timestamp_micros: 0,
        };
        assert!(tx.try_push(message).is_ok());
        assert!(tx.try_push(message).is_err());
    }
}
