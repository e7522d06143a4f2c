// MIDI clock events - System real-time vocabulary used for clock sync

/// MIDI clock resolution: pulses per quarter note
pub const PULSES_PER_QUARTER: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockMessage {
    /// Timing clock pulse (0xF8)
    Clock,
    /// Start from the beginning (0xFA)
    Start,
    /// Resume from the current position (0xFB)
    Continue,
    /// Stop (0xFC)
    Stop,
}

impl ClockMessage {
    /// Status byte of this message
    pub fn status(&self) -> u8 {
        match self {
            ClockMessage::Clock => 0xF8,
            ClockMessage::Start => 0xFA,
            ClockMessage::Continue => 0xFB,
            ClockMessage::Stop => 0xFC,
        }
    }

    /// Parse a raw MIDI message.
    ///
    /// Real-time messages are a single status byte; anything else is not a
    /// clock message and yields None.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.first()? {
            0xF8 => Some(ClockMessage::Clock),
            0xFA => Some(ClockMessage::Start),
            0xFB => Some(ClockMessage::Continue),
            0xFC => Some(ClockMessage::Stop),
            _ => None,
        }
    }
}

/// Seconds between two clock pulses at `bpm`
pub fn seconds_per_clock_tick(bpm: f64) -> f64 {
    60.0 / (bpm * PULSES_PER_QUARTER as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bytes() {
        assert_eq!(ClockMessage::Clock.status(), 0xF8);
        assert_eq!(ClockMessage::Start.status(), 0xFA);
        assert_eq!(ClockMessage::Continue.status(), 0xFB);
        assert_eq!(ClockMessage::Stop.status(), 0xFC);
    }

    #[test]
    fn test_parse_clock_messages() {
        for message in [
            ClockMessage::Clock,
            ClockMessage::Start,
            ClockMessage::Continue,
            ClockMessage::Stop,
        ] {
            assert_eq!(ClockMessage::from_bytes(&[message.status()]), Some(message));
        }
    }

    #[test]
    fn test_invalid_empty_message() {
        let bytes = [];
        assert!(ClockMessage::from_bytes(&bytes).is_none());
    }

    #[test]
    fn test_non_clock_messages_ignored() {
        assert!(ClockMessage::from_bytes(&[0x90, 60, 100]).is_none()); // Note On
        assert!(ClockMessage::from_bytes(&[0xF0, 0x7E, 0xF7]).is_none()); // SysEx
        assert!(ClockMessage::from_bytes(&[0xFE]).is_none()); // Active sensing
    }

    #[test]
    fn test_seconds_per_clock_tick() {
        assert!((seconds_per_clock_tick(120.0) - 60.0 / 2880.0).abs() < 1e-12);
        assert!((seconds_per_clock_tick(150.0) - 60.0 / 3600.0).abs() < 1e-12);
    }
}
