// Error types
// The timing hot path never fails; these cover configuration and device I/O

/// Configuration loading / validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid tempo: {0} BPM (expected 20..=300)")]
    InvalidBpm(f64),

    #[error("Invalid bar count: {0} (expected 1, 2, 4 or 8)")]
    InvalidBars(u32),

    #[error("Invalid division: {0} (expected 1, 2, 4, 8, 16, 32 or 64)")]
    InvalidDivision(u32),

    #[error("Invalid swing: {0} (expected 0.0 <= swing < 1.0)")]
    InvalidSwing(f64),

    #[error("Invalid scheduler settings: {0}")]
    InvalidScheduler(String),
}

/// MIDI device errors
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI: {0}")]
    Init(String),

    #[error("No MIDI port available")]
    NoPorts,

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}
