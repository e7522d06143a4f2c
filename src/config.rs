// Session configuration - Tempo, grid, scheduler and clock sync settings
// Stored as RON or JSON, picked by file extension

use crate::error::ConfigError;
use crate::sequencer::{GridSpec, SchedulerConfig, TransportConfig};
use crate::sync::{ClockRole, MAX_BPM, MIN_BPM, SyncMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Clock sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub mode: SyncMode,
    pub role: ClockRole,
    /// MIDI output port for master role (None = first available)
    pub output_port: Option<String>,
    /// MIDI input port for slave role (None = first available)
    pub input_port: Option<String>,
    /// Scheduler driving the pulse loop. Kept tight because MIDI ports
    /// send immediately rather than at a timestamp.
    pub scheduler: SchedulerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Internal,
            role: ClockRole::Master,
            output_port: None,
            input_port: None,
            scheduler: SchedulerConfig {
                lookahead_sec: 0.002,
                poll_interval_ms: 1,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ron,
    Json,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(Format::Ron),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Everything a playback session is configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub scheduler: SchedulerConfig,
    pub sync: SyncConfig,
}

impl SessionConfig {
    /// Load and validate a `.ron` or `.json` session file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let text = std::fs::read_to_string(path)?;

        let config = match format {
            Format::Ron => Self::from_ron_str(&text)?,
            Format::Json => Self::from_json_str(&text)?,
        };
        log::info!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Write to `path` in the format its extension names
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match Format::of(path)? {
            Format::Ron => self.to_ron_string()?,
            Format::Json => self.to_json_string()?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values outside the supported enumerations and ranges.
    ///
    /// The transport itself clamps degenerate values; this is the gate for
    /// anything coming from disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transport = &self.transport;
        let grid = transport.grid_spec;

        if !GridSpec::ALLOWED_BARS.contains(&grid.bars) {
            return Err(ConfigError::InvalidBars(grid.bars));
        }
        if !GridSpec::ALLOWED_DIVISIONS.contains(&grid.division) {
            return Err(ConfigError::InvalidDivision(grid.division));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&transport.bpm) {
            return Err(ConfigError::InvalidBpm(transport.bpm));
        }
        if !(0.0..1.0).contains(&transport.swing) {
            return Err(ConfigError::InvalidSwing(transport.swing));
        }

        for (name, scheduler) in [("scheduler", &self.scheduler), ("sync.scheduler", &self.sync.scheduler)] {
            if !(scheduler.lookahead_sec > 0.0 && scheduler.lookahead_sec.is_finite()) {
                return Err(ConfigError::InvalidScheduler(format!(
                    "{}: lookahead must be positive, got {}",
                    name, scheduler.lookahead_sec
                )));
            }
            if scheduler.poll_interval_ms == 0 {
                return Err(ConfigError::InvalidScheduler(format!(
                    "{}: poll interval must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}
