// MIDI clock output - Envoi de start/stop/clock pour le rôle maître

use super::event::ClockMessage;
use crate::error::MidiError;
use midir::{MidiOutput as MidirOutput, MidiOutputConnection};

/// Outbound side of the external clock protocol
pub trait ClockOutput {
    /// Send `message`, intended to take effect at audio time `at`.
    ///
    /// Outputs without timestamped delivery send immediately.
    fn send(&mut self, message: ClockMessage, at: f64) -> Result<(), MidiError>;
}

/// Clock output on a midir connection
pub struct MidirClockOutput {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirClockOutput {
    /// Se connecte au port de sortie nommé `port_name`, ou au premier port
    /// disponible si None
    pub fn connect(port_name: Option<&str>) -> Result<Self, MidiError> {
        let midi_out =
            MidirOutput::new("padseq clock output").map_err(|e| MidiError::Init(e.to_string()))?;

        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(MidiError::NoPorts);
        }

        let port = match port_name {
            Some(wanted) => ports
                .iter()
                .find(|p| midi_out.port_name(p).map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?,
            None => &ports[0],
        };

        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_out
            .connect(port, "padseq-clock")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("MIDI clock output connected: {}", name);
        Ok(Self {
            connection,
            port_name: name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ClockOutput for MidirClockOutput {
    fn send(&mut self, message: ClockMessage, _at: f64) -> Result<(), MidiError> {
        self.connection
            .send(&[message.status()])
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}
