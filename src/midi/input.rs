// MIDI clock input - Réception de start/stop/clock depuis un maître externe

use super::event::ClockMessage;
use crate::error::MidiError;
use crate::messaging::channels::{ClockProducer, TimedClockMessage};
use midir::{Ignore, MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::Producer;

/// Connexion qui transfère les messages d'horloge entrants dans un ring buffer.
///
/// Le callback midir tourne sur un thread du driver : il parse et pousse, rien d'autre.
/// La boucle de contrôle vide l'autre extrémité avec `ClockSync::drain_inbound`.
pub struct MidirClockInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidirClockInput {
    /// Se connecte au port d'entrée nommé `port_name`, ou au premier port
    /// disponible si None
    pub fn connect(port_name: Option<&str>, mut clock_tx: ClockProducer) -> Result<Self, MidiError> {
        let mut midi_in =
            MidirInput::new("padseq clock input").map_err(|e| MidiError::Init(e.to_string()))?;
        // Ne pas ignorer les messages de timing
        midi_in.ignore(Ignore::SysexAndActiveSense);

        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(MidiError::NoPorts);
        }

        let port = match port_name {
            Some(wanted) => ports
                .iter()
                .find(|p| midi_in.port_name(p).map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?,
            None => &ports[0],
        };

        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "padseq-clock-input",
                move |timestamp, message, _| {
                    if let Some(message) = ClockMessage::from_bytes(message) {
                        let timed = TimedClockMessage::new(message, timestamp);
                        // try_push ne bloque jamais le thread du driver
                        if clock_tx.try_push(timed).is_err() {
                            log::warn!("MIDI clock buffer full, message dropped");
                        }
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("MIDI clock input connected: {}", name);
        Ok(Self {
            _connection: connection,
            port_name: name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
