// Gestion des devices MIDI

use midir::{MidiInput as MidirInput, MidiOutput as MidirOutput};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

pub struct MidiDeviceManager;

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self
    }

    /// Liste tous les ports MIDI d'entrée (sources d'horloge pour le rôle esclave)
    pub fn list_input_ports(&self) -> Vec<MidiDeviceInfo> {
        match MidirInput::new("padseq scanner") {
            Ok(midi_in) => midi_in
                .ports()
                .iter()
                .enumerate()
                .filter_map(|(index, port)| {
                    midi_in.port_name(port).ok().map(|name| MidiDeviceInfo {
                        id: format!("midi_in_{}", index),
                        name,
                        is_default: index == 0,
                    })
                })
                .collect(),
            Err(e) => {
                log::warn!("MIDI input scan failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Liste tous les ports MIDI de sortie (destinations d'horloge pour le rôle maître)
    pub fn list_output_ports(&self) -> Vec<MidiDeviceInfo> {
        match MidirOutput::new("padseq scanner") {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .enumerate()
                .filter_map(|(index, port)| {
                    midi_out.port_name(port).ok().map(|name| MidiDeviceInfo {
                        id: format!("midi_out_{}", index),
                        name,
                        is_default: index == 0,
                    })
                })
                .collect(),
            Err(e) => {
                log::warn!("MIDI output scan failed: {}", e);
                Vec::new()
            }
        }
    }
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
