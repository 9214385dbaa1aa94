/// MIDI output using midir
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{info, warn};

use crate::audio::SoundOutput;

/// Row -> MIDI note for the synth, top row highest (B4 down to A2).
pub const SYNTH_ROW_NOTES: [u8; 16] = [
    71, 69, 67, 65, 64, 62, 60, 59, 57, 55, 53, 52, 50, 48, 47, 45,
];

/// Row -> General MIDI drum key used for playback.
pub const DRUM_KIT_PITCHES: [u8; 16] = [
    36, 38, 42, 46, 45, 48, 50, 49, 51, 35, 27, 29, 47, 30, 52, 44,
];

const SYNTH_CHANNEL: u8 = 0;
const DRUM_CHANNEL: u8 = 9;
const VELOCITY: u8 = 100;

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    /// Notes still sounding, released on the next strike or on pause.
    held: Vec<(u8, u8)>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            held: Vec::new(),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new("dotboard MIDI Output") {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), String> {
        let midi_out = MidiOutput::new("dotboard MIDI Output")
            .map_err(|e| format!("Failed to create MIDI output: {}", e))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| "Invalid port index".to_string())?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "dotboard")
            .map_err(|e| format!("Failed to connect: {}", e))?;

        info!(port = %name, "MIDI output connected");
        self.connection = Some(connection);
        Ok(())
    }

    /// Connect to the first port whose name contains `name`.
    pub fn connect_named(&mut self, name: &str) -> Result<(), String> {
        let index = Self::available_ports()
            .iter()
            .position(|p| p.contains(name))
            .ok_or_else(|| format!("No MIDI port matching '{}'", name))?;
        self.connect(index)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), String> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[0x90 | channel, note, velocity])
                .map_err(|e| format!("Failed to send note on: {}", e))?;
        }
        Ok(())
    }

    pub fn send_note_off(&mut self, channel: u8, note: u8) -> Result<(), String> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[0x80 | channel, note, 0])
                .map_err(|e| format!("Failed to send note off: {}", e))?;
        }
        Ok(())
    }

    fn release_held(&mut self) {
        for (channel, note) in std::mem::take(&mut self.held) {
            if let Err(e) = self.send_note_off(channel, note) {
                warn!("{}", e);
            }
        }
    }

    fn strike(&mut self, channel: u8, note: u8) {
        if let Some(pos) = self.held.iter().position(|&h| h == (channel, note)) {
            self.held.remove(pos);
            let _ = self.send_note_off(channel, note);
        }
        match self.send_note_on(channel, note, VELOCITY) {
            Ok(()) => self.held.push((channel, note)),
            Err(e) => warn!("{}", e),
        }
    }

    pub fn disconnect(&mut self) {
        self.release_held();
        self.connection = None;
    }
}

impl SoundOutput for MidiOutputDevice {
    fn play_synth_note(&mut self, row: usize) {
        if let Some(&note) = SYNTH_ROW_NOTES.get(row) {
            self.strike(SYNTH_CHANNEL, note);
        }
    }

    fn play_drum_note(&mut self, row: usize) {
        if let Some(&note) = DRUM_KIT_PITCHES.get(row) {
            self.strike(DRUM_CHANNEL, note);
        }
    }

    // Every note lasts one step
    fn begin_column(&mut self) {
        self.release_held();
    }

    fn start_transport(&mut self) {}

    fn pause_transport(&mut self) {
        self.release_held();
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

pub fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
