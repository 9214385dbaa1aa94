/// Audio output using cpal
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::midi::{midi_note_to_frequency, DRUM_KIT_PITCHES, SYNTH_ROW_NOTES};

/// What the playback loop needs from whatever makes the noise.
pub trait SoundOutput {
    fn play_synth_note(&mut self, row: usize);
    fn play_drum_note(&mut self, row: usize);
    /// Called once per tick before the column's notes are played. Notes
    /// from the previous column should end here.
    fn begin_column(&mut self) {}
    fn start_transport(&mut self);
    fn pause_transport(&mut self);
}

/// Plays nothing. Used when no device is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl SoundOutput for NullOutput {
    fn play_synth_note(&mut self, _row: usize) {}
    fn play_drum_note(&mut self, _row: usize) {}
    fn start_transport(&mut self) {}
    fn pause_transport(&mut self) {}
}

/// Send every call to both outputs, e.g. speakers and MIDI.
impl<A: SoundOutput, B: SoundOutput> SoundOutput for (A, B) {
    fn play_synth_note(&mut self, row: usize) {
        self.0.play_synth_note(row);
        self.1.play_synth_note(row);
    }

    fn play_drum_note(&mut self, row: usize) {
        self.0.play_drum_note(row);
        self.1.play_drum_note(row);
    }

    fn begin_column(&mut self) {
        self.0.begin_column();
        self.1.begin_column();
    }

    fn start_transport(&mut self) {
        self.0.start_transport();
        self.1.start_transport();
    }

    fn pause_transport(&mut self) {
        self.0.pause_transport();
        self.1.pause_transport();
    }
}

// Roughly a sixteenth at the default speed
const SYNTH_DECAY_SECS: f32 = 0.25;
const DRUM_DECAY_SECS: f32 = 0.12;
const MAX_VOICES: usize = 32;

#[derive(Debug, Clone)]
struct Voice {
    frequency: f32,
    phase: f32,
    amplitude: f32,
    decay_secs: f32,
    /// 0.0 = pure tone, 1.0 = pure noise
    noise: f32,
    seed: u32,
}

impl Voice {
    fn synth(frequency: f32) -> Self {
        Self {
            frequency,
            phase: 0.0,
            amplitude: 0.2,
            decay_secs: SYNTH_DECAY_SECS,
            noise: 0.0,
            seed: 1,
        }
    }

    fn drum(pitch: u8) -> Self {
        // Hats and cymbals sit above the toms in the GM kit
        let noise = if matches!(pitch, 42 | 44 | 46 | 49 | 51 | 52 | 55) { 0.9 } else { 0.25 };
        Self {
            frequency: midi_note_to_frequency(pitch),
            phase: 0.0,
            amplitude: 0.35,
            decay_secs: DRUM_DECAY_SECS,
            noise,
            seed: 0x9E37_79B9 ^ pitch as u32,
        }
    }

    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let tone = (self.phase * 2.0 * std::f32::consts::PI).sin();
        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        // xorshift white noise
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 17;
        self.seed ^= self.seed << 5;
        let white = (self.seed as f32 / u32::MAX as f32) * 2.0 - 1.0;

        let out = (tone * (1.0 - self.noise) + white * self.noise) * self.amplitude;
        self.amplitude *= (-1.0 / (self.decay_secs * sample_rate)).exp();
        out
    }

    fn is_silent(&self) -> bool {
        self.amplitude < 1e-4
    }
}

#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
    running: bool,
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    mixer: Arc<Mutex<Mixer>>,
}

impl AudioOutput {
    pub fn new() -> Option<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let stream = Self::setup_audio_stream(Arc::clone(&mixer))?;

        Some(Self {
            _stream: Some(stream),
            mixer,
        })
    }

    fn setup_audio_stream(mixer: Arc<Mutex<Mixer>>) -> Option<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        info!("Audio: {} Hz, {} channels", sample_rate, channels);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut mixer) = mixer.lock() else {
                        data.fill(0.0);
                        return;
                    };

                    for frame in data.chunks_mut(channels) {
                        let mut sample = 0.0f32;
                        if mixer.running {
                            for voice in mixer.voices.iter_mut() {
                                sample += voice.next_sample(sample_rate);
                            }
                        }
                        frame.fill(sample.clamp(-1.0, 1.0));
                    }
                    mixer.voices.retain(|v| !v.is_silent());
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            ),
            other => {
                warn!("Unsupported sample format {:?}, audio disabled", other);
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                let _ = stream.play();
                Some(stream)
            }
            Err(err) => {
                warn!("Could not open audio stream: {}", err);
                None
            }
        }
    }

    fn push(&mut self, voice: Voice) {
        if let Ok(mut mixer) = self.mixer.lock() {
            if mixer.voices.len() >= MAX_VOICES {
                mixer.voices.remove(0);
            }
            mixer.voices.push(voice);
        }
    }

    fn set_running(&mut self, running: bool) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.running = running;
            if !running {
                mixer.voices.clear();
            }
        }
    }

    #[cfg(test)]
    fn voice_count(&self) -> usize {
        self.mixer.lock().map(|m| m.voices.len()).unwrap_or(0)
    }
}

impl SoundOutput for AudioOutput {
    fn play_synth_note(&mut self, row: usize) {
        if let Some(&note) = SYNTH_ROW_NOTES.get(row) {
            self.push(Voice::synth(midi_note_to_frequency(note)));
        }
    }

    fn play_drum_note(&mut self, row: usize) {
        if let Some(&pitch) = DRUM_KIT_PITCHES.get(row) {
            self.push(Voice::drum(pitch));
        }
    }

    fn start_transport(&mut self) {
        self.set_running(true);
    }

    fn pause_transport(&mut self) {
        self.set_running(false);
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|| Self {
            _stream: None,
            mixer: Arc::new(Mutex::new(Mixer::default())),
        })
    }
}
