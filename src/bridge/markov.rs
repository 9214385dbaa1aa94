/// Built-in drum continuation model.
///
/// A first-order chain over the nine base kit voices: each step draws every
/// voice independently from a per-position weight, nudged up for the kick
/// where the primer has a note and damped when the same voice hit on the
/// previous step. Temperature flattens (> 1) or sharpens (< 1) the weights.
/// Output only uses base pitches, so the board's mirrored rows are reached
/// through the coin flip in `Grid::merge_generated_notes`.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ContinuationModel, NoteSequence, SequenceNote};
use crate::error::Result;

const BAR: usize = 16;
const PRIMER_BOOST: f32 = 0.4;
const REPEAT_DAMPING: f32 = 0.5;

struct KitVoice {
    pitch: u8,
    weights: [f32; BAR],
    follows_primer: bool,
}

const VOICES: [KitVoice; 9] = [
    // kick
    KitVoice {
        pitch: 36,
        weights: [0.9, 0.0, 0.1, 0.0, 0.2, 0.0, 0.1, 0.0, 0.8, 0.0, 0.2, 0.0, 0.2, 0.0, 0.1, 0.1],
        follows_primer: true,
    },
    // snare
    KitVoice {
        pitch: 38,
        weights: [0.0, 0.0, 0.0, 0.0, 0.9, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.9, 0.0, 0.1, 0.2],
        follows_primer: false,
    },
    // closed hat
    KitVoice {
        pitch: 42,
        weights: [0.6, 0.1, 0.6, 0.1, 0.6, 0.1, 0.6, 0.1, 0.6, 0.1, 0.6, 0.1, 0.6, 0.1, 0.6, 0.1],
        follows_primer: false,
    },
    // open hat
    KitVoice {
        pitch: 46,
        weights: [
            0.0, 0.0, 0.15, 0.0, 0.0, 0.0, 0.15, 0.0, 0.0, 0.0, 0.15, 0.0, 0.0, 0.0, 0.15, 0.0,
        ],
        follows_primer: false,
    },
    // toms, mostly at the end of the bar
    KitVoice {
        pitch: 45,
        weights: [
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.05, 0.15, 0.15, 0.1,
        ],
        follows_primer: false,
    },
    KitVoice {
        pitch: 48,
        weights: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.15, 0.1, 0.05],
        follows_primer: false,
    },
    KitVoice {
        pitch: 50,
        weights: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.15, 0.1, 0.05, 0.0],
        follows_primer: false,
    },
    // crash on the downbeat
    KitVoice {
        pitch: 49,
        weights: [0.15, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        follows_primer: false,
    },
    // ride
    KitVoice {
        pitch: 51,
        weights: [0.05; BAR],
        follows_primer: false,
    },
];

pub struct MarkovDrums {
    rng: StdRng,
}

impl MarkovDrums {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for MarkovDrums {
    fn default() -> Self {
        Self::new()
    }
}

fn temper(weight: f32, temperature: f32) -> f32 {
    if weight <= 0.0 {
        return 0.0;
    }
    weight.powf(1.0 / temperature.max(0.05)).clamp(0.0, 1.0)
}

impl ContinuationModel for MarkovDrums {
    fn continue_sequence(
        &mut self,
        sequence: &NoteSequence,
        steps: u32,
        temperature: f32,
    ) -> Result<NoteSequence> {
        let mut primed = [false; BAR];
        for note in &sequence.notes {
            primed[note.start_step as usize % BAR] = true;
        }

        let mut notes = Vec::new();
        let mut previous: Vec<u8> = Vec::new();
        for step in 0..steps {
            let pos = step as usize % BAR;
            let mut hits = Vec::new();
            for voice in VOICES.iter() {
                let mut weight = voice.weights[pos];
                if voice.follows_primer && primed[pos] {
                    weight = (weight + PRIMER_BOOST).min(1.0);
                }
                if previous.contains(&voice.pitch) {
                    weight *= REPEAT_DAMPING;
                }
                if self.rng.gen::<f32>() < temper(weight, temperature) {
                    hits.push(voice.pitch);
                    notes.push(SequenceNote::drum(voice.pitch, step));
                }
            }
            previous = hits;
        }
        Ok(NoteSequence::new(notes))
    }
}
