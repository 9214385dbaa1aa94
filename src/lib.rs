/// dotboard - a 16x16 step-sequencer sound board
///
/// This library provides the pieces behind the board:
/// - The cell grid and its shareable text encoding
/// - Ripple effects and the playback scheduler that strikes each column
/// - A projector from board state to per-cell visuals
/// - A bridge to generative drum models
/// - Audio and MIDI outputs

pub mod app;
pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod midi;
pub mod sequencer;
pub mod share;

// Re-export commonly used types
pub use app::{Board, Command};
pub use audio::{AudioOutput, NullOutput, SoundOutput};
pub use bridge::{Improviser, ModelBackend, ModelStatus, NoteSequence, SequenceNote};
pub use config::{ModelFamily, Settings};
pub use error::{BoardError, Result};
pub use midi::{midi_note_name, MidiOutputDevice};
pub use sequencer::playback::{Clock, ManualClock, PlaybackScheduler, PlaybackState, SystemClock};
pub use sequencer::render::CellVisual;
pub use sequencer::ripple::RippleField;
pub use sequencer::{Cell, Grid, Sound};
