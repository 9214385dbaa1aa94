/// User settings, persisted as JSON next to the working directory.
///
/// Playback speed, model choice, temperature and whether the primer is sent
/// as drums all live here. Missing fields fall back to their defaults.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::GenerationParams;
use crate::sequencer::playback::DEFAULT_INTERVAL_MS;

pub const SETTINGS_FILE: &str = "dotboard.json";

/// Which kind of generative model `Improvise` talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Extends the primer (RNN-style `continue_sequence`).
    Continuation,
    /// Encodes and decodes the primer (VAE-style).
    Latent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Milliseconds between columns.
    pub step_interval_ms: u64,
    pub temperature: f32,
    /// How many steps the model is asked to produce.
    pub steps: u32,
    pub model: ModelFamily,
    /// Send synth notes to the model flagged as drums.
    pub force_drums: bool,
    /// Wipe existing drums before asking for new ones.
    pub clear_drums: bool,
    /// Substring of the MIDI port to open at startup.
    pub midi_port: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            step_interval_ms: DEFAULT_INTERVAL_MS,
            temperature: 1.3,
            steps: 16,
            model: ModelFamily::Continuation,
            force_drums: true,
            clear_drums: true,
            midi_port: None,
        }
    }
}

impl Settings {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE)
    }

    /// Read settings from `path`, or defaults if it is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Self::default();
        };
        match serde_json::from_str(&data) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), "ignoring bad settings file: {}", err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn generation(&self) -> GenerationParams {
        GenerationParams {
            steps: self.steps,
            temperature: self.temperature,
        }
    }
}
