/// Bridge between the board and a generative drum model.
///
/// The board's synth cells are turned into a `NoteSequence`, the model runs on
/// a worker thread, and its answer comes back as drum notes to merge. Only one
/// request may be outstanding at a time.
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BoardError, Result};
use crate::sequencer::Grid;

pub mod markov;

pub use markov::MarkovDrums;

pub const STEPS_PER_QUARTER: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceNote {
    pub pitch: u8,
    #[serde(rename = "quantizedStartStep")]
    pub start_step: u32,
    #[serde(rename = "quantizedEndStep")]
    pub end_step: u32,
    pub is_drum: bool,
}

impl SequenceNote {
    /// A one-step drum hit.
    pub fn drum(pitch: u8, step: u32) -> Self {
        Self {
            pitch,
            start_step: step,
            end_step: step + 1,
            is_drum: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizationInfo {
    pub steps_per_quarter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSequence {
    pub notes: Vec<SequenceNote>,
    pub quantization_info: QuantizationInfo,
}

impl NoteSequence {
    pub fn new(notes: Vec<SequenceNote>) -> Self {
        Self {
            notes,
            quantization_info: QuantizationInfo {
                steps_per_quarter: STEPS_PER_QUARTER,
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BoardError::Model(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BoardError::Model(e.to_string()))
    }
}

/// Models that extend a primer sequence by `steps` steps.
pub trait ContinuationModel: Send {
    fn continue_sequence(
        &mut self,
        sequence: &NoteSequence,
        steps: u32,
        temperature: f32,
    ) -> Result<NoteSequence>;
}

/// Latent vectors, one per encoded sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Latent(pub Vec<Vec<f32>>);

/// Models that round-trip sequences through a latent space.
pub trait LatentModel: Send {
    fn encode(&mut self, sequences: &[NoteSequence]) -> Result<Latent>;
    fn decode(&mut self, latent: &Latent) -> Result<Vec<NoteSequence>>;
}

pub enum ModelBackend {
    Continuation(Box<dyn ContinuationModel>),
    Latent(Box<dyn LatentModel>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub steps: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        // High temperature gives busier beats
        Self {
            steps: 16,
            temperature: 1.3,
        }
    }
}

impl ModelBackend {
    pub fn generate(
        &mut self,
        input: &NoteSequence,
        params: GenerationParams,
    ) -> Result<NoteSequence> {
        match self {
            ModelBackend::Continuation(model) => {
                model.continue_sequence(input, params.steps, params.temperature)
            }
            ModelBackend::Latent(model) => {
                let latent = model.encode(std::slice::from_ref(input))?;
                model
                    .decode(&latent)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| BoardError::Model("decoder returned no sequences".into()))
            }
        }
    }
}

/// Snapshot the board's synth cells as model input. `force_drums` marks the
/// notes as drum hits, which drum-only models expect.
pub fn to_model_input(grid: &mut Grid, clear_drums: bool, force_drums: bool) -> NoteSequence {
    let mut notes = grid.extract_synth_notes(clear_drums);
    for note in &mut notes {
        note.is_drum = force_drums;
    }
    NoteSequence::new(notes)
}

/// Notes to merge from a model answer. An answer identical to the input
/// means something upstream went wrong; it is reported, not merged.
pub fn from_model_output(
    output: &NoteSequence,
    original: &NoteSequence,
) -> Result<Vec<SequenceNote>> {
    if output.notes == original.notes {
        warn!(notes = output.notes.len(), "model echoed its input, ignoring");
        return Err(BoardError::DegenerateGeneration);
    }
    Ok(output.notes.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    NotLoaded,
    Loading,
    Ready,
    Generating,
}

struct Pending {
    input: NoteSequence,
    rx: Receiver<(ModelBackend, Result<NoteSequence>)>,
}

/// Owns the model and the one in-flight generation request.
pub struct Improviser {
    model: Option<ModelBackend>,
    status: ModelStatus,
    loading: Option<Receiver<Result<ModelBackend>>>,
    pending: Option<Pending>,
    params: GenerationParams,
}

impl Improviser {
    pub fn new(params: GenerationParams) -> Self {
        Self {
            model: None,
            status: ModelStatus::NotLoaded,
            loading: None,
            pending: None,
            params,
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    pub fn set_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, ModelStatus::Loading | ModelStatus::Generating)
    }

    pub fn install(&mut self, model: ModelBackend) {
        self.model = Some(model);
        self.loading = None;
        self.status = ModelStatus::Ready;
        info!("model ready");
    }

    /// Run `loader` on a worker thread; the model is installed by `poll`.
    pub fn load<F>(&mut self, loader: F)
    where
        F: FnOnce() -> Result<ModelBackend> + Send + 'static,
    {
        if self.is_busy() {
            debug!(status = ?self.status, "load ignored while busy");
            return;
        }
        let (tx, rx) = channel();
        thread::spawn(move || {
            let _ = tx.send(loader());
        });
        self.loading = Some(rx);
        self.status = ModelStatus::Loading;
        info!("loading model");
    }

    /// Start a generation round from the board's current synth cells.
    pub fn request(&mut self, grid: &mut Grid, clear_drums: bool, force_drums: bool) -> Result<()> {
        if self.pending.is_some() {
            return Err(BoardError::GenerationInFlight);
        }
        let mut model = self.model.take().ok_or(BoardError::ModelUnavailable)?;

        let input = to_model_input(grid, clear_drums, force_drums);
        let job = input.clone();
        let params = self.params;
        let (tx, rx) = channel();
        thread::spawn(move || {
            let result = model.generate(&job, params);
            let _ = tx.send((model, result));
        });

        info!(notes = input.notes.len(), "generation requested");
        self.pending = Some(Pending { input, rx });
        self.status = ModelStatus::Generating;
        Ok(())
    }

    /// Collect finished work. Returns the notes of a completed generation
    /// round, or its error.
    pub fn poll(&mut self) -> Option<Result<Vec<SequenceNote>>> {
        let loaded = self.loading.as_ref().map(|rx| rx.try_recv());
        match loaded {
            Some(Ok(Ok(model))) => self.install(model),
            Some(Ok(Err(err))) => {
                warn!("model failed to load: {}", err);
                self.loading = None;
                self.status = ModelStatus::NotLoaded;
            }
            Some(Err(TryRecvError::Disconnected)) => {
                warn!("model loader went away");
                self.loading = None;
                self.status = ModelStatus::NotLoaded;
            }
            Some(Err(TryRecvError::Empty)) | None => {}
        }

        let finished = self.pending.as_ref()?.rx.try_recv();
        match finished {
            Ok((model, result)) => {
                let input = self.pending.take()?.input;
                self.model = Some(model);
                self.status = ModelStatus::Ready;
                Some(result.and_then(|output| from_model_output(&output, &input)))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.status = ModelStatus::NotLoaded;
                Some(Err(BoardError::Model("generation worker died".into())))
            }
        }
    }
}

impl Default for Improviser {
    fn default() -> Self {
        Self::new(GenerationParams::default())
    }
}
