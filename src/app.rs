/// Top-level controller: owns the board state and turns user commands into
/// calls on the grid, the scheduler and the improviser.
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::audio::SoundOutput;
use crate::bridge::{Improviser, MarkovDrums, ModelBackend, ModelStatus};
use crate::config::{ModelFamily, Settings};
use crate::error::{BoardError, Result};
use crate::sequencer::playback::{Clock, PlaybackScheduler, StepInterval};
use crate::sequencer::render::{project, Frame};
use crate::sequencer::ripple::RippleField;
use crate::sequencer::{Grid, Sound};
use crate::share::{self, ShareLoad, SharePattern, INVALID_FRAGMENT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Toggle a cell with the currently selected sound.
    Toggle { row: usize, col: usize },
    SelectSound(Sound),
    PlayOrPause,
    Reset { clear_fragment: bool },
    LoadDemo(usize),
    LoadFragment(String),
    SetSpeed(u64),
    SetModel(ModelFamily),
    /// Load the model on first use, afterwards ask it for drums.
    Improvise,
}

pub type ModelFactory = fn(ModelFamily) -> Result<ModelBackend>;

/// Models that ship with the crate. Latent models have to be plugged in
/// with `Board::set_model_factory`.
pub fn builtin_model(family: ModelFamily) -> Result<ModelBackend> {
    match family {
        ModelFamily::Continuation => Ok(ModelBackend::Continuation(Box::new(MarkovDrums::new()))),
        ModelFamily::Latent => Err(BoardError::Model("no built-in latent model".into())),
    }
}

pub struct Board<S: SoundOutput, C: Clock> {
    grid: Grid,
    ripples: RippleField,
    scheduler: PlaybackScheduler,
    improviser: Improviser,
    settings: Settings,
    interval: StepInterval,
    selected: Sound,
    fragment: String,
    model_factory: ModelFactory,
    /// The model family changed while the improviser was busy.
    reload_pending: bool,
    rng: StdRng,
    out: S,
    clock: C,
}

impl<S: SoundOutput, C: Clock> Board<S, C> {
    pub fn new(out: S, clock: C, settings: Settings) -> Self {
        Self::with_rng(out, clock, settings, StdRng::from_entropy())
    }

    pub fn with_rng(out: S, clock: C, settings: Settings, rng: StdRng) -> Self {
        let interval = StepInterval::new(settings.step_interval_ms);
        Self {
            grid: Grid::new(),
            ripples: RippleField::new(),
            scheduler: PlaybackScheduler::new(interval.clone()),
            improviser: Improviser::new(settings.generation()),
            settings,
            interval,
            selected: Sound::Synth,
            fragment: String::new(),
            model_factory: builtin_model,
            reload_pending: false,
            rng,
            out,
            clock,
        }
    }

    pub fn set_model_factory(&mut self, factory: ModelFactory) {
        self.model_factory = factory;
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ripples(&self) -> &RippleField {
        &self.ripples
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn model_status(&self) -> ModelStatus {
        self.improviser.status()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn interval(&self) -> &StepInterval {
        &self.interval
    }

    pub fn selected_sound(&self) -> Sound {
        self.selected
    }

    /// Current shareable state, kept up to date after every edit.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn output(&self) -> &S {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut S {
        &mut self.out
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn frame(&self) -> Frame {
        project(&self.grid, &self.ripples, self.scheduler.strike())
    }

    fn update_fragment(&mut self) {
        self.fragment = share::encode(&self.grid, self.interval.millis());
    }

    fn apply(&mut self, pattern: SharePattern) {
        self.grid = pattern.grid;
        if let Some(ms) = pattern.speed_ms {
            self.set_speed(ms);
        }
        self.update_fragment();
    }

    fn set_speed(&mut self, ms: u64) {
        self.interval.set_millis(ms);
        self.settings.step_interval_ms = self.interval.millis();
    }

    fn load_model(&mut self) {
        let family = self.settings.model;
        let factory = self.model_factory;
        info!(?family, "loading model");
        self.improviser.load(move || factory(family));
    }

    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        debug!(?command, "dispatch");
        match command {
            Command::Toggle { row, col } => {
                self.grid.toggle(row, col, self.selected)?;
                self.update_fragment();
            }
            Command::SelectSound(sound) => self.selected = sound,
            Command::PlayOrPause => {
                if self.scheduler.is_running() {
                    self.scheduler.stop();
                    self.out.pause_transport();
                } else {
                    self.scheduler.start(self.clock.now(), &mut self.ripples);
                    self.out.start_transport();
                }
            }
            Command::Reset { clear_fragment } => {
                self.grid.reset();
                if clear_fragment {
                    self.fragment.clear();
                } else {
                    self.update_fragment();
                }
            }
            Command::LoadDemo(index) => {
                let pattern = share::demo(index)
                    .ok_or_else(|| BoardError::Format(format!("no demo {}", index)))?;
                self.apply(pattern);
            }
            Command::LoadFragment(text) => match share::load(&text) {
                ShareLoad::Loaded(pattern) => self.apply(pattern),
                ShareLoad::Empty => {}
                ShareLoad::Invalid => self.fragment = INVALID_FRAGMENT.to_string(),
            },
            Command::SetSpeed(ms) => {
                self.set_speed(ms);
                self.update_fragment();
            }
            Command::SetModel(family) => {
                if self.settings.model != family {
                    self.settings.model = family;
                    match self.improviser.status() {
                        ModelStatus::NotLoaded => {}
                        ModelStatus::Ready => self.load_model(),
                        ModelStatus::Loading | ModelStatus::Generating => {
                            debug!(?family, "model busy, reloading once it is done");
                            self.reload_pending = true;
                        }
                    }
                }
            }
            Command::Improvise => match self.improviser.status() {
                ModelStatus::NotLoaded => self.load_model(),
                ModelStatus::Loading => return Err(BoardError::ModelUnavailable),
                ModelStatus::Generating => return Err(BoardError::GenerationInFlight),
                ModelStatus::Ready => {
                    self.improviser.set_params(self.settings.generation());
                    self.improviser.request(
                        &mut self.grid,
                        self.settings.clear_drums,
                        self.settings.force_drums,
                    )?;
                    self.update_fragment();
                }
            },
        }
        Ok(())
    }

    /// Advance playback and collect finished model work. Returns true when
    /// the board needs repainting.
    pub fn poll(&mut self) -> bool {
        let mut changed = self.scheduler.poll(
            &self.clock,
            &self.grid,
            &mut self.ripples,
            &mut self.out,
        );

        let was_loading = self.improviser.status() == ModelStatus::Loading;
        match self.improviser.poll() {
            Some(Ok(notes)) => {
                let written = self.grid.merge_generated_notes(&notes, &mut self.rng);
                info!(notes = notes.len(), written, "merged generated drums");
                self.update_fragment();
                changed = true;
            }
            // already reported by the bridge
            Some(Err(BoardError::DegenerateGeneration)) => changed = true,
            Some(Err(err)) => {
                warn!("generation failed: {}", err);
                changed = true;
            }
            None => {}
        }

        if self.reload_pending && !self.improviser.is_busy() {
            self.reload_pending = false;
            self.load_model();
            changed = true;
        }
        changed || (was_loading && self.improviser.status() != ModelStatus::Loading)
    }
}
