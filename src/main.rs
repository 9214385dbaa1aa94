#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use dotboard::{
    midi_note_name, AudioOutput, Board, CellVisual, Command, MidiOutputDevice, ModelFamily,
    ModelStatus, Settings, Sound, SystemClock,
};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Optional shared pattern, e.g. `dotboard '#0100...&120'`
    let fragment = std::env::args().nth(1);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 860.0])
            .with_title("dotboard"),
        ..Default::default()
    };

    eframe::run_native(
        "dotboard",
        options,
        Box::new(|_cc| Ok(Box::new(BoardApp::new(fragment)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
const CELL_SIZE: f32 = 36.0;

#[cfg(feature = "gui")]
struct BoardApp {
    board: Board<(AudioOutput, MidiOutputDevice), SystemClock>,
    settings_path: std::path::PathBuf,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    fragment_input: String,
    painted: Option<(usize, usize)>,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl BoardApp {
    fn new(fragment: Option<String>) -> Self {
        let settings_path = Settings::path_in(&std::env::current_dir().unwrap_or_default());
        let settings = Settings::load(&settings_path);
        let available_midi_ports = MidiOutputDevice::available_ports();

        let mut midi_output = MidiOutputDevice::new();
        let mut selected_port = None;
        if let Some(name) = &settings.midi_port {
            match midi_output.connect_named(name) {
                Ok(()) => {
                    selected_port = available_midi_ports
                        .iter()
                        .position(|p| p.contains(name.as_str()))
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let mut board = Board::new((AudioOutput::default(), midi_output), SystemClock, settings);
        if let Some(fragment) = fragment {
            let _ = board.dispatch(Command::LoadFragment(fragment));
        }

        Self {
            fragment_input: board.fragment().to_string(),
            board,
            settings_path,
            available_midi_ports,
            selected_port,
            painted: None,
            status: None,
        }
    }

    fn run(&mut self, command: Command) {
        if let Err(e) = self.board.dispatch(command) {
            self.status = Some(e.to_string());
        } else {
            self.status = None;
        }
        self.fragment_input = self.board.fragment().to_string();
    }

    fn save_settings(&self) {
        if let Err(e) = self.board.settings().save(&self.settings_path) {
            tracing::warn!("could not save settings: {}", e);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (s, d, p, i) = ctx.input(|input| {
            (
                input.key_pressed(egui::Key::S),
                input.key_pressed(egui::Key::D),
                input.key_pressed(egui::Key::P),
                input.key_pressed(egui::Key::I),
            )
        });
        if s {
            self.run(Command::SelectSound(Sound::Synth));
        }
        if d {
            self.run(Command::SelectSound(Sound::Drum));
        }
        if p {
            self.run(Command::PlayOrPause);
        }
        if i {
            self.run(Command::Improvise);
        }
    }

    fn improvise_label(&self) -> &'static str {
        match self.board.model_status() {
            ModelStatus::NotLoaded => "Load model",
            ModelStatus::Loading => "Loading...",
            ModelStatus::Ready => "Improvise!",
            ModelStatus::Generating => "Improvising...",
        }
    }
}

#[cfg(feature = "gui")]
fn cell_color(visual: &CellVisual) -> egui::Color32 {
    let sound = visual.on.or(visual.ripple);
    match (visual.on.is_some(), sound) {
        (true, Some(Sound::Synth)) if visual.active => egui::Color32::from_rgb(255, 220, 120),
        (true, Some(Sound::Drum)) if visual.active => egui::Color32::from_rgb(150, 230, 255),
        (true, Some(Sound::Synth)) => egui::Color32::from_rgb(240, 160, 40),
        (true, Some(Sound::Drum)) => egui::Color32::from_rgb(40, 140, 240),
        (false, Some(Sound::Synth)) => egui::Color32::from_rgb(110, 80, 40),
        (false, Some(Sound::Drum)) => egui::Color32::from_rgb(30, 70, 110),
        _ if visual.bar => egui::Color32::from_rgb(60, 160, 90),
        _ => egui::Color32::from_rgb(40, 40, 40),
    }
}

#[cfg(feature = "gui")]
impl eframe::App for BoardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.board.poll();
        self.handle_shortcuts(ctx);
        if self.board.fragment() != self.fragment_input && !ctx.wants_keyboard_input() {
            self.fragment_input = self.board.fragment().to_string();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("dotboard");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_id_source("midi_port")
                        .selected_text(
                            self.selected_port
                                .map(|i| self.available_midi_ports[i].as_str())
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                match self.board.output_mut().1.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => self.status = Some(e),
                }
            }

            ui.add_space(10.0);

            // Transport and sound controls
            ui.horizontal(|ui| {
                let playing = self.board.scheduler().is_running();
                if ui.button(if playing { "⏸ Pause" } else { "▶ Play!" }).clicked() {
                    self.run(Command::PlayOrPause);
                }

                let selected = self.board.selected_sound();
                if ui.selectable_label(selected == Sound::Synth, "Synth").clicked() {
                    self.run(Command::SelectSound(Sound::Synth));
                }
                if ui.selectable_label(selected == Sound::Drum, "Drums").clicked() {
                    self.run(Command::SelectSound(Sound::Drum));
                }

                let ready = !matches!(
                    self.board.model_status(),
                    ModelStatus::Loading | ModelStatus::Generating
                );
                if ui.add_enabled(ready, egui::Button::new(self.improvise_label())).clicked() {
                    self.run(Command::Improvise);
                }

                if ui.button("Clear").clicked() {
                    self.run(Command::Reset { clear_fragment: true });
                }
            });

            ui.horizontal(|ui| {
                ui.label("Speed:");
                let mut speed = self.board.interval().millis();
                if ui
                    .add(egui::Slider::new(&mut speed, 20..=500).suffix(" ms"))
                    .changed()
                {
                    self.run(Command::SetSpeed(speed));
                    self.save_settings();
                }

                ui.add_space(20.0);
                ui.label("Model:");
                let mut family = self.board.settings().model;
                ui.radio_value(&mut family, ModelFamily::Continuation, "continue");
                ui.radio_value(&mut family, ModelFamily::Latent, "encode/decode");
                if family != self.board.settings().model {
                    self.run(Command::SetModel(family));
                    self.save_settings();
                }
            });

            ui.horizontal(|ui| {
                ui.label("Demos:");
                for i in 0..dotboard::share::DEMOS.len() {
                    if ui.button(format!("{}", i + 1)).clicked() {
                        self.run(Command::LoadDemo(i));
                    }
                }
            });

            ui.add_space(10.0);

            // The board
            let frame = self.board.frame();
            let pointer_down = ctx.input(|i| i.pointer.primary_down());
            if !pointer_down {
                self.painted = None;
            }
            let mut toggled = None;

            ui.spacing_mut().item_spacing = egui::vec2(2.0, 2.0);
            for (row, visuals) in frame.iter().enumerate() {
                ui.horizontal(|ui| {
                    for (col, visual) in visuals.iter().enumerate() {
                        let button = egui::Button::new("")
                            .min_size(egui::vec2(CELL_SIZE, CELL_SIZE))
                            .fill(cell_color(visual));
                        let response = ui.add(button).on_hover_text(format!(
                            "{} ({})",
                            visual.label(),
                            midi_note_name(dotboard::midi::SYNTH_ROW_NOTES[row])
                        ));

                        // Dragging paints every cell the pointer enters
                        let entered = pointer_down
                            && response.contains_pointer()
                            && self.painted != Some((row, col));
                        if entered {
                            toggled = Some((row, col));
                        }
                    }
                });
            }
            if let Some((row, col)) = toggled {
                self.painted = Some((row, col));
                self.run(Command::Toggle { row, col });
            }

            ui.add_space(10.0);
            ui.separator();

            // Shareable pattern
            ui.horizontal(|ui| {
                ui.label("Pattern:");
                ui.add(egui::TextEdit::singleline(&mut self.fragment_input).desired_width(420.0));
                if ui.button("Load").clicked() {
                    let text = self.fragment_input.clone();
                    self.run(Command::LoadFragment(text));
                }
                if ui.button("Copy").clicked() {
                    let text = self.board.fragment().to_string();
                    ui.output_mut(|o| o.copied_text = text);
                }
            });

            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::YELLOW, format!("⚠ {}", status));
            }
            ui.label(
                "Click or drag over cells to toggle them. Keys: s synth, d drums, p play, i improvise",
            );
        });
    }
}
