/// Core board logic - the 16x16 cell matrix and its shareable encoding
use rand::Rng;
use tracing::debug;

use crate::bridge::SequenceNote;
use crate::error::{BoardError, Result};

pub mod playback;
pub mod render;
pub mod ripple;

pub const ROWS: usize = 16;
pub const COLS: usize = 16;
pub const CELL_COUNT: usize = ROWS * COLS;

/// Row -> drum pitch used when talking to the generative model.
pub const MODEL_DRUM_PITCHES: [u8; ROWS] =
    [36, 38, 42, 46, 45, 48, 50, 49, 51, 35, 27, 29, 47, 55, 52, 44];

/// Rows below this are the base drum voices; each has a mirrored variant
/// `PRIMARY_ROWS` rows further down.
pub const PRIMARY_ROWS: usize = 7;

/// Which instrument a cell (or a ripple) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    Synth,
    Drum,
}

impl Sound {
    pub fn cell(self) -> Cell {
        match self {
            Sound::Synth => Cell::Synth,
            Sound::Drum => Cell::Drum,
        }
    }

    /// Class name the renderer uses for this sound.
    pub fn class(self) -> &'static str {
        match self {
            Sound::Synth => "synth",
            Sound::Drum => "drums",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Off,
    Synth,
    Drum,
}

impl Cell {
    pub fn sound(self) -> Option<Sound> {
        match self {
            Cell::Off => None,
            Cell::Synth => Some(Sound::Synth),
            Cell::Drum => Some(Sound::Drum),
        }
    }

    pub fn is_on(self) -> bool {
        self != Cell::Off
    }

    pub fn code(self) -> char {
        match self {
            Cell::Off => '0',
            Cell::Synth => '1',
            Cell::Drum => '2',
        }
    }

    /// Decode one digit of the shareable format. Codes above 2 were only ever
    /// played and painted as drums, so they read back as `Drum`.
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_digit(10)? {
            0 => Some(Cell::Off),
            1 => Some(Cell::Synth),
            _ => Some(Cell::Drum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    cells: [[Cell; COLS]; ROWS],
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        COLS
    }

    pub fn height(&self) -> usize {
        ROWS
    }

    fn check(row: usize, col: usize) -> Result<()> {
        if row < ROWS && col < COLS {
            Ok(())
        } else {
            Err(BoardError::Index { row, col })
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Cell> {
        Self::check(row, col)?;
        Ok(self.cells[row][col])
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> Result<()> {
        Self::check(row, col)?;
        self.cells[row][col] = cell;
        Ok(())
    }

    /// Clear the cell if it holds anything, otherwise set it to `requested`.
    /// Returns the new state.
    pub fn toggle(&mut self, row: usize, col: usize, requested: Sound) -> Result<Cell> {
        Self::check(row, col)?;
        let cell = &mut self.cells[row][col];
        *cell = if cell.is_on() { Cell::Off } else { requested.cell() };
        Ok(*cell)
    }

    pub fn reset(&mut self) {
        self.cells = [[Cell::Off; COLS]; ROWS];
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, Cell)> + '_ {
        self.cells.iter().enumerate().map(move |(row, cells)| (row, cells[col]))
    }

    /// All cells in row-major order with their coordinates.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().map(move |(col, cell)| (row, col, *cell))
        })
    }

    pub fn count(&self, sound: Sound) -> usize {
        self.cells().filter(|(_, _, c)| c.sound() == Some(sound)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells().all(|(_, _, c)| !c.is_on())
    }

    /// 256 digits, row-major, one state code per cell.
    pub fn serialize(&self) -> String {
        self.cells().map(|(_, _, c)| c.code()).collect()
    }

    pub fn deserialize(text: &str) -> Result<Self> {
        let codes: Vec<char> = text.chars().take(CELL_COUNT).collect();
        if codes.len() < CELL_COUNT {
            return Err(BoardError::Format(format!(
                "expected {} cells, got {}",
                CELL_COUNT,
                codes.len()
            )));
        }

        let mut grid = Grid::new();
        for (i, c) in codes.into_iter().enumerate() {
            let cell = Cell::from_code(c).ok_or_else(|| {
                BoardError::Format(format!("'{}' at position {} is not a digit", c, i))
            })?;
            grid.cells[i / COLS][i % COLS] = cell;
        }
        Ok(grid)
    }

    /// Synth cells as model input, row-major. With `clear_drum_cells` every
    /// drum cell is wiped so the model's drums replace them.
    pub fn extract_synth_notes(&mut self, clear_drum_cells: bool) -> Vec<SequenceNote> {
        let mut notes = Vec::new();
        for (row, cells) in self.cells.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                match *cell {
                    Cell::Synth => {
                        notes.push(SequenceNote::drum(MODEL_DRUM_PITCHES[row], col as u32))
                    }
                    Cell::Drum if clear_drum_cells => *cell = Cell::Off,
                    _ => {}
                }
            }
        }
        notes
    }

    /// Write generated drum notes onto the board. Synth cells are never
    /// overwritten; notes with unknown pitches or out-of-range steps are
    /// dropped. Returns how many cells were written.
    pub fn merge_generated_notes<R: Rng + ?Sized>(
        &mut self,
        notes: &[SequenceNote],
        rng: &mut R,
    ) -> usize {
        let mut written = 0;
        for note in notes {
            let Some(mut row) = pitch_to_row(note.pitch) else {
                debug!(pitch = note.pitch, "skipping note with unknown pitch");
                continue;
            };
            let col = note.start_step as usize;
            if col >= COLS {
                debug!(step = note.start_step, "skipping note past the last column");
                continue;
            }

            // The model mostly answers with base pitches; flip a coin so the
            // mirrored rows get used too.
            if row < PRIMARY_ROWS && rng.gen_bool(0.5) {
                row += PRIMARY_ROWS;
            }

            let cell = &mut self.cells[row][col];
            if *cell != Cell::Synth {
                *cell = Cell::Drum;
                written += 1;
            }
        }
        written
    }
}

/// Inverse of `MODEL_DRUM_PITCHES`; first match wins.
pub fn pitch_to_row(pitch: u8) -> Option<usize> {
    MODEL_DRUM_PITCHES.iter().position(|&p| p == pitch)
}
