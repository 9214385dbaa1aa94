/// Projects board, ripples and the last strike into per-cell visual tags
use super::playback::Strike;
use super::ripple::RippleField;
use super::{Grid, Sound, COLS, ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellVisual {
    /// The cell's own sound, if it has one.
    pub on: Option<Sound>,
    /// Ripple passing over a silent cell. Always `None` when `on` is set.
    pub ripple: Option<Sound>,
    /// Struck by the current tick.
    pub active: bool,
    /// Silent cell under the time bar.
    pub bar: bool,
}

impl CellVisual {
    pub fn is_plain(&self) -> bool {
        *self == CellVisual::default()
    }

    /// Tag list in paint order, e.g. `["on", "synth", "active"]`.
    pub fn classes(&self) -> Vec<&'static str> {
        let mut classes = Vec::with_capacity(3);
        if let Some(sound) = self.on {
            classes.push("on");
            classes.push(sound.class());
        } else if let Some(sound) = self.ripple {
            classes.push("ripple");
            classes.push(sound.class());
        }
        if self.active {
            classes.push("active");
        }
        if self.bar {
            classes.push("bar");
        }
        if classes.is_empty() {
            classes.push("plain");
        }
        classes
    }

    pub fn label(&self) -> &'static str {
        match self.on {
            None => "cell, empty",
            Some(Sound::Synth) => "cell, synth",
            Some(Sound::Drum) => "cell, drums",
        }
    }
}

pub type Frame = [[CellVisual; COLS]; ROWS];

/// Sound cells are drawn first and hide any ripple under them; ripples only
/// decorate silent neighbours.
pub fn project(grid: &Grid, ripples: &RippleField, strike: Option<&Strike>) -> Frame {
    let mut frame = [[CellVisual::default(); COLS]; ROWS];
    for (row, col, cell) in grid.cells() {
        let visual = &mut frame[row][col];
        visual.on = cell.sound();
        if visual.on.is_none() {
            visual.ripple = ripples.sample_at(row, col);
        }
        if let Some(strike) = strike {
            visual.active = strike.is_active(row, col);
            visual.bar = strike.is_bar(row, col);
        }
    }
    frame
}
