/// Shareable board state: `#<256 digits>&<speed ms>`
use tracing::warn;

use crate::error::{BoardError, Result};
use crate::sequencer::Grid;

/// Written in place of a fragment that failed to load.
pub const INVALID_FRAGMENT: &str = "not-a-valid-pattern-url";

/// Sample boards, in the same format users share.
pub const DEMOS: [&str; 5] = [
    "0000000000000000000000000000000022222000000000000000000000000000000000000000000000000000000000000000000000000000000000002000000000000000000000000000000000000000200020002000200000000000000000000000000000000000000000101000000000000001010101010010000010101010",
    "0000000000000000000000000000000000000000000000000000011001100000000001100110000000020000000020000002000000002000000020000002000000000222222000000000000000000000001000010000000000100000001101100011100100121210001010010001210000101001000010000000000000000000",
    "2222220001001000000000000000000000222222020220220000000000000000000000110000000000001000000000000001000000010000000000000000000000000000000010000010000000000000010000000000000001000000000010000100000000000000000000000000100000000000000000000000010101010000",
    "2202020202202020000020000020200000202002200220220002002000020001200000220021020000010000000000000000000100000000101010101010101000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000&100",
    "0000000000000000000111100000000000000000000000000011111000000000000010000000000000010000010000000010000001000000000000000100000000000000100000000000001100000000000000000010010000000000001001000000000000100100000000000000010000000000000010000000000000000000",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePattern {
    pub grid: Grid,
    /// Milliseconds per column, when the fragment carries one.
    pub speed_ms: Option<u64>,
}

impl SharePattern {
    /// Parse `#<digits>&<speed>`. The leading `#` and the speed are optional.
    pub fn parse(fragment: &str) -> Result<Self> {
        let body = fragment.trim().strip_prefix('#').unwrap_or(fragment.trim());
        let (cells, speed) = match body.split_once('&') {
            Some((cells, speed)) => (cells, Some(speed)),
            None => (body, None),
        };

        let grid = Grid::deserialize(cells)?;
        let speed_ms = match speed.filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<u64>()
                    .ok()
                    .filter(|&ms| ms > 0)
                    .ok_or_else(|| BoardError::Format(format!("bad speed '{}'", s)))?,
            ),
            None => None,
        };
        Ok(Self { grid, speed_ms })
    }

    pub fn to_fragment(&self, default_speed_ms: u64) -> String {
        encode(&self.grid, self.speed_ms.unwrap_or(default_speed_ms))
    }
}

pub fn encode(grid: &Grid, speed_ms: u64) -> String {
    format!("#{}&{}", grid.serialize(), speed_ms)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareLoad {
    /// Nothing to load.
    Empty,
    Loaded(SharePattern),
    /// Malformed fragment; the board stays as it was and the fragment should
    /// be replaced with `INVALID_FRAGMENT`.
    Invalid,
}

/// Load boundary: format errors become `ShareLoad::Invalid` instead of
/// reaching the board.
pub fn load(fragment: &str) -> ShareLoad {
    let trimmed = fragment.trim();
    if trimmed.is_empty() || trimmed == "#" {
        return ShareLoad::Empty;
    }
    match SharePattern::parse(trimmed) {
        Ok(pattern) => ShareLoad::Loaded(pattern),
        Err(err) => {
            warn!("could not load shared pattern: {}", err);
            ShareLoad::Invalid
        }
    }
}

pub fn demo(index: usize) -> Option<SharePattern> {
    DEMOS.get(index).and_then(|d| SharePattern::parse(d).ok())
}
