/// Ripples - short-lived rings that spread out from struck cells
use super::Sound;

/// Ripples are dropped once they have grown past this.
pub const MAX_DISTANCE: u32 = 6;
/// Half-width of the ring around the current distance.
pub const RING_WIDTH: f32 = 0.7;
/// Nothing is drawn beyond this radius, however far the ripple has grown.
pub const MAX_RADIUS: f32 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ripple {
    pub x: usize,
    pub y: usize,
    pub distance: u32,
    pub sound: Sound,
}

impl Ripple {
    /// Whether (row, col) sits on this ripple's ring.
    pub fn touches(&self, row: usize, col: usize) -> bool {
        let dx = row as f32 - self.x as f32;
        let dy = col as f32 - self.y as f32;
        let d = (dx * dx + dy * dy).sqrt();
        let r = self.distance as f32;
        d > r - RING_WIDTH && d < r + RING_WIDTH && d < MAX_RADIUS
    }
}

#[derive(Debug, Clone, Default)]
pub struct RippleField {
    ripples: Vec<Ripple>,
}

impl RippleField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, row: usize, col: usize, sound: Sound) {
        self.ripples.push(Ripple {
            x: row,
            y: col,
            distance: 0,
            sound,
        });
    }

    pub fn advance(&mut self) {
        for ripple in &mut self.ripples {
            ripple.distance += 1;
        }
        self.ripples.retain(|r| r.distance <= MAX_DISTANCE);
    }

    /// The sound of the ripple whose ring covers (row, col). When several
    /// overlap, the most recently spawned one wins.
    pub fn sample_at(&self, row: usize, col: usize) -> Option<Sound> {
        self.ripples
            .iter()
            .rev()
            .find(|r| r.touches(row, col))
            .map(|r| r.sound)
    }

    pub fn clear(&mut self) {
        self.ripples.clear();
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter()
    }
}
