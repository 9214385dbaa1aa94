/// Playback scheduler - walks the board one column per tick
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::ripple::RippleField;
use super::{Grid, Sound, COLS, ROWS};
use crate::audio::SoundOutput;

pub const DEFAULT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    /// Stop requested; the next due tick tears the animation down.
    Stopping,
}

/// Milliseconds between columns. Clones share the same value, so the UI can
/// change the speed while the scheduler is running.
#[derive(Debug, Clone)]
pub struct StepInterval(Arc<AtomicU64>);

impl StepInterval {
    pub fn new(millis: u64) -> Self {
        Self(Arc::new(AtomicU64::new(millis.max(1))))
    }

    pub fn millis(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_millis(&self, millis: u64) {
        self.0.store(millis.max(1), Ordering::Relaxed);
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis())
    }
}

impl Default for StepInterval {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MS)
    }
}

pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: std::cell::Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: std::cell::Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// What the last tick did to its column: `active` rows were struck, the
/// rest show the time bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub column: usize,
    pub active: [bool; ROWS],
}

impl Strike {
    pub fn is_active(&self, row: usize, col: usize) -> bool {
        col == self.column && self.active[row]
    }

    pub fn is_bar(&self, row: usize, col: usize) -> bool {
        col == self.column && !self.active[row]
    }
}

pub struct PlaybackScheduler {
    state: PlaybackState,
    cursor: usize,
    interval: StepInterval,
    next_due: Option<Instant>,
    strike: Option<Strike>,
}

impl PlaybackScheduler {
    pub fn new(interval: StepInterval) -> Self {
        Self {
            state: PlaybackState::Idle,
            cursor: 0,
            interval,
            next_due: None,
            strike: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn interval(&self) -> &StepInterval {
        &self.interval
    }

    /// Column the next tick will strike, while playback is active.
    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            PlaybackState::Idle => None,
            _ => Some(self.cursor),
        }
    }

    pub fn strike(&self) -> Option<&Strike> {
        self.strike.as_ref()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Begin playback from column 0; the first tick fires one interval later.
    /// Starting while a stop is pending cancels the stop.
    /// Start from column 0. Rings left over from a run that was still
    /// stopping are dropped.
    pub fn start(&mut self, now: Instant, ripples: &mut RippleField) {
        if self.state == PlaybackState::Running {
            return;
        }
        info!(interval_ms = self.interval.millis(), "playback started");
        self.state = PlaybackState::Running;
        self.cursor = 0;
        self.strike = None;
        ripples.clear();
        self.next_due = Some(now + self.interval.duration());
    }

    pub fn stop(&mut self) {
        if self.state == PlaybackState::Running {
            info!("playback stopping");
            self.state = PlaybackState::Stopping;
        }
    }

    /// Drop straight to Idle and wipe every animation artifact.
    pub fn cancel(&mut self, ripples: &mut RippleField) {
        self.finish(ripples);
    }

    fn finish(&mut self, ripples: &mut RippleField) {
        if self.state != PlaybackState::Idle {
            info!("playback stopped");
        }
        self.state = PlaybackState::Idle;
        self.cursor = 0;
        self.next_due = None;
        self.strike = None;
        ripples.clear();
    }

    /// Strike the cursor column and move on. Only does anything while Running.
    pub fn tick<S: SoundOutput + ?Sized>(
        &mut self,
        grid: &Grid,
        ripples: &mut RippleField,
        out: &mut S,
    ) -> Option<Strike> {
        if self.state != PlaybackState::Running {
            return None;
        }

        // Older ripples grow first so the ones spawned below start at 0.
        ripples.advance();
        out.begin_column();

        let column = self.cursor;
        let mut strike = Strike {
            column,
            active: [false; ROWS],
        };
        for (row, cell) in grid.column(column) {
            let Some(sound) = cell.sound() else {
                continue;
            };
            match sound {
                Sound::Synth => out.play_synth_note(row),
                Sound::Drum => out.play_drum_note(row),
            }
            ripples.spawn(row, column, sound);
            strike.active[row] = true;
        }

        debug!(column, ripples = ripples.len(), "tick");
        self.cursor = (column + 1) % COLS;
        self.strike = Some(strike);
        Some(strike)
    }

    /// Run the tick that is due, if any. The next deadline is taken from the
    /// clock after the tick has finished, so ticks never overlap. Returns
    /// true when the frame changed and needs repainting.
    pub fn poll<C: Clock + ?Sized, S: SoundOutput + ?Sized>(
        &mut self,
        clock: &C,
        grid: &Grid,
        ripples: &mut RippleField,
        out: &mut S,
    ) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if clock.now() < due {
            return false;
        }

        match self.state {
            PlaybackState::Running => {
                self.tick(grid, ripples, out);
                self.next_due = Some(clock.now() + self.interval.duration());
                true
            }
            PlaybackState::Stopping => {
                self.finish(ripples);
                true
            }
            PlaybackState::Idle => {
                self.next_due = None;
                false
            }
        }
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(StepInterval::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Cell;

    #[derive(Default)]
    struct Recorder {
        synth: Vec<usize>,
        drum: Vec<usize>,
        columns: usize,
    }

    impl SoundOutput for Recorder {
        fn play_synth_note(&mut self, row: usize) {
            self.synth.push(row);
        }
        fn play_drum_note(&mut self, row: usize) {
            self.drum.push(row);
        }
        fn begin_column(&mut self) {
            self.columns += 1;
        }
        fn start_transport(&mut self) {}
        fn pause_transport(&mut self) {}
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_drum_strike_at_cursor() {
        let mut grid = Grid::new();
        grid.set(5, 3, Cell::Drum).unwrap();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::default();
        sched.start(Instant::now(), &mut ripples);

        for _ in 0..3 {
            sched.tick(&grid, &mut ripples, &mut out);
        }
        assert_eq!(sched.cursor(), Some(3));
        assert!(ripples.is_empty());

        let strike = sched.tick(&grid, &mut ripples, &mut out).unwrap();
        assert_eq!(out.drum, vec![5]);
        assert!(out.synth.is_empty());
        assert_eq!(ripples.len(), 1);
        let ripple = ripples.iter().next().unwrap();
        assert_eq!((ripple.x, ripple.y, ripple.distance), (5, 3, 0));
        assert_eq!(ripple.sound, Sound::Drum);
        assert!(strike.is_active(5, 3));
        assert!(strike.is_bar(4, 3));
    }

    #[test]
    fn test_cursor_wraps() {
        let grid = Grid::new();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::default();
        sched.start(Instant::now(), &mut ripples);
        for _ in 0..16 {
            sched.tick(&grid, &mut ripples, &mut out);
        }
        assert_eq!(sched.cursor(), Some(0));
        assert_eq!(sched.strike().unwrap().column, 15);
        assert_eq!(out.columns, 16);
    }

    #[test]
    fn test_tick_ignored_when_idle() {
        let mut grid = Grid::new();
        grid.set(0, 0, Cell::Synth).unwrap();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::default();
        assert!(sched.tick(&grid, &mut ripples, &mut out).is_none());
        assert!(out.synth.is_empty());
        assert_eq!(out.columns, 0);
        assert_eq!(sched.cursor(), None);
    }

    #[test]
    fn test_poll_follows_virtual_clock() {
        let mut grid = Grid::new();
        grid.set(2, 0, Cell::Synth).unwrap();
        let clock = ManualClock::new();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::new(StepInterval::new(100));
        sched.start(clock.now(), &mut ripples);

        assert!(!sched.poll(&clock, &grid, &mut ripples, &mut out));
        clock.advance(ms(99));
        assert!(!sched.poll(&clock, &grid, &mut ripples, &mut out));
        clock.advance(ms(1));
        assert!(sched.poll(&clock, &grid, &mut ripples, &mut out));
        assert_eq!(out.synth, vec![2]);

        // one tick per poll even if the clock jumped far ahead
        clock.advance(ms(1000));
        assert!(sched.poll(&clock, &grid, &mut ripples, &mut out));
        assert!(!sched.poll(&clock, &grid, &mut ripples, &mut out));
        assert_eq!(sched.cursor(), Some(2));
    }

    #[test]
    fn test_interval_change_applies_to_next_tick() {
        let grid = Grid::new();
        let clock = ManualClock::new();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let interval = StepInterval::new(100);
        let mut sched = PlaybackScheduler::new(interval.clone());
        sched.start(clock.now(), &mut ripples);

        // the first deadline was fixed at start
        interval.set_millis(250);
        clock.advance(ms(100));
        assert!(sched.poll(&clock, &grid, &mut ripples, &mut out));
        clock.advance(ms(100));
        assert!(!sched.poll(&clock, &grid, &mut ripples, &mut out));
        clock.advance(ms(150));
        assert!(sched.poll(&clock, &grid, &mut ripples, &mut out));
    }

    #[test]
    fn test_stop_clears_on_next_due_tick() {
        let mut grid = Grid::new();
        grid.set(8, 0, Cell::Drum).unwrap();
        let clock = ManualClock::new();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::new(StepInterval::new(50));
        sched.start(clock.now(), &mut ripples);
        clock.advance(ms(50));
        sched.poll(&clock, &grid, &mut ripples, &mut out);
        assert_eq!(ripples.len(), 1);

        sched.stop();
        assert_eq!(sched.state(), PlaybackState::Stopping);
        assert!(sched.strike().is_some());

        clock.advance(ms(50));
        assert!(sched.poll(&clock, &grid, &mut ripples, &mut out));
        assert_eq!(sched.state(), PlaybackState::Idle);
        assert!(ripples.is_empty());
        assert!(sched.strike().is_none());
        assert_eq!(out.drum, vec![8]);
    }

    #[test]
    fn test_restart_while_stopping() {
        let mut grid = Grid::new();
        grid.set(3, 0, Cell::Synth).unwrap();
        let clock = ManualClock::new();
        let mut ripples = RippleField::new();
        let mut out = Recorder::default();
        let mut sched = PlaybackScheduler::default();
        sched.start(clock.now(), &mut ripples);
        clock.advance(ms(100));
        sched.poll(&clock, &grid, &mut ripples, &mut out);
        sched.stop();
        assert_eq!(ripples.len(), 1);
        sched.start(clock.now(), &mut ripples);
        assert_eq!(sched.state(), PlaybackState::Running);
        assert_eq!(sched.cursor(), Some(0));
        assert!(ripples.is_empty());
        assert!(sched.strike().is_none());
    }

    #[test]
    fn test_cancel_is_immediate() {
        let mut ripples = RippleField::new();
        let mut sched = PlaybackScheduler::default();
        sched.start(Instant::now(), &mut ripples);
        ripples.spawn(0, 0, Sound::Synth);
        sched.cancel(&mut ripples);
        assert_eq!(sched.state(), PlaybackState::Idle);
        assert!(sched.next_due().is_none());
        assert!(ripples.is_empty());
    }
}
