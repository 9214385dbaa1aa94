use std::thread;
use std::time::{Duration, Instant};

use dotboard::bridge::{ContinuationModel, Latent, LatentModel, NoteSequence};
use dotboard::config::ModelFamily;
use dotboard::share::INVALID_FRAGMENT;
use dotboard::{
    Board, BoardError, Cell, Command, ManualClock, ModelBackend, ModelStatus, PlaybackState,
    SequenceNote, Settings, Sound, SoundOutput,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Default)]
struct Recorder {
    synth: Vec<usize>,
    drum: Vec<usize>,
    transport_running: bool,
}

impl SoundOutput for Recorder {
    fn play_synth_note(&mut self, row: usize) {
        self.synth.push(row);
    }
    fn play_drum_note(&mut self, row: usize) {
        self.drum.push(row);
    }
    fn start_transport(&mut self) {
        self.transport_running = true;
    }
    fn pause_transport(&mut self) {
        self.transport_running = false;
    }
}

/// Always answers with a snare on step 4 and a ride on step 9.
struct Snare;

impl ContinuationModel for Snare {
    fn continue_sequence(
        &mut self,
        _: &NoteSequence,
        _: u32,
        _: f32,
    ) -> dotboard::Result<NoteSequence> {
        Ok(NoteSequence::new(vec![
            SequenceNote::drum(38, 4),
            SequenceNote::drum(51, 9),
        ]))
    }
}

fn snare_model(_: ModelFamily) -> dotboard::Result<ModelBackend> {
    Ok(ModelBackend::Continuation(Box::new(Snare)))
}

/// Each family answers on its own row so the test can tell them apart.
struct RowEleven;

impl ContinuationModel for RowEleven {
    fn continue_sequence(
        &mut self,
        _: &NoteSequence,
        _: u32,
        _: f32,
    ) -> dotboard::Result<NoteSequence> {
        Ok(NoteSequence::new(vec![SequenceNote::drum(29, 2)]))
    }
}

struct RowTwelve;

impl LatentModel for RowTwelve {
    fn encode(&mut self, _: &[NoteSequence]) -> dotboard::Result<Latent> {
        Ok(Latent(vec![vec![0.0]]))
    }

    fn decode(&mut self, _: &Latent) -> dotboard::Result<Vec<NoteSequence>> {
        Ok(vec![NoteSequence::new(vec![SequenceNote::drum(47, 2)])])
    }
}

fn per_family_model(family: ModelFamily) -> dotboard::Result<ModelBackend> {
    Ok(match family {
        ModelFamily::Continuation => ModelBackend::Continuation(Box::new(RowEleven)),
        ModelFamily::Latent => ModelBackend::Latent(Box::new(RowTwelve)),
    })
}

fn board() -> Board<Recorder, ManualClock> {
    Board::with_rng(
        Recorder::default(),
        ManualClock::new(),
        Settings::default(),
        StdRng::seed_from_u64(17),
    )
}

fn step(board: &mut Board<Recorder, ManualClock>) -> bool {
    let ms = board.interval().millis();
    board.clock().advance(Duration::from_millis(ms));
    board.poll()
}

fn wait_for(board: &mut Board<Recorder, ManualClock>, status: ModelStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while board.model_status() != status {
        board.poll();
        assert!(Instant::now() < deadline, "timed out waiting for {:?}", status);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn toggling_updates_the_fragment() {
    let mut board = board();
    board.dispatch(Command::Toggle { row: 0, col: 0 }).unwrap();
    assert_eq!(board.fragment(), format!("#1{}&100", "0".repeat(255)));

    board.dispatch(Command::SelectSound(Sound::Drum)).unwrap();
    board.dispatch(Command::Toggle { row: 0, col: 1 }).unwrap();
    assert_eq!(board.grid().get(0, 1).unwrap(), Cell::Drum);

    assert_eq!(
        board.dispatch(Command::Toggle { row: 0, col: 16 }),
        Err(BoardError::Index { row: 0, col: 16 })
    );
}

#[test]
fn playback_strikes_and_ripples() {
    let mut board = board();
    board.dispatch(Command::SelectSound(Sound::Drum)).unwrap();
    board.dispatch(Command::Toggle { row: 5, col: 3 }).unwrap();
    board.dispatch(Command::PlayOrPause).unwrap();
    assert!(board.output().transport_running);

    for _ in 0..4 {
        assert!(step(&mut board));
    }
    assert_eq!(board.output().drum, vec![5]);
    assert_eq!(board.ripples().len(), 1);

    let frame = board.frame();
    assert_eq!(frame[5][3].classes(), vec!["on", "drums", "active"]);
    assert_eq!(frame[4][3].classes(), vec!["bar"]);

    // the ring reaches the neighbours on the next tick
    step(&mut board);
    let frame = board.frame();
    assert_eq!(frame[4][3].ripple, Some(Sound::Drum));
    assert_eq!(frame[5][3].ripple, None);
}

#[test]
fn pause_finishes_on_next_tick() {
    let mut board = board();
    board.dispatch(Command::Toggle { row: 1, col: 0 }).unwrap();
    board.dispatch(Command::PlayOrPause).unwrap();
    step(&mut board);
    assert_eq!(board.output().synth, vec![1]);

    board.dispatch(Command::PlayOrPause).unwrap();
    assert!(!board.output().transport_running);
    assert_eq!(board.scheduler().state(), PlaybackState::Stopping);

    step(&mut board);
    assert_eq!(board.scheduler().state(), PlaybackState::Idle);
    assert!(board.ripples().is_empty());
    assert!(board.frame().iter().flatten().all(|v| !v.active && !v.bar));
    assert_eq!(board.output().synth, vec![1]);
}

#[test]
fn speed_change_reaches_running_scheduler() {
    let mut board = board();
    board.dispatch(Command::PlayOrPause).unwrap();
    board.dispatch(Command::SetSpeed(40)).unwrap();
    assert!(board.fragment().ends_with("&40"));
    assert_eq!(board.settings().step_interval_ms, 40);

    // first deadline was set at the old speed
    board.clock().advance(Duration::from_millis(100));
    assert!(board.poll());
    board.clock().advance(Duration::from_millis(40));
    assert!(board.poll());
    assert_eq!(board.scheduler().cursor(), Some(2));
}

#[test]
fn shared_fragments_load_or_fall_back() {
    let mut board = board();
    let fragment = format!("#2{}&250", "0".repeat(255));
    board.dispatch(Command::LoadFragment(fragment.clone())).unwrap();
    assert_eq!(board.grid().get(0, 0).unwrap(), Cell::Drum);
    assert_eq!(board.interval().millis(), 250);
    assert_eq!(board.fragment(), fragment);

    board.dispatch(Command::LoadFragment("#12x".into())).unwrap();
    assert_eq!(board.fragment(), INVALID_FRAGMENT);
    assert_eq!(board.grid().get(0, 0).unwrap(), Cell::Drum);
}

#[test]
fn demos_and_reset() {
    let mut board = board();
    board.dispatch(Command::LoadDemo(1)).unwrap();
    assert!(!board.grid().is_empty());
    assert!(matches!(board.dispatch(Command::LoadDemo(9)), Err(BoardError::Format(_))));

    board.dispatch(Command::Reset { clear_fragment: true }).unwrap();
    assert!(board.grid().is_empty());
    assert_eq!(board.fragment(), "");
}

#[test]
fn improvise_loads_then_generates() {
    let mut board = board();
    board.set_model_factory(snare_model);
    board.dispatch(Command::Toggle { row: 0, col: 0 }).unwrap();
    board.dispatch(Command::SelectSound(Sound::Drum)).unwrap();
    board.dispatch(Command::Toggle { row: 12, col: 12 }).unwrap();

    // first press only loads
    board.dispatch(Command::Improvise).unwrap();
    assert_eq!(
        board.dispatch(Command::Improvise),
        Err(BoardError::ModelUnavailable)
    );
    wait_for(&mut board, ModelStatus::Ready);

    board.dispatch(Command::Improvise).unwrap();
    // old drums are cleared as soon as the request goes out
    assert_eq!(board.grid().get(12, 12).unwrap(), Cell::Off);
    assert_eq!(
        board.dispatch(Command::Improvise),
        Err(BoardError::GenerationInFlight)
    );
    wait_for(&mut board, ModelStatus::Ready);

    assert_eq!(board.grid().get(0, 0).unwrap(), Cell::Synth);
    let snare = board.grid().get(1, 4).unwrap() == Cell::Drum
        || board.grid().get(8, 4).unwrap() == Cell::Drum;
    assert!(snare);
    assert_eq!(board.grid().get(8, 9).unwrap(), Cell::Drum);
    assert_eq!(board.grid().count(Sound::Drum), 2);
    assert_eq!(&board.fragment()[1..257], board.grid().serialize());
}

#[test]
fn switching_model_while_loading_reloads_the_new_family() {
    let mut board = board();
    board.set_model_factory(per_family_model);

    board.dispatch(Command::Improvise).unwrap();
    assert_eq!(board.model_status(), ModelStatus::Loading);
    board.dispatch(Command::SetModel(ModelFamily::Latent)).unwrap();
    wait_for(&mut board, ModelStatus::Ready);

    board.dispatch(Command::Improvise).unwrap();
    wait_for(&mut board, ModelStatus::Ready);
    assert_eq!(board.settings().model, ModelFamily::Latent);
    assert_eq!(board.grid().get(12, 2).unwrap(), Cell::Drum);
    assert_eq!(board.grid().get(11, 2).unwrap(), Cell::Off);
}

#[test]
fn switching_model_while_generating_reloads_afterwards() {
    let mut board = board();
    board.set_model_factory(per_family_model);
    board.dispatch(Command::Improvise).unwrap();
    wait_for(&mut board, ModelStatus::Ready);

    board.dispatch(Command::Improvise).unwrap();
    board.dispatch(Command::SetModel(ModelFamily::Latent)).unwrap();
    // the round already running still belongs to the old model
    wait_for(&mut board, ModelStatus::Loading);
    assert_eq!(board.grid().get(11, 2).unwrap(), Cell::Drum);
    wait_for(&mut board, ModelStatus::Ready);

    board.dispatch(Command::Improvise).unwrap();
    wait_for(&mut board, ModelStatus::Ready);
    assert_eq!(board.grid().get(12, 2).unwrap(), Cell::Drum);
    assert_eq!(board.grid().get(11, 2).unwrap(), Cell::Off);
}

#[test]
fn restart_while_stopping_drops_old_ripples() {
    let mut board = board();
    board.dispatch(Command::Toggle { row: 2, col: 0 }).unwrap();
    board.dispatch(Command::PlayOrPause).unwrap();
    step(&mut board);
    assert_eq!(board.ripples().len(), 1);

    board.dispatch(Command::PlayOrPause).unwrap();
    board.dispatch(Command::PlayOrPause).unwrap();
    assert_eq!(board.scheduler().state(), PlaybackState::Running);
    assert!(board.ripples().is_empty());
}

#[test]
fn latent_family_without_a_model_stays_unloaded() {
    let mut board = board();
    board.dispatch(Command::SetModel(ModelFamily::Latent)).unwrap();
    board.dispatch(Command::Improvise).unwrap();
    wait_for(&mut board, ModelStatus::NotLoaded);
}
