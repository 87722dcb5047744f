//! Session: owns the grid, the falling piece, the score and the simulation clock.

use crate::GameConfig;
use crate::game::{self, Grid, Piece, PieceGenerator, TetrominoKind, collides};
use crate::render::{DrawCommand, InitError, RenderSink};
use crate::scheduler::FrameScheduler;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    GameOver,
}

/// Player intents the simulation understands. Everything else stays in the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Left,
    Right,
    Down,
    Rotate,
}

/// Notifications delivered synchronously to the registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    LinesCleared { rows: u32, score: u32 },
    GameOver { score: u32 },
}

type Listener = Box<dyn FnMut(&GameEvent)>;

pub struct Session<S: RenderSink> {
    config: GameConfig,
    grid: Grid,
    piece: Piece,
    score: u32,
    rows_cleared: u32,
    run_state: RunState,
    generator: PieceGenerator,
    scheduler: FrameScheduler,
    /// Time of the last gravity step; `None` until the first frame after start/resume.
    last_gravity: Option<Instant>,
    sink: S,
    listener: Option<Listener>,
}

impl<S: RenderSink> Session<S> {
    /// Binds the session to `sink` and paints the empty board.
    pub fn init(sink: S, config: GameConfig) -> Result<Self, InitError> {
        sink.validate(config.width, config.height)?;
        let mut generator = PieceGenerator::new(config.seed);
        let piece = Piece::spawn(generator.next_kind(), config.width);
        let mut session = Self {
            grid: Grid::new(config.width, config.height),
            piece,
            score: 0,
            rows_cleared: 0,
            run_state: RunState::Idle,
            generator,
            scheduler: FrameScheduler::new(config.frame_interval),
            last_gravity: None,
            sink,
            listener: None,
            config,
        };
        info!(
            width = session.config.width,
            height = session.config.height,
            "session initialised"
        );
        session.redraw();
        Ok(session)
    }

    /// Registers the event listener, replacing any previous one.
    pub fn on_event(&mut self, listener: impl FnMut(&GameEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[cfg(test)]
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn rows_cleared(&self) -> u32 {
        self.rows_cleared
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Resizing goes through here; grid and piece are out of reach.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Idle → Running. From Paused this resumes; GameOver needs a reset first.
    pub fn start(&mut self) {
        match self.run_state {
            RunState::Idle => {
                self.set_run_state(RunState::Running);
                self.last_gravity = None;
                self.scheduler.arm();
            }
            RunState::Paused => self.resume(),
            RunState::Running | RunState::GameOver => {}
        }
    }

    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.scheduler.cancel();
            self.set_run_state(RunState::Paused);
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            // Fresh baseline: a long pause must not turn into a burst of drops.
            self.last_gravity = None;
            self.scheduler.arm();
            self.set_run_state(RunState::Running);
        }
    }

    /// Fresh grid, piece and score; back to Idle from any state.
    pub fn reset(&mut self) {
        self.scheduler.cancel();
        self.grid = Grid::new(self.config.width, self.config.height);
        self.piece = Piece::spawn(self.generator.next_kind(), self.config.width);
        self.score = 0;
        self.rows_cleared = 0;
        self.last_gravity = None;
        self.set_run_state(RunState::Idle);
        self.redraw();
    }

    /// Applies a player intent if the move is legal. Ignored unless running.
    /// Returns whether the piece moved or turned.
    pub fn handle_intent(&mut self, intent: Intent) -> bool {
        if self.run_state != RunState::Running {
            return false;
        }
        match intent {
            Intent::Left => self.try_translate(-1, 0),
            Intent::Right => self.try_translate(1, 0),
            // Soft drop: never locks, leaves the gravity clock alone.
            Intent::Down => self.try_translate(0, 1),
            Intent::Rotate => {
                self.piece.rotate();
                if collides(&self.grid, &self.piece, 0, 0) {
                    for _ in 0..3 {
                        self.piece.rotate();
                    }
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Host hook: runs a frame if the scheduler says one is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.scheduler.poll(now) {
            return false;
        }
        self.frame(now);
        true
    }

    /// How long the host may sleep before the next [`Session::tick`].
    pub fn next_frame_in(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_next(now)
    }

    /// One frame: at most one gravity step, then an unconditional redraw.
    pub fn frame(&mut self, now: Instant) {
        if self.run_state != RunState::Running {
            return;
        }
        let baseline = *self.last_gravity.get_or_insert(now);
        if now.saturating_duration_since(baseline) > self.config.fall_interval {
            self.step_gravity();
            self.last_gravity = Some(now);
        }
        self.redraw();
    }

    /// Frame contents for the current state.
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        let (w, h) = (self.grid.width(), self.grid.height());
        let mut commands = Vec::with_capacity(w * h + 8);
        commands.push(DrawCommand::Clear {
            width: w,
            height: h,
        });
        for (y, row) in self.grid.rows().enumerate() {
            for (x, &color) in row.iter().enumerate() {
                commands.push(DrawCommand::GridCell { x, y, color });
            }
        }
        let color = self.piece.color;
        commands.extend(
            self.piece
                .cells()
                .map(|(x, y)| DrawCommand::PieceCell { x, y, color }),
        );
        commands.push(DrawCommand::Score(self.score));
        commands
    }

    fn redraw(&mut self) {
        let commands = self.draw_commands();
        self.sink.draw(&commands);
    }

    fn try_translate(&mut self, dx: i32, dy: i32) -> bool {
        if collides(&self.grid, &self.piece, dx, dy) {
            return false;
        }
        self.piece.translate(dx, dy);
        true
    }

    fn step_gravity(&mut self) {
        if self.try_translate(0, 1) {
            trace!(y = self.piece.y, "gravity step");
            return;
        }
        game::lock(&mut self.grid, &self.piece);
        debug!(kind = ?self.piece.kind, x = self.piece.x, y = self.piece.y, "piece locked");
        let rows = game::clear_lines(&mut self.grid);
        if rows > 0 {
            self.score = self
                .score
                .saturating_add(rows.saturating_mul(self.config.points_per_row));
            self.rows_cleared += rows;
            debug!(rows, score = self.score, "lines cleared");
            self.emit(GameEvent::LinesCleared {
                rows,
                score: self.score,
            });
        }
        let kind = self.generator.next_kind();
        self.spawn_piece(kind);
    }

    /// Replaces the active piece; a spawn that collides ends the game.
    fn spawn_piece(&mut self, kind: TetrominoKind) {
        self.piece = Piece::spawn(kind, self.config.width);
        if collides(&self.grid, &self.piece, 0, 0) {
            self.scheduler.cancel();
            self.set_run_state(RunState::GameOver);
            info!(score = self.score, "game over");
            self.emit(GameEvent::GameOver { score: self.score });
        }
    }

    fn set_run_state(&mut self, next: RunState) {
        if self.run_state != next {
            info!(from = ?self.run_state, to = ?next, "run state");
            self.run_state = next;
        }
    }

    fn emit(&mut self, event: GameEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EMPTY;
    use crate::render::RecordingSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FALL: Duration = Duration::from_millis(500);

    fn config() -> GameConfig {
        GameConfig {
            seed: Some(5),
            ..GameConfig::default()
        }
    }

    fn running_session() -> (Session<RecordingSink>, Instant) {
        let mut session = Session::init(RecordingSink::default(), config()).unwrap();
        session.start();
        let t0 = Instant::now();
        // First frame only sets the gravity baseline.
        session.frame(t0);
        (session, t0)
    }

    fn events(session: &mut Session<RecordingSink>) -> Rc<RefCell<Vec<GameEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        session.on_event(move |e| sink.borrow_mut().push(*e));
        log
    }

    /// Drives gravity frames until the current piece stops falling. Returns the clock.
    fn drop_until_locked(session: &mut Session<RecordingSink>, mut now: Instant) -> Instant {
        loop {
            let mut fallen = session.piece.clone();
            fallen.translate(0, 1);
            now += FALL + Duration::from_millis(1);
            session.frame(now);
            if session.piece != fallen {
                return now;
            }
        }
    }

    #[test]
    fn init_paints_the_idle_board() {
        let session = Session::init(RecordingSink::default(), config()).unwrap();
        assert_eq!(session.run_state(), RunState::Idle);
        let frame = session.sink().last().unwrap();
        assert_eq!(frame[0], DrawCommand::Clear { width: 10, height: 20 });
        assert_eq!(frame.last(), Some(&DrawCommand::Score(0)));
    }

    #[test]
    fn init_fails_without_a_render_target() {
        struct Detached;
        impl RenderSink for Detached {
            fn validate(&self, _: usize, _: usize) -> Result<(), InitError> {
                Err(InitError::Missing("no surface".into()))
            }
            fn draw(&mut self, _: &[DrawCommand]) {}
        }
        let err = Session::init(Detached, config()).err().unwrap();
        assert!(matches!(err, InitError::Missing(_)));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut session = Session::init(RecordingSink::default(), config()).unwrap();
        session.pause();
        assert_eq!(session.run_state(), RunState::Idle);
        session.start();
        assert_eq!(session.run_state(), RunState::Running);
        session.pause();
        assert_eq!(session.run_state(), RunState::Paused);
        session.resume();
        assert_eq!(session.run_state(), RunState::Running);
        session.pause();
        session.start();
        assert_eq!(session.run_state(), RunState::Running);
        session.reset();
        assert_eq!(session.run_state(), RunState::Idle);
    }

    #[test]
    fn every_frame_redraws_grid_piece_and_score() {
        let (mut session, t0) = running_session();
        let frames_before = session.sink().frames.len();
        session.frame(t0 + Duration::from_millis(16));
        assert_eq!(session.sink().frames.len(), frames_before + 1);

        let frame = session.sink().last().unwrap();
        let grid_cells = frame
            .iter()
            .filter(|c| matches!(c, DrawCommand::GridCell { .. }))
            .count();
        let piece_cells: Vec<_> = frame
            .iter()
            .filter(|c| matches!(c, DrawCommand::PieceCell { .. }))
            .collect();
        assert_eq!(grid_cells, 200);
        assert_eq!(piece_cells.len(), 4);
        assert!(matches!(frame[0], DrawCommand::Clear { .. }));
        assert!(matches!(frame[frame.len() - 1], DrawCommand::Score(_)));
        // Clear, then grid, then piece, then score.
        let first_piece = frame
            .iter()
            .position(|c| matches!(c, DrawCommand::PieceCell { .. }))
            .unwrap();
        assert_eq!(first_piece, 201);
    }

    #[test]
    fn gravity_waits_for_the_fall_interval() {
        let (mut session, t0) = running_session();
        let y0 = session.piece.y;
        session.frame(t0 + FALL);
        assert_eq!(session.piece.y, y0, "exactly one interval is not enough");
        session.frame(t0 + FALL + Duration::from_millis(1));
        assert_eq!(session.piece.y, y0 + 1);
        // One step per frame, then the baseline moves.
        session.frame(t0 + FALL + Duration::from_millis(2));
        assert_eq!(session.piece.y, y0 + 1);
    }

    #[test]
    fn resume_resets_the_gravity_baseline() {
        let (mut session, t0) = running_session();
        let y0 = session.piece.y;
        session.pause();
        let later = t0 + Duration::from_secs(60);
        session.frame(later);
        assert_eq!(session.piece.y, y0, "paused sessions do not step");

        session.resume();
        session.frame(later);
        session.frame(later + Duration::from_millis(100));
        assert_eq!(session.piece.y, y0);
        session.frame(later + FALL + Duration::from_millis(1));
        assert_eq!(session.piece.y, y0 + 1);
    }

    #[test]
    fn tick_follows_the_scheduler() {
        let mut session = Session::init(RecordingSink::default(), config()).unwrap();
        let t0 = Instant::now();
        assert!(!session.tick(t0));
        assert_eq!(session.next_frame_in(t0), None);

        session.start();
        assert!(session.tick(t0));
        assert!(!session.tick(t0 + Duration::from_millis(1)));
        session.pause();
        assert!(!session.tick(t0 + Duration::from_secs(1)));
        session.resume();
        assert!(session.tick(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn intents_are_validated() {
        let (mut session, _) = running_session();
        session.piece = Piece::spawn(TetrominoKind::O, 10);
        session.piece.x = 0;
        assert!(!session.handle_intent(Intent::Left));
        assert_eq!(session.piece.x, 0);
        assert!(session.handle_intent(Intent::Right));
        assert_eq!(session.piece.x, 1);

        session.piece.y = 18;
        assert!(!session.handle_intent(Intent::Down));
        assert_eq!(session.piece.y, 18);
    }

    #[test]
    fn intents_are_ignored_unless_running() {
        let mut session = Session::init(RecordingSink::default(), config()).unwrap();
        let piece = session.piece.clone();
        assert!(!session.handle_intent(Intent::Left));
        assert!(!session.handle_intent(Intent::Rotate));
        assert_eq!(session.piece, piece);
    }

    #[test]
    fn soft_drop_does_not_reset_the_gravity_clock_or_lock() {
        let (mut session, t0) = running_session();
        session.piece = Piece::spawn(TetrominoKind::O, 10);
        session.piece.y = 18;
        assert!(!session.handle_intent(Intent::Down));
        assert_eq!(session.grid.rows().flatten().filter(|&&c| c != EMPTY).count(), 0);

        session.piece.y = 10;
        session.frame(t0 + Duration::from_millis(400));
        assert!(session.handle_intent(Intent::Down));
        session.frame(t0 + FALL + Duration::from_millis(1));
        assert_eq!(session.piece.y, 12, "soft drop plus the scheduled gravity step");
    }

    #[test]
    fn blocked_rotation_is_reverted() {
        let (mut session, _) = running_session();
        session.piece = Piece::spawn(TetrominoKind::I, 10);
        session.piece.y = 19;
        let before = session.piece.clone();
        // Vertical I would poke through the floor.
        assert!(!session.handle_intent(Intent::Rotate));
        assert_eq!(session.piece, before);

        session.piece.y = 5;
        assert!(session.handle_intent(Intent::Rotate));
        assert_eq!(session.piece.shape.height(), 4);
    }

    #[test]
    fn one_flat_and_six_upright_i_pieces_clear_the_bottom_row() {
        let (mut session, mut now) = running_session();
        let log = events(&mut session);
        let points = session.config.points_per_row;

        // Horizontal I at the default x covers columns 3..=6.
        session.piece = Piece::spawn(TetrominoKind::I, 10);
        assert_eq!(session.piece.x, 3);
        now = drop_until_locked(&mut session, now);
        assert_eq!(session.grid.cell(3, 19), TetrominoKind::I.color_index());
        assert_eq!(session.score(), 0);

        // Vertical I pieces close the gaps at columns 0..=2 and 7..=9.
        for column in [0, 1, 2, 7, 8, 9] {
            session.piece = Piece::spawn(TetrominoKind::I, 10);
            session.piece.rotate();
            session.piece.x = column;
            now = drop_until_locked(&mut session, now);
        }

        assert_eq!(session.score(), points);
        assert_eq!(session.rows_cleared(), 1);
        assert_eq!(
            log.borrow().as_slice(),
            &[GameEvent::LinesCleared {
                rows: 1,
                score: points
            }]
        );
        // The three rows above the cleared one slid down intact.
        for y in 17..20 {
            for x in 0..10 {
                let filled = matches!(x, 0..=2 | 7..=9);
                assert_eq!(session.grid.cell(x, y) != EMPTY, filled, "({x}, {y})");
            }
        }
        assert!(!session.grid.is_row_full(19));
    }

    #[test]
    fn score_grows_by_rows_times_points() {
        let (mut session, now) = running_session();
        for y in 16..20 {
            for x in 0..10 {
                if x != 0 {
                    session.grid.set_cell(x, y, 2);
                }
            }
        }
        session.piece = Piece::spawn(TetrominoKind::I, 10);
        session.piece.rotate();
        session.piece.x = 0;
        session.piece.y = 16;

        let _ = drop_until_locked(&mut session, now);

        assert_eq!(session.score(), 4 * session.config.points_per_row);
        assert_eq!(session.rows_cleared(), 4);
    }

    #[test]
    fn spawn_on_occupied_cells_ends_the_game() {
        let (mut session, _) = running_session();
        let log = events(&mut session);
        for x in 3..7 {
            session.grid.set_cell(x, 0, 5);
            session.grid.set_cell(x, 1, 5);
        }
        let before = session.grid.clone();

        session.spawn_piece(TetrominoKind::T);

        assert_eq!(session.run_state(), RunState::GameOver);
        assert_eq!(session.grid, before);
        assert_eq!(log.borrow().as_slice(), &[GameEvent::GameOver { score: 0 }]);
        assert_eq!(session.next_frame_in(Instant::now()), None);
    }

    #[test]
    fn game_over_through_the_loop_halts_stepping() {
        let (mut session, now) = running_session();
        let log = events(&mut session);
        // A stack up to row 1 with a hole per row so nothing clears.
        for y in 1..20 {
            for x in 0..10 {
                if x != y % 10 {
                    session.grid.set_cell(x, y, 1);
                }
            }
        }
        // Locks into row 0 over the centre columns, where every shape spawns.
        session.piece = Piece::spawn(TetrominoKind::I, 10);
        let now = drop_until_locked(&mut session, now);

        assert_eq!(session.run_state(), RunState::GameOver);
        assert!(matches!(log.borrow().last(), Some(GameEvent::GameOver { .. })));

        let grid = session.grid.clone();
        let piece = session.piece.clone();
        session.frame(now + Duration::from_secs(5));
        session.start();
        assert_eq!(session.run_state(), RunState::GameOver);
        assert_eq!(session.grid, grid);
        assert_eq!(session.piece, piece);
    }

    #[test]
    fn fresh_spawn_fits_when_the_top_is_clear() {
        let (mut session, now) = running_session();
        for y in 5..20 {
            for x in 0..9 {
                session.grid.set_cell(x, y, 4);
            }
        }
        session.piece = Piece::spawn(TetrominoKind::O, 10);
        let _ = drop_until_locked(&mut session, now);
        assert_eq!(session.run_state(), RunState::Running);
        assert!(!collides(&session.grid, &session.piece, 0, 0));
    }

    #[test]
    fn reset_restores_a_fresh_idle_session() {
        let (mut session, now) = running_session();
        session.grid.set_cell(0, 19, 3);
        session.score = 700;
        session.rows_cleared = 7;
        session.frame(now + Duration::from_millis(16));

        session.reset();

        assert_eq!(session.run_state(), RunState::Idle);
        assert_eq!(session.score(), 0);
        assert_eq!(session.rows_cleared(), 0);
        assert_eq!(session.grid, Grid::new(10, 20));
        assert_eq!(session.piece.y, 0);
        assert_eq!(session.sink().last().and_then(<[_]>::last), Some(&DrawCommand::Score(0)));
    }
}
