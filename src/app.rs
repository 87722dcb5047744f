//! App: terminal init, host event loop, key dispatch and game-over presentation.

use crate::GameConfig;
use crate::input::{Action, key_to_action};
use crate::session::{GameEvent, RunState, Session};
use crate::theme::Theme;
use crate::ui::{self, Status, TerminalSink};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::{info, warn};

/// Event poll timeout while no frame is scheduled (idle, paused, game over).
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Runs `undo` when `step` failed, then passes the step's result on.
fn undo_on_error<T>(step: io::Result<T>, undo: impl FnOnce() -> io::Result<()>) -> Result<T> {
    if step.is_err() {
        if let Err(e) = undo() {
            warn!(error = %e, "rollback after failed terminal setup");
        }
    }
    Ok(step?)
}

pub struct App {
    session: Session<TerminalSink>,
    theme: Theme,
    /// Final score from the game-over notification, shared with the listener.
    final_score: Rc<Cell<Option<u32>>>,
    game_over_effect: Option<Effect>,
    game_over_process_time: Option<Instant>,
    autostart: bool,
}

impl App {
    /// Fails when no usable terminal is attached.
    pub fn new(config: GameConfig, theme: Theme, autostart: bool) -> Result<Self> {
        let mut session = Session::init(TerminalSink::detect(), config)
            .context("cannot initialise the render target")?;
        let final_score = Rc::new(Cell::new(None));
        let notified = Rc::clone(&final_score);
        session.on_event(move |event| match *event {
            GameEvent::GameOver { score } => {
                info!(score, "game over notification");
                notified.set(Some(score));
            }
            GameEvent::LinesCleared { rows, score } => {
                info!(rows, score, "lines cleared");
            }
        });
        Ok(Self {
            session,
            theme,
            final_score,
            game_over_effect: None,
            game_over_process_time: None,
            autostart,
        })
    }

    fn reset_game(&mut self) {
        self.session.reset();
        self.final_score.set(None);
        self.game_over_effect = None;
        self.game_over_process_time = None;
    }

    fn status(&self) -> Status {
        Status {
            run_state: self.session.run_state(),
            rows_cleared: self.session.rows_cleared(),
            final_score: self.final_score.get(),
        }
    }

    /// Returns `false` when the player asked to quit.
    fn apply_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::Play(intent) => {
                self.session.handle_intent(intent);
            }
            Action::Start => self.session.start(),
            Action::Pause => match self.session.run_state() {
                RunState::Running => self.session.pause(),
                RunState::Paused => self.session.resume(),
                RunState::Idle | RunState::GameOver => {}
            },
            Action::Reset => self.reset_game(),
            Action::None => {}
        }
        true
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        undo_on_error(execute!(stdout, EnterAlternateScreen), disable_raw_mode)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        if self.autostart {
            self.session.start();
        }
        let result = self.run_loop(&mut terminal);

        // Restore
        if let Err(e) = execute!(std::io::stdout(), LeaveAlternateScreen) {
            warn!(error = %e, "failed to leave alternate screen");
        }
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.session.tick(now);

            let status = self.status();
            terminal.draw(|f| {
                ui::draw(
                    f,
                    self.session.sink(),
                    &self.theme,
                    status,
                    &mut self.game_over_effect,
                    &mut self.game_over_process_time,
                    now,
                );
            })?;

            let timeout = self
                .session
                .next_frame_in(Instant::now())
                .unwrap_or(IDLE_POLL);
            if !event::poll(timeout)? {
                continue;
            }
            // Drain everything queued so inputs land before the next frame.
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !self.apply_action(key_to_action(key)) {
                            info!("quit requested");
                            return Ok(());
                        }
                    }
                    Event::Resize(cols, rows) => self.session.sink_mut().resize(cols, rows),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_setup_step_runs_the_undo() {
        let undone = Cell::new(false);
        let failed: io::Result<()> = Err(io::Error::other("no alternate screen"));
        let result = undo_on_error(failed, || {
            undone.set(true);
            Ok(())
        });
        assert!(result.is_err());
        assert!(undone.get());
    }

    #[test]
    fn successful_setup_step_skips_the_undo() {
        let undone = Cell::new(false);
        let result = undo_on_error(Ok(7), || {
            undone.set(true);
            Ok(())
        });
        assert_eq!(result.unwrap(), 7);
        assert!(!undone.get());
    }
}
