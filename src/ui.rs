//! Terminal render sink and drawing: board, side panel, idle/pause/game-over overlays.

use crate::game::EMPTY;
use crate::render::{DrawCommand, InitError, RenderSink};
use crate::session::RunState;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

pub const SIDEBAR_WIDTH: u16 = 22;
/// Border columns/rows around the board.
const BORDER: u16 = 2;
/// Duration of the game-over fade (TachyonFX) in ms.
const GAME_OVER_FADE_MS: u32 = 900;

/// Terminal cells needed for a `width`×`height` board at the smallest cell size.
pub fn min_terminal_size(width: usize, height: usize) -> (u16, u16) {
    let w = u16::try_from(width).unwrap_or(u16::MAX);
    let h = u16::try_from(height).unwrap_or(u16::MAX);
    (
        w.saturating_mul(2).saturating_add(BORDER + SIDEBAR_WIDTH),
        h.saturating_add(BORDER),
    )
}

/// Where the board and side panel sit on screen, and how big a grid cell is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub cell_w: u16,
    pub cell_h: u16,
    /// Board including its border.
    pub board: Rect,
    pub sidebar: Rect,
}

impl Geometry {
    /// Largest cell size (4×2, else 2×1) that fits, centred in a `cols`×`rows` terminal.
    pub fn fit(cols: u16, rows: u16, board_w: u16, board_h: u16) -> Self {
        let fits = |cw: u16, ch: u16| {
            board_w.saturating_mul(cw).saturating_add(BORDER + SIDEBAR_WIDTH) <= cols
                && board_h.saturating_mul(ch).saturating_add(BORDER) <= rows
        };
        let (cell_w, cell_h) = if fits(4, 2) { (4, 2) } else { (2, 1) };
        let pw = board_w.saturating_mul(cell_w).saturating_add(BORDER);
        let ph = board_h.saturating_mul(cell_h).saturating_add(BORDER);
        let x = cols.saturating_sub(pw.saturating_add(SIDEBAR_WIDTH)) / 2;
        let y = rows.saturating_sub(ph) / 2;
        let screen = Rect::new(0, 0, cols, rows);
        Self {
            cell_w,
            cell_h,
            board: Rect::new(x, y, pw, ph).intersection(screen),
            sidebar: Rect::new(x.saturating_add(pw), y, SIDEBAR_WIDTH, ph).intersection(screen),
        }
    }

    fn board_inner(&self) -> Rect {
        Rect {
            x: self.board.x + 1,
            y: self.board.y + 1,
            width: self.board.width.saturating_sub(BORDER),
            height: self.board.height.saturating_sub(BORDER),
        }
    }

    /// Screen rect of grid cell (x, y), clipped to the board interior.
    pub fn cell_rect(&self, x: i32, y: i32) -> Option<Rect> {
        if x < 0 || y < 0 {
            return None;
        }
        let inner = self.board_inner();
        let rx = i64::from(inner.x) + i64::from(x) * i64::from(self.cell_w);
        let ry = i64::from(inner.y) + i64::from(y) * i64::from(self.cell_h);
        if rx >= i64::from(inner.right()) || ry >= i64::from(inner.bottom()) {
            return None;
        }
        let rect = Rect::new(rx as u16, ry as u16, self.cell_w, self.cell_h).intersection(inner);
        (!rect.is_empty()).then_some(rect)
    }
}

/// Render sink backed by the terminal. Keeps the latest frame for `draw` to paint.
#[derive(Debug, Clone, Default)]
pub struct TerminalSink {
    size: Option<(u16, u16)>,
    board: (u16, u16),
    commands: Vec<DrawCommand>,
    geometry: Geometry,
}

impl TerminalSink {
    /// Probes the attached terminal. A missing one is reported by `validate`.
    pub fn detect() -> Self {
        Self::with_size(crossterm::terminal::size().ok())
    }

    pub fn with_size(size: Option<(u16, u16)>) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// New terminal size: only the geometry changes.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.size = Some((cols, rows));
        self.relayout();
    }

    fn relayout(&mut self) {
        if let Some((cols, rows)) = self.size {
            self.geometry = Geometry::fit(cols, rows, self.board.0, self.board.1);
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

impl RenderSink for TerminalSink {
    fn validate(&self, width: usize, height: usize) -> Result<(), InitError> {
        let (cols, rows) = self
            .size
            .ok_or_else(|| InitError::Missing("no terminal attached".to_string()))?;
        let (need_cols, need_rows) = min_terminal_size(width, height);
        if cols < need_cols || rows < need_rows {
            return Err(InitError::TooSmall {
                need_cols,
                need_rows,
                cols,
                rows,
            });
        }
        Ok(())
    }

    fn draw(&mut self, commands: &[DrawCommand]) {
        if let Some(&DrawCommand::Clear { width, height }) = commands.first() {
            let board = (
                u16::try_from(width).unwrap_or(u16::MAX),
                u16::try_from(height).unwrap_or(u16::MAX),
            );
            if board != self.board {
                self.board = board;
                self.relayout();
            }
        }
        self.commands.clear();
        self.commands.extend_from_slice(commands);
    }
}

/// Front-end state the side panel and overlays need beyond the frame itself.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub run_state: RunState,
    pub rows_cleared: u32,
    /// Set once the game-over notification has arrived.
    pub final_score: Option<u32>,
}

/// Paint the sink's latest frame plus side panel and overlays.
pub fn draw(
    frame: &mut Frame,
    sink: &TerminalSink,
    theme: &Theme,
    status: Status,
    game_over_effect: &mut Option<Effect>,
    game_over_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    let geometry = sink.geometry();
    let board = geometry.board.intersection(area);
    let mut score = 0;

    for command in sink.commands() {
        match *command {
            DrawCommand::Clear { .. } => {
                Block::default()
                    .style(Style::default().bg(theme.bg))
                    .render(area, frame.buffer_mut());
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.grid).bg(theme.bg))
                    .title(Span::styled(" Blockfall ", Style::default().fg(theme.title)))
                    .render(board, frame.buffer_mut());
            }
            DrawCommand::GridCell { x, y, color } => paint_cell(
                frame.buffer_mut(),
                &geometry,
                i32::try_from(x).unwrap_or(i32::MAX),
                i32::try_from(y).unwrap_or(i32::MAX),
                color,
                theme,
            ),
            DrawCommand::PieceCell { x, y, color } => {
                paint_cell(frame.buffer_mut(), &geometry, x, y, color, theme);
            }
            DrawCommand::Score(s) => score = s,
        }
    }

    draw_sidebar(frame, geometry.sidebar.intersection(area), theme, score, status);

    match status.run_state {
        RunState::Running => {}
        RunState::Idle => draw_banner(
            frame,
            board,
            theme,
            Span::styled(" Ready ", Style::default().fg(Color::Black).bg(theme.title)),
            vec![Line::from(" Enter · Start ")],
        ),
        RunState::Paused => draw_banner(
            frame,
            board,
            theme,
            Span::styled(" Paused ", Style::default().fg(Color::Black).bg(Color::Yellow)),
            vec![Line::from(" P · Resume "), Line::from(" Q · Quit ")],
        ),
        RunState::GameOver => {
            apply_game_over_effect(
                frame,
                board,
                theme,
                game_over_effect,
                game_over_process_time,
                now,
            );
            let final_score = status.final_score.unwrap_or(score);
            draw_banner(
                frame,
                board,
                theme,
                Span::styled(" Game Over ", Style::default().fg(Color::White).bg(Color::Red)),
                vec![
                    Line::from(format!(" Score: {final_score} ")),
                    Line::from(""),
                    Line::from(" R · Reset "),
                    Line::from(" Q · Quit "),
                ],
            );
        }
    }
}

fn paint_cell(buf: &mut Buffer, geometry: &Geometry, x: i32, y: i32, color: u8, theme: &Theme) {
    let Some(rect) = geometry.cell_rect(x, y) else {
        return;
    };
    let empty = color == EMPTY;
    let style = if empty {
        Style::default().fg(theme.grid).bg(theme.cell_color(EMPTY))
    } else {
        Style::default().fg(theme.cell_color(color)).bg(theme.bg)
    };
    for ry in rect.top()..rect.bottom() {
        for rx in rect.left()..rect.right() {
            let symbol = match (empty, rx == rect.left() && ry == rect.top()) {
                (false, _) => "█",
                (true, true) => "·",
                (true, false) => " ",
            };
            if let Some(cell) = buf.cell_mut((rx, ry)) {
                cell.set_symbol(symbol).set_style(style);
            }
        }
    }
}

/// Fade the board toward the grid colour once the game is over (TachyonFX).
fn apply_game_over_effect(
    frame: &mut Frame,
    board: Rect,
    theme: &Theme,
    effect: &mut Option<Effect>,
    process_time: &mut Option<Instant>,
    now: Instant,
) {
    let delta = process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *process_time = Some(now);

    let effect = effect.get_or_insert_with(|| {
        fx::fade_to(theme.grid, theme.bg, (GAME_OVER_FADE_MS, Interpolation::Linear))
            .with_area(board)
    });
    frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
}

fn draw_sidebar(frame: &mut Frame, area: Rect, theme: &Theme, score: u32, status: Status) {
    if area.is_empty() {
        return;
    }
    let title_style = Style::default()
        .fg(theme.title)
        .add_modifier(Modifier::BOLD);
    let fg_style = Style::default().fg(theme.text);
    let state = match status.run_state {
        RunState::Idle => "Ready",
        RunState::Running => "Playing",
        RunState::Paused => "Paused",
        RunState::GameOver => "Game over",
    };
    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("{k:<7}"), Style::default().fg(theme.cell_color(1))),
            Span::styled(what, fg_style),
        ])
    };
    let lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Rows:  ", title_style),
            Span::styled(status.rows_cleared.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("State: ", title_style),
            Span::styled(state, fg_style),
        ]),
        Line::from(""),
        key("← →", "Move"),
        key("↑", "Rotate"),
        key("↓", "Soft drop"),
        key("Enter", "Start"),
        key("P", "Pause"),
        key("R", "Reset"),
        key("Q", "Quit"),
    ];
    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.grid).bg(theme.bg))
                .style(Style::default().bg(theme.bg)),
        )
        .render(area, frame.buffer_mut());
}

fn draw_banner(frame: &mut Frame, board: Rect, theme: &Theme, title: Span<'static>, body: Vec<Line<'static>>) {
    let popup_w = board.width.saturating_sub(2).min(24);
    let popup_h = u16::try_from(body.len() + 4).unwrap_or(u16::MAX).min(board.height);
    let popup = Rect {
        x: board.x + board.width.saturating_sub(popup_w) / 2,
        y: board.y + board.height.saturating_sub(popup_h) / 2,
        width: popup_w,
        height: popup_h,
    };
    if popup.is_empty() {
        return;
    }
    let mut lines = vec![Line::from(""), Line::from(title), Line::from("")];
    lines.extend(body);
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().fg(theme.text).bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.grid).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_prefers_large_cells_when_they_fit() {
        let g = Geometry::fit(200, 60, 10, 20);
        assert_eq!((g.cell_w, g.cell_h), (4, 2));
        assert_eq!(g.board.width, 10 * 4 + 2);
        assert_eq!(g.board.height, 20 * 2 + 2);
        assert_eq!(g.sidebar.x, g.board.right());
    }

    #[test]
    fn geometry_falls_back_to_small_cells() {
        let g = Geometry::fit(80, 24, 10, 20);
        assert_eq!((g.cell_w, g.cell_h), (2, 1));
        assert_eq!(g.board.height, 22);
    }

    #[test]
    fn cell_rects_tile_the_board_interior() {
        let g = Geometry::fit(80, 24, 10, 20);
        let first = g.cell_rect(0, 0).unwrap();
        assert_eq!((first.x, first.y), (g.board.x + 1, g.board.y + 1));
        let last = g.cell_rect(9, 19).unwrap();
        assert_eq!(last.right(), g.board.right() - 1);
        assert_eq!(last.bottom(), g.board.bottom() - 1);
        assert_eq!(g.cell_rect(10, 0), None);
        assert_eq!(g.cell_rect(0, -1), None);
    }

    #[test]
    fn validate_reports_missing_and_small_targets() {
        let detached = TerminalSink::with_size(None);
        assert!(matches!(detached.validate(10, 20), Err(InitError::Missing(_))));

        let tiny = TerminalSink::with_size(Some((30, 10)));
        assert!(matches!(
            tiny.validate(10, 20),
            Err(InitError::TooSmall { need_cols: 44, need_rows: 22, .. })
        ));

        let roomy = TerminalSink::with_size(Some((80, 24)));
        assert!(roomy.validate(10, 20).is_ok());
    }

    #[test]
    fn resize_only_touches_geometry() {
        let mut sink = TerminalSink::with_size(Some((80, 24)));
        let frame = [
            DrawCommand::Clear { width: 10, height: 20 },
            DrawCommand::GridCell { x: 0, y: 0, color: 3 },
            DrawCommand::Score(42),
        ];
        sink.draw(&frame);
        let small = sink.geometry();

        sink.resize(200, 60);

        assert_ne!(sink.geometry(), small);
        assert_eq!(sink.geometry().cell_w, 4);
        assert_eq!(sink.commands(), &frame);
    }
}
