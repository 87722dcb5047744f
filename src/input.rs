//! Key bindings: arrows and vim-style letters.

use crate::session::Intent;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press. Only `Play` reaches the simulation's intent handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play(Intent),
    Start,
    Pause,
    Reset,
    Quit,
    None,
}

/// Map key event to action. Supports both arrows and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Left | KeyCode::Char('h') => Action::Play(Intent::Left),
        KeyCode::Right | KeyCode::Char('l') => Action::Play(Intent::Right),
        KeyCode::Down | KeyCode::Char('j') => Action::Play(Intent::Down),
        KeyCode::Up | KeyCode::Char('k') => Action::Play(Intent::Rotate),
        KeyCode::Enter | KeyCode::Char('s') => Action::Start,
        KeyCode::Char('p') | KeyCode::Char(' ') => Action::Pause,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Reset,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}
