//! Theme loading: `theme[key]="value"` files and hex → ratatui Color.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Colours for every grid colour index plus the board chrome.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Index 0 is an empty cell; 1..=7 are the piece colours.
    pub cells: [Color; 8],
    /// Board background.
    pub bg: Color,
    /// Grid dots and borders.
    pub grid: Color,
    /// Score and help text.
    pub text: Color,
    pub title: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

impl Theme {
    /// Navy board with the classic cyan/yellow/orange/blue/purple/green/red pieces.
    pub fn classic() -> Self {
        Self {
            cells: [
                Color::Rgb(0x0B, 0x0D, 0x2A),
                Color::Rgb(0, 247, 255),
                Color::Rgb(255, 239, 0),
                Color::Rgb(255, 154, 0),
                Color::Rgb(0, 70, 255),
                Color::Rgb(171, 0, 255),
                Color::Rgb(0, 255, 50),
                Color::Rgb(255, 0, 0),
            ],
            bg: Color::Rgb(0x0B, 0x0D, 0x2A),
            grid: Color::Rgb(0x3A, 0x3D, 0x5C),
            text: Color::Rgb(0xFF, 0xFF, 0xFF),
            title: Color::Rgb(0xFF, 0xEF, 0x00),
        }
    }

    /// Load a theme file, then apply `palette`. Falls back to defaults without a path.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))?
            }
            None => Self::classic(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn for_palette(palette: Palette) -> Self {
        let mut t = Self::classic();
        t.apply_palette(palette);
        t
    }

    /// Override piece colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.cells[1..].copy_from_slice(&[
                    Color::Rgb(0x00, 0xFF, 0xFF),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x88, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                ]);
                self.grid = Color::Rgb(0x80, 0x80, 0x80);
            }
            Palette::Colorblind => {
                // Okabe–Ito: no red/green pair carries meaning alone.
                self.cells[1..].copy_from_slice(&[
                    Color::Rgb(0x56, 0xB4, 0xE9),
                    Color::Rgb(0xF0, 0xE4, 0x42),
                    Color::Rgb(0xE6, 0x9F, 0x00),
                    Color::Rgb(0x00, 0x72, 0xB2),
                    Color::Rgb(0xCC, 0x79, 0xA7),
                    Color::Rgb(0x00, 0x9E, 0x73),
                    Color::Rgb(0xD5, 0x5E, 0x00),
                ]);
            }
        }
    }

    /// Keys: `empty`, `piece1`..`piece7`, `bg`, `grid`, `text`, `title`. Missing keys keep defaults.
    fn from_map(map: &HashMap<String, String>) -> Result<Self, ThemeError> {
        let mut theme = Self::classic();
        let get = |key: &str| map.get(key).map(|v| parse_hex(v)).transpose();
        if let Some(c) = get("empty")? {
            theme.cells[0] = c;
        }
        for i in 1..theme.cells.len() {
            if let Some(c) = get(&format!("piece{i}"))? {
                theme.cells[i] = c;
            }
        }
        if let Some(c) = get("bg")? {
            theme.bg = c;
        }
        if let Some(c) = get("grid")? {
            theme.grid = c;
        }
        if let Some(c) = get("text")? {
            theme.text = c;
        }
        if let Some(c) = get("title")? {
            theme.title = c;
        }
        Ok(theme)
    }

    /// Colour for a grid colour index; out-of-range indices wrap onto the pieces.
    #[inline]
    pub fn cell_color(&self, index: u8) -> Color {
        match index {
            0 => self.cells[0],
            i => self.cells[1 + (usize::from(i) - 1) % 7],
        }
    }
}

/// Parse a theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
                let key = stripped[..end].trim();
                let rest = stripped[end + 1..].trim();
                if let Some(eq) = rest.find('=') {
                    let value = rest[eq + 1..]
                        .trim()
                        .trim_matches('"')
                        .trim_matches('\'')
                        .to_string();
                    if !value.is_empty() {
                        map.insert(key.to_string(), value);
                    }
                }
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?),
        3 => (
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        ),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
