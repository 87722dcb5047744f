//! Blockfall: classic falling-block puzzle game in the terminal.

mod app;
mod game;
mod input;
mod render;
mod scheduler;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

/// Narrowest grid every catalog shape fits in.
pub const MIN_WIDTH: usize = 4;
pub const MIN_HEIGHT: usize = 2;
pub const MAX_DIMENSION: usize = 200;

/// Simulation settings derived from the CLI.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub fall_interval: Duration,
    pub points_per_row: u32,
    pub frame_interval: Duration,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 20,
            fall_interval: Duration::from_millis(500),
            points_per_row: 100,
            frame_interval: Duration::from_secs_f64(1.0 / 60.0),
            seed: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("width must be between {MIN_WIDTH} and {MAX_DIMENSION}, got {0}")]
    Width(usize),
    #[error("height must be between {MIN_HEIGHT} and {MAX_DIMENSION}, got {0}")]
    Height(usize),
    #[error("fall interval must be positive")]
    FallInterval,
    #[error("frame rate must be a positive number, got {0}")]
    FrameRate(f64),
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !(MIN_WIDTH..=MAX_DIMENSION).contains(&args.width) {
            return Err(ConfigError::Width(args.width));
        }
        if !(MIN_HEIGHT..=MAX_DIMENSION).contains(&args.height) {
            return Err(ConfigError::Height(args.height));
        }
        if args.fall_interval_ms == 0 {
            return Err(ConfigError::FallInterval);
        }
        if !(args.frame_rate.is_finite() && args.frame_rate > 0.0) {
            return Err(ConfigError::FrameRate(args.frame_rate));
        }
        // Tiny rates give a period no Duration can hold.
        let frame_interval = Duration::try_from_secs_f64(1.0 / args.frame_rate)
            .map_err(|_| ConfigError::FrameRate(args.frame_rate))?;
        Ok(Self {
            width: args.width,
            height: args.height,
            fall_interval: Duration::from_millis(args.fall_interval_ms),
            points_per_row: args.points_per_row,
            frame_interval,
            seed: args.seed,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.verbose)?;
    let config = GameConfig::from_args(&args).context("invalid options")?;
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "theme not loaded, using defaults");
            theme::Theme::for_palette(args.palette)
        }
    };
    info!(?config, "starting blockfall");
    let mut app = App::new(config, theme, !args.no_autostart)?;
    app.run()?;
    Ok(())
}

/// The TUI owns stdout, so logs go to a file or nowhere.
fn init_logging(path: Option<&Path>, verbose: u8) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();
    info!(%level, "logging initialised");
    Ok(())
}

/// Falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "blockfall",
    version,
    about = "Classic falling-block puzzle in the terminal. Fill complete rows to clear them and score.",
    long_about = "Blockfall is a terminal take on the classic falling-block puzzle.\n\n\
        Steer the falling piece; when it can fall no further it locks into the grid. \
        Complete rows vanish and everything above drops down. The game ends when a new \
        piece has no room to appear.\n\n\
        CONTROLS:\n  Left/Right h/l  Move     Up k      Rotate     Down j   Soft drop\n  \
        Enter s         Start    P Space   Pause      R        Reset      Q Esc  Quit"
)]
pub struct Args {
    /// Grid width in cells.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: usize,

    /// Grid height in cells.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: usize,

    /// Time between gravity steps in ms.
    #[arg(long, default_value = "500", value_name = "MS")]
    pub fall_interval_ms: u64,

    /// Points per cleared row.
    #[arg(long, default_value = "100", value_name = "N")]
    pub points_per_row: u32,

    /// Target frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Seed for the piece randomizer (random when not set).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (theme[key]="#RRGGBB"). Uses the classic palette if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Wait for Enter instead of starting right away.
    #[arg(long)]
    pub no_autostart: bool,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug, -vvv trace). Needs --log-file.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
