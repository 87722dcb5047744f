//! Render seam between the simulation and whatever paints it.

use thiserror::Error;

/// One step of a frame's draw sequence, in the order the session emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Wipe the background of a `width`×`height` board.
    Clear { width: usize, height: usize },
    /// A grid cell; colour 0 is empty.
    GridCell { x: usize, y: usize, color: u8 },
    /// A cell of the falling piece. May sit above the top edge (y < 0).
    PieceCell { x: i32, y: i32, color: u8 },
    Score(u32),
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("render target missing: {0}")]
    Missing(String),
    #[error(
        "render target too small: board needs {need_cols}x{need_rows} cells, have {cols}x{rows}"
    )]
    TooSmall {
        need_cols: u16,
        need_rows: u16,
        cols: u16,
        rows: u16,
    },
}

/// Consumer of frames. Geometry (cell size, offsets) is the sink's business.
pub trait RenderSink {
    /// Checks the target can host a `width`×`height` board.
    fn validate(&self, width: usize, height: usize) -> Result<(), InitError>;

    fn draw(&mut self, commands: &[DrawCommand]);
}

/// Keeps every frame it receives.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub frames: Vec<Vec<DrawCommand>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn last(&self) -> Option<&[DrawCommand]> {
        self.frames.last().map(Vec::as_slice)
    }
}

#[cfg(test)]
impl RenderSink for RecordingSink {
    fn validate(&self, _width: usize, _height: usize) -> Result<(), InitError> {
        Ok(())
    }

    fn draw(&mut self, commands: &[DrawCommand]) {
        self.frames.push(commands.to_vec());
    }
}
