//! Screen capability.
//!
//! Decoding and blitting JPEG data is left to the device; the control loop
//! only decides where a frame goes and whether the backlight is on.

use crate::jpeg::FrameSize;

/// Screen width in pixels.
pub const SCREEN_WIDTH: u16 = 240;
/// Screen height in pixels.
pub const SCREEN_HEIGHT: u16 = 135;

/// A screen that can draw encoded JPEG frames.
pub trait Display {
    /// Draws `jpeg` with its top-left corner at `(x, y)`. Parts outside the
    /// screen are clipped.
    fn draw_jpeg(&mut self, jpeg: &[u8], x: u16, y: u16);

    /// Turns the screen on or off.
    fn set_power(&mut self, on: bool);
}

/// Top-left corner that centers a frame of `size` on the screen.
///
/// Axes where the frame is at least as large as the screen start at 0.
/// Unknown sizes are drawn at the origin.
pub fn centered_origin(size: Option<FrameSize>) -> (u16, u16) {
    match size {
        Some(size) => (
            SCREEN_WIDTH.saturating_sub(size.width) / 2,
            SCREEN_HEIGHT.saturating_sub(size.height) / 2,
        ),
        None => (0, 0),
    }
}

/// A display that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn draw_jpeg(&mut self, _jpeg: &[u8], _x: u16, _y: u16) {}

    fn set_power(&mut self, _on: bool) {}
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    /// Length of the drawn frame.
    pub len: usize,
    /// Horizontal origin.
    pub x: u16,
    /// Vertical origin.
    pub y: u16,
}

/// A display that remembers what it was asked to do.
#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    draws: Vec<DrawCall>,
    powered: bool,
    power_changes: usize,
}

impl RecordingDisplay {
    /// A powered-on display with no draws.
    pub fn new() -> Self {
        Self {
            draws: Vec::new(),
            powered: true,
            power_changes: 0,
        }
    }

    /// Every draw so far, oldest first.
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Current power state.
    pub fn is_on(&self) -> bool {
        self.powered
    }

    /// Number of `set_power` calls that changed the state.
    pub fn power_changes(&self) -> usize {
        self.power_changes
    }
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordingDisplay {
    fn draw_jpeg(&mut self, jpeg: &[u8], x: u16, y: u16) {
        self.draws.push(DrawCall {
            len: jpeg.len(),
            x,
            y,
        });
    }

    fn set_power(&mut self, on: bool) {
        if self.powered != on {
            self.power_changes += 1;
        }
        self.powered = on;
    }
}
