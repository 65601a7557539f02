//! Terminal display surface
//!
//! Gauges only record what they would show; this module turns those faces
//! into crossterm draw calls on the UI thread.

mod app;
mod digits;
mod surface;

pub use app::run;
pub use digits::{big_digits, GLYPH_HEIGHT, GLYPH_WIDTH};
pub use surface::{bar_line, Surface, TerminalSurface};
