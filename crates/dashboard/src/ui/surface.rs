//! Gauge grid drawn with crossterm

use super::digits::{big_digits, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::gauge::{Gauge, GaugeFace, RenderMode};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};

/// Columns taken by one gauge box
const CELL_WIDTH: u16 = 26;
/// Rows taken by one gauge box, including the gap below it
const CELL_HEIGHT: u16 = 6;
/// Rows reserved for the title line
const HEADER_ROWS: u16 = 2;

/// Where gauge faces end up on screen
pub trait Surface {
    /// Redraw gauges that rendered since the last draw, or all after [`Surface::invalidate`]
    fn draw(&mut self, gauges: &[Gauge]) -> io::Result<()>;

    /// Force the next draw to repaint everything
    fn invalidate(&mut self);
}

/// Render a horizontal bar for `percent`, `width` cells wide.
///
/// The fill is clamped to the bar; the printed number is not.
/// Returns a string like `[████████░░░░] 62%`
pub fn bar_line(percent: f64, width: usize) -> String {
    let filled = ((percent.max(0.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let empty = width - filled;

    format!("[{}{}] {:.0}%", "█".repeat(filled), "░".repeat(empty), percent)
}

/// Top-left corner of gauge `index` in a grid `columns` cells wide
fn cell_origin(index: usize, columns: u16) -> (u16, u16) {
    let columns = columns.max(1) as usize;
    let col = (index % columns) as u16;
    let row = (index / columns) as u16;
    (col * CELL_WIDTH, HEADER_ROWS + row * CELL_HEIGHT)
}

/// [`Surface`] writing escape sequences to any terminal writer
pub struct TerminalSurface<W: Write> {
    out: W,
    title: String,
    columns: u16,
    full_redraw: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, title: impl Into<String>, size: (u16, u16)) -> Self {
        let mut surface = Self {
            out,
            title: title.into(),
            columns: 1,
            full_redraw: true,
        };
        surface.resize(size);
        surface
    }

    /// Adopt a new terminal size and repaint on the next draw
    pub fn resize(&mut self, (cols, _rows): (u16, u16)) {
        self.columns = (cols / CELL_WIDTH).max(1);
        self.full_redraw = true;
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw_header(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            MoveTo(0, 0),
            SetAttribute(Attribute::Bold),
            Print(&self.title),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Color::DarkGrey),
            Print("   q / Esc to quit"),
            SetAttribute(Attribute::Reset),
        )
    }

    fn draw_cell(
        &mut self,
        index: usize,
        label: &str,
        mode: RenderMode,
        face: &GaugeFace,
    ) -> io::Result<()> {
        let (x, y) = cell_origin(index, self.columns);
        let inner = (CELL_WIDTH - 2) as usize;

        let title: String = format!(" {label} ").chars().take(inner).collect();
        let top = format!("┌{}{}┐", title, "─".repeat(inner - title.chars().count()));
        let blank = format!("│{}│", " ".repeat(inner));
        let bottom = format!("└{}┘", "─".repeat(inner));

        queue!(self.out, SetForegroundColor(Color::DarkGrey), MoveTo(x, y), Print(&top))?;
        for row in 1..=GLYPH_HEIGHT as u16 {
            queue!(self.out, MoveTo(x, y + row), Print(&blank))?;
        }
        queue!(self.out, MoveTo(x, y + GLYPH_HEIGHT as u16 + 1), Print(&bottom))?;
        queue!(self.out, SetAttribute(Attribute::Reset), SetForegroundColor(Color::Cyan))?;

        match mode {
            RenderMode::Digits { .. } => {
                let glyph_cols = face.text.chars().count() * GLYPH_WIDTH;
                if glyph_cols <= inner {
                    let pad = ((inner - glyph_cols) / 2) as u16;
                    for (row, line) in big_digits(&face.text).iter().enumerate() {
                        queue!(self.out, MoveTo(x + 1 + pad, y + 1 + row as u16), Print(line))?;
                    }
                } else {
                    let text: String = face.text.chars().take(inner).collect();
                    queue!(self.out, MoveTo(x + 1, y + 2), Print(text))?;
                }
            }
            RenderMode::Bar => {
                // Room for the brackets and a " 100%" suffix
                let width = inner.saturating_sub(8);
                queue!(self.out, MoveTo(x + 1, y + 2), Print(bar_line(face.percent, width)))?;
            }
        }

        queue!(self.out, SetAttribute(Attribute::Reset))
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn draw(&mut self, gauges: &[Gauge]) -> io::Result<()> {
        let full = std::mem::replace(&mut self.full_redraw, false);
        if full {
            queue!(self.out, Clear(ClearType::All))?;
            self.draw_header()?;
        }

        let mut drawn = 0;
        for (index, gauge) in gauges.iter().enumerate() {
            // Always consume the flag so a full redraw leaves nothing pending
            let dirty = gauge.take_dirty();
            if full || dirty {
                self.draw_cell(index, gauge.label(), gauge.mode(), &gauge.face())?;
                drawn += 1;
            }
        }

        if full || drawn > 0 {
            self.out.flush()?;
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.full_redraw = true;
    }
}
