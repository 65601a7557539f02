//! Three-row block digits for digit gauges

/// Columns per glyph
pub const GLYPH_WIDTH: usize = 3;
/// Rows per glyph
pub const GLYPH_HEIGHT: usize = 3;

fn glyph(c: char) -> [&'static str; GLYPH_HEIGHT] {
    match c {
        '0' => ["╭─╮", "│ │", "╰─╯"],
        '1' => ["╶┐ ", " │ ", "╶┴╴"],
        '2' => ["╶─╮", "┌─┘", "╰─╴"],
        '3' => ["╶─╮", " ─┤", "╶─╯"],
        '4' => ["╷ ╷", "╰─┤", "  ╵"],
        '5' => ["╭─╴", "╰─╮", "╶─╯"],
        '6' => ["╭─╴", "├─╮", "╰─╯"],
        '7' => ["╶─┐", "  │", "  ╵"],
        '8' => ["╭─╮", "├─┤", "╰─╯"],
        '9' => ["╭─╮", "╰─┤", "╶─╯"],
        '-' => ["   ", "╶─╴", "   "],
        _ => ["   ", "   ", "   "],
    }
}

/// Render `text` as three lines of block digits
pub fn big_digits(text: &str) -> [String; GLYPH_HEIGHT] {
    let mut rows: [String; GLYPH_HEIGHT] = Default::default();
    for c in text.chars() {
        for (row, part) in rows.iter_mut().zip(glyph(c)) {
            row.push_str(part);
        }
    }
    rows
}
