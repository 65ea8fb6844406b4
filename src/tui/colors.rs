//! Color handling for the board view.

use ratatui::style::Color;

use crate::fields::Priority;

/// Border color for the column currently highlighted as a drop target.
pub const DROP_HIGHLIGHT: Color = Color::Rgb(59, 130, 246);
/// Fallback when a column carries no parseable color.
pub const COLUMN_FALLBACK: Color = Color::Gray;

/// Priority badge colors, matching the web client's palette.
pub fn priority_color(p: Priority) -> Color {
    match p {
        Priority::Low => Color::Rgb(34, 197, 94),
        Priority::Medium => Color::Rgb(234, 179, 8),
        Priority::High => Color::Rgb(249, 115, 22),
        Priority::Critical => Color::Rgb(239, 68, 68),
    }
}

/// Parse a server-side hex color like "#3B82F6" into a terminal color.
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

/// Column color with fallback.
pub fn column_color(s: &str) -> Color {
    parse_hex_color(s).unwrap_or(COLUMN_FALLBACK)
}
