//! Text-box geometry for a note shape.
//!
//! Excel positions a note's box with an eight-integer anchor: two corners, each expressed as a
//! cell index plus an offset inside that cell. The box height is estimated from the text
//! length and the column width with a fixed linear model rather than real font metrics.

use core::fmt;

use serde::Serialize;

const WIDTH_DIVISOR: f64 = 5.2264195;
const WIDTH_BIAS: f64 = 0.007;
const CHAR_WIDTH: f64 = 0.15;

pub const LEFT_OFFSET: u32 = 23;
pub const TOP_OFFSET: u32 = 5;
pub const RIGHT_OFFSET: u32 = 23;
pub const BOTTOM_OFFSET: u32 = 5;

/// The two corners of a note's text box in `(cell index, offset)` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Anchor {
    pub left_column: u32,
    pub left_offset: u32,
    pub top_row: u32,
    pub top_offset: u32,
    pub right_column: u32,
    pub right_offset: u32,
    pub bottom_row: u32,
    pub bottom_offset: u32,
}

impl Anchor {
    /// Box whose top-left corner sits in the 0-indexed `(col, row)` cell, one column wide and
    /// tall enough for `author` + `text`.
    pub fn for_note(col: u32, row: u32, column_width_px: f64, author: &str, text: &str) -> Self {
        let span = row_span(chars_per_row(column_width_px), author, text);
        Self {
            left_column: col,
            left_offset: LEFT_OFFSET,
            top_row: row,
            top_offset: TOP_OFFSET,
            right_column: col.saturating_add(1),
            right_offset: RIGHT_OFFSET,
            bottom_row: row.saturating_add(span),
            bottom_offset: BOTTOM_OFFSET,
        }
    }

    /// Parse the `x:Anchor` text form (`"0, 23, 29, 5, 1, 23, 31, 5"`).
    pub fn parse(value: &str) -> Option<Self> {
        let mut fields = [0u32; 8];
        let mut parts = value.split(',');
        for field in &mut fields {
            *field = parts.next()?.trim().parse().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        let [left_column, left_offset, top_row, top_offset, right_column, right_offset, bottom_row, bottom_offset] =
            fields;
        Some(Self {
            left_column,
            left_offset,
            top_row,
            top_offset,
            right_column,
            right_offset,
            bottom_row,
            bottom_offset,
        })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}, {}",
            self.left_column,
            self.left_offset,
            self.top_row,
            self.top_offset,
            self.right_column,
            self.right_offset,
            self.bottom_row,
            self.bottom_offset
        )
    }
}

/// Characters that fit on one row of a box drawn over a column `column_width_px` wide.
///
/// Degenerate widths (zero, negative, NaN) are treated as one character per row.
pub fn chars_per_row(column_width_px: f64) -> f64 {
    let max_char = (column_width_px / WIDTH_DIVISOR - WIDTH_BIAS) / CHAR_WIDTH;
    if max_char.is_finite() && max_char > 0.0 {
        max_char
    } else {
        1.0
    }
}

/// Rows the box spans: each line contributes `len / max_char`, the first line also counting
/// the author label, and the sum is rounded half-up.
pub fn row_span(max_char: f64, author: &str, text: &str) -> u32 {
    let author_len = author.chars().count();
    let height: f64 = text
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let mut len = line.chars().count();
            if idx == 0 {
                len += author_len;
            }
            len as f64 / max_char
        })
        .sum();
    // Float-to-int `as` saturates, so absurd heights clamp to `u32::MAX`.
    (height + 0.5) as u32
}
