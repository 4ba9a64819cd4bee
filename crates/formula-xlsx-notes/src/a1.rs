use core::fmt;

use thiserror::Error;

/// Maximum number of rows in an Excel worksheet.
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in an Excel worksheet (`XFD`).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// A reference to a single cell within a worksheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is Excel row `1`
/// - `col = 0` is Excel column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render as a relative A1 reference (e.g. `A30`, `BC32`).
    pub fn to_a1(self) -> String {
        let mut out = column_label(self.col);
        out.push_str(&(u64::from(self.row) + 1).to_string());
        out
    }

    /// Parse an A1-style reference, accepting `$` markers and lowercase column letters.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col = column_index(&s[col_start..idx])?;

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let row_1_based: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > EXCEL_MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self::new(row_1_based - 1, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Errors that can occur when parsing an A1 cell reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// Column letters for a 0-indexed column (`0` -> `A`, `26` -> `AA`).
pub fn column_label(col: u32) -> String {
    let mut n = col as u64 + 1;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.iter().rev().map(|&b| b as char).collect()
}

/// 0-indexed column for a run of column letters (`A` -> `0`).
pub fn column_index(label: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col == 0 || col > EXCEL_MAX_COLS {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_absolute_refs() {
        assert_eq!(CellRef::from_a1("A30").unwrap(), CellRef::new(29, 0));
        assert_eq!(CellRef::from_a1("$A$30").unwrap(), CellRef::new(29, 0));
        assert_eq!(CellRef::from_a1("bc32").unwrap(), CellRef::new(31, 54));
        assert_eq!(CellRef::new(31, 54).to_a1(), "BC32");
    }

    #[test]
    fn rejects_malformed_refs() {
        assert_eq!(CellRef::from_a1(""), Err(A1ParseError::Empty));
        assert_eq!(CellRef::from_a1("30"), Err(A1ParseError::MissingColumn));
        assert_eq!(CellRef::from_a1("A"), Err(A1ParseError::MissingRow));
        assert_eq!(CellRef::from_a1("A0"), Err(A1ParseError::InvalidRow));
        assert_eq!(CellRef::from_a1("A1:B2"), Err(A1ParseError::TrailingCharacters));
    }

    #[test]
    fn bounds_are_excel_compatible() {
        assert!(CellRef::from_a1("XFD1048576").is_ok());
        assert_eq!(CellRef::from_a1("XFE1"), Err(A1ParseError::InvalidColumn));
        assert_eq!(CellRef::from_a1("A1048577"), Err(A1ParseError::InvalidRow));
    }

    #[test]
    fn column_labels() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
        assert_eq!(column_label(16_383), "XFD");
        assert_eq!(column_index("xfd").unwrap(), 16_383);
    }

    #[test]
    fn renders_the_last_representable_row() {
        assert_eq!(CellRef::new(u32::MAX, 0).to_a1(), "A4294967296");
    }
}
