//! Legacy cell notes for XLSX packages.
//!
//! A note is stored as two sheet-scoped parts that share a small numeric id:
//! `xl/comments{id}.xml` (authors + comment records) and `xl/drawings/vmlDrawing{id}.vml`
//! (the hidden text-box shape Excel renders on hover). [`XlsxPackage::add_comment`] creates or
//! extends both parts and wires up the worksheet relationships and `<legacyDrawing>` link.
//!
//! ```no_run
//! use formula_xlsx_notes::XlsxPackage;
//!
//! let bytes = std::fs::read("book.xlsx")?;
//! let mut pkg = XlsxPackage::from_bytes(&bytes)?;
//! pkg.add_comment("Sheet1", "A30", r#"{"author":"Excelize: ","text":"This is a comment."}"#)?;
//! std::fs::write("book-noted.xlsx", pkg.write_to_bytes()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod a1;
pub mod comments;
mod content_types;
pub mod host;
mod minimal;
pub mod openxml;
mod package;
mod workbook;
mod worksheet;
mod zip_util;

pub use a1::{A1ParseError, CellRef};
pub use comments::{
    Anchor, AuthorMode, CommentRecord, CommentsFragment, CorruptPartPolicy, DrawingFragment,
    FragmentError, NoteError, NoteFormat, NoteOptions, VmlShape,
};
pub use host::NoteHost;
pub use minimal::new_workbook;
pub use package::{WorksheetPartInfo, XlsxError, XlsxPackage, XlsxPackageLimits};
pub use worksheet::{column_width_to_pixels, DEFAULT_COLUMN_WIDTH_PX};
