//! Adding and reading legacy cell notes.
//!
//! A note touches four places in the package:
//! - `xl/comments{id}.xml` gains a record (author label + body),
//! - `xl/drawings/vmlDrawing{id}.vml` gains a hidden text-box shape anchored near the cell,
//! - the worksheet's `.rels` and `<legacyDrawing>` link point at that pair (first note only),
//! - `[Content_Types].xml` learns about both parts.
//!
//! Every function here is a read-modify-write of package parts with no internal locking.

use std::collections::BTreeMap;

use crate::a1::CellRef;
use crate::host::NoteHost;
use crate::XlsxPackage;

mod anchor;
mod error;
mod format;
mod ids;
mod legacy;
mod vml;

pub use anchor::{chars_per_row, row_span, Anchor};
pub use error::{FragmentError, NoteError};
pub use format::{NoteFormat, DEFAULT_AUTHOR, DEFAULT_TEXT, MAX_AUTHOR_CHARS, MAX_TEXT_CHARS};
pub use ids::{
    comments_part_name, drawing_part_name, parse_drawing_part_id, NotePartIds, REL_TYPE_COMMENTS,
    REL_TYPE_VML_DRAWING,
};
pub use legacy::{
    parse_comments_xml, write_comments_xml, CommentRecord, CommentsFragment, RunColor,
    RunProperties, TextRun,
};
pub use vml::{parse_vml_drawing, write_vml_drawing, ClientData, DrawingFragment, VmlShape};

/// How the author table of a comments part evolves as notes are added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorMode {
    /// Each distinct author is listed once and every record points at its own author.
    #[default]
    Distinct,
    /// The table is reset to the latest author on every insert and all records point at it.
    LatestOnly,
}

/// What to do when a sheet's existing comments or drawing part cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptPartPolicy {
    /// Abort with [`NoteError::PartCorruption`] before either part is rewritten.
    #[default]
    Fail,
    /// Log and start the part over, dropping whatever it held.
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteOptions {
    pub authors: AuthorMode,
    pub on_corrupt_part: CorruptPartPolicy,
}

/// Add a note to `cell`, drawing its box one column right of and one row below the cell.
pub fn add_comment<H: NoteHost + ?Sized>(
    host: &mut H,
    sheet: &str,
    cell: &str,
    payload: &str,
) -> Result<(), NoteError> {
    let target = resolve_cell(host, cell)?;
    add_comment_at(
        host,
        sheet,
        cell,
        payload,
        target.col.saturating_add(1),
        target.row.saturating_add(1),
    )
}

/// Add a note to `cell` with the box's top-left corner in the 0-indexed `(col, row)` cell.
pub fn add_comment_at<H: NoteHost + ?Sized>(
    host: &mut H,
    sheet: &str,
    cell: &str,
    payload: &str,
    col: u32,
    row: u32,
) -> Result<(), NoteError> {
    add_comment_at_with_options(host, sheet, cell, payload, col, row, NoteOptions::default())
}

/// [`add_comment_at`] with explicit author and corruption handling.
///
/// On error the package may still carry the relationships and `<legacyDrawing>` link
/// registered for a sheet's first note; neither note part is written unless the whole call
/// succeeds.
pub fn add_comment_at_with_options<H: NoteHost + ?Sized>(
    host: &mut H,
    sheet: &str,
    cell: &str,
    payload: &str,
    col: u32,
    row: u32,
    options: NoteOptions,
) -> Result<(), NoteError> {
    let format = NoteFormat::parse(payload)?;
    let cell_ref = resolve_cell(host, cell)?;

    let column_width = host.column_width(sheet, col)?;
    let anchor = Anchor::for_note(col, row, column_width, format.author(), format.text());

    let ids = ids::allocate(host, sheet)?;

    let mut comments = load_prior(
        host,
        &ids.comments_part,
        options.on_corrupt_part,
        parse_comments_xml,
    )?
    .unwrap_or_default();
    let mut drawing = load_prior(
        host,
        &ids.drawing_part,
        options.on_corrupt_part,
        parse_vml_drawing,
    )?
    .unwrap_or_default();

    comments.push_note(cell_ref, format.author(), format.text(), options.authors);
    drawing.push_note(anchor, cell_ref);

    let comments_xml = write_comments_xml(&comments)?;
    let drawing_xml = write_vml_drawing(ids.id, &drawing)?;
    host.write_part(&ids.comments_part, comments_xml);
    host.write_part(&ids.drawing_part, drawing_xml);
    host.register_comments_content_type(&ids.comments_part)?;

    log::debug!(
        "sheet {sheet:?}: note at {} ({} in {})",
        cell_ref,
        anchor,
        ids.drawing_part
    );
    Ok(())
}

/// Every sheet's parsed comments part, keyed by sheet name.
///
/// Sheets without notes are absent. A comments part that fails to parse is logged and left
/// out rather than failing the whole read.
pub fn comments<H: NoteHost + ?Sized>(
    host: &H,
) -> Result<BTreeMap<String, CommentsFragment>, NoteError> {
    let mut out = BTreeMap::new();
    for sheet in host.sheet_names()? {
        for part in host.related_parts(&sheet, REL_TYPE_COMMENTS)? {
            let Some(bytes) = host.read_part(&part) else {
                continue;
            };
            match parse_comments_xml(bytes) {
                Ok(fragment) => {
                    out.insert(sheet.clone(), fragment);
                    break;
                }
                Err(err) => log::warn!("skipping unreadable comments part {part}: {err}"),
            }
        }
    }
    Ok(out)
}

fn resolve_cell<H: NoteHost + ?Sized>(host: &H, cell: &str) -> Result<CellRef, NoteError> {
    host.resolve_cell(cell)
        .map_err(|source| NoteError::InvalidReference {
            reference: cell.to_string(),
            source,
        })
}

fn load_prior<H, T>(
    host: &H,
    part: &str,
    policy: CorruptPartPolicy,
    parse: impl FnOnce(&[u8]) -> Result<T, FragmentError>,
) -> Result<Option<T>, NoteError>
where
    H: NoteHost + ?Sized,
{
    let Some(bytes) = host.read_part(part) else {
        return Ok(None);
    };
    match parse(bytes) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(source) => match policy {
            CorruptPartPolicy::Fail => {
                log::warn!("refusing to rewrite unreadable note part {part}: {source}");
                Err(NoteError::PartCorruption {
                    part: part.to_string(),
                    source,
                })
            }
            CorruptPartPolicy::Replace => {
                log::warn!("replacing unreadable note part {part}: {source}");
                Ok(None)
            }
        },
    }
}

impl XlsxPackage {
    /// Add a note to `cell` on `sheet` from a JSON payload such as
    /// `{"author":"Excelize: ","text":"This is a comment."}`.
    ///
    /// Author labels longer than 255 characters and text longer than 32512 characters are
    /// truncated.
    pub fn add_comment(&mut self, sheet: &str, cell: &str, payload: &str) -> Result<(), NoteError> {
        add_comment(self, sheet, cell, payload)
    }

    pub fn add_comment_at(
        &mut self,
        sheet: &str,
        cell: &str,
        payload: &str,
        col: u32,
        row: u32,
    ) -> Result<(), NoteError> {
        add_comment_at(self, sheet, cell, payload, col, row)
    }

    pub fn add_comment_at_with_options(
        &mut self,
        sheet: &str,
        cell: &str,
        payload: &str,
        col: u32,
        row: u32,
        options: NoteOptions,
    ) -> Result<(), NoteError> {
        add_comment_at_with_options(self, sheet, cell, payload, col, row, options)
    }

    /// See [`comments`].
    pub fn comments(&self) -> Result<BTreeMap<String, CommentsFragment>, NoteError> {
        comments(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn rejected_payload_leaves_the_package_untouched() {
        let mut pkg = crate::new_workbook(&["Sheet1"]);
        let before = pkg.clone().into_parts();

        let err = pkg.add_comment("Sheet1", "A1", "{not json").unwrap_err();
        assert!(matches!(err, NoteError::PayloadParse(_)), "{err}");
        let err = pkg.add_comment("Sheet1", "1A", "{}").unwrap_err();
        assert!(matches!(err, NoteError::InvalidReference { .. }), "{err}");
        let err = pkg.add_comment("Nope", "A1", "{}").unwrap_err();
        assert!(
            matches!(err, NoteError::Xlsx(crate::XlsxError::UnknownSheet(_))),
            "{err}"
        );

        assert_eq!(pkg.into_parts(), before);
    }

    #[test]
    fn add_comment_anchors_below_and_right_of_the_cell() {
        let mut pkg = crate::new_workbook(&["Sheet1"]);
        pkg.add_comment("Sheet1", "B3", r#"{"text":"hi"}"#).unwrap();

        let drawing = parse_vml_drawing(pkg.part("xl/drawings/vmlDrawing1.vml").unwrap()).unwrap();
        let data = drawing.shapes[0].client_data.clone().unwrap();
        let anchor = data.anchor.unwrap();
        assert_eq!((anchor.left_column, anchor.top_row), (2, 3));
        assert_eq!((data.column, data.row), (Some(1), Some(2)));
    }

    #[test]
    fn cell_references_are_normalized() {
        let mut pkg = crate::new_workbook(&["Sheet1"]);
        pkg.add_comment_at("Sheet1", "$c$7", "{}", 0, 0).unwrap();
        let comments = pkg.comments().unwrap();
        assert_eq!(comments["Sheet1"].comments[0].cell_ref, "C7");
    }
}
