//! Which `comments{id}.xml` / `vmlDrawing{id}.vml` pair a sheet's notes live in.

use crate::host::NoteHost;

use super::error::NoteError;

pub const REL_TYPE_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const REL_TYPE_VML_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing";

const COMMENTS_PART_PREFIX: &str = "xl/comments";
const DRAWING_PART_PREFIX: &str = "xl/drawings/vmlDrawing";

pub fn comments_part_name(id: u32) -> String {
    format!("{COMMENTS_PART_PREFIX}{id}.xml")
}

pub fn drawing_part_name(id: u32) -> String {
    format!("{DRAWING_PART_PREFIX}{id}.vml")
}

/// Numeric id embedded in a `xl/drawings/vmlDrawing{id}.vml` part name.
pub fn parse_drawing_part_id(part_name: &str) -> Option<u32> {
    let name = part_name.trim_start_matches('/');
    let prefix = name.get(..DRAWING_PART_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(DRAWING_PART_PREFIX) {
        return None;
    }
    let rest = &name[DRAWING_PART_PREFIX.len()..];
    let digits = rest
        .strip_suffix(".vml")
        .or_else(|| rest.strip_suffix(".VML"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The part pair a sheet's notes are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePartIds {
    pub id: u32,
    pub comments_part: String,
    pub drawing_part: String,
    /// `true` when the pair was minted (and its relationships registered) by this call.
    pub created: bool,
}

/// Reuse the pair behind the sheet's `<legacyDrawing>` link, or mint a new one and link it.
///
/// Minting registers the drawing and comments relationships and sets the link; those edits
/// are not undone if a later step of the same note insertion fails.
pub fn allocate<H: NoteHost + ?Sized>(host: &mut H, sheet: &str) -> Result<NotePartIds, NoteError> {
    if let Some(existing) = existing_ids(host, sheet)? {
        return Ok(existing);
    }

    let id = mint_id(host);
    let comments_part = comments_part_name(id);
    let drawing_part = drawing_part_name(id);

    let drawing_rel = host.register_relationship(sheet, REL_TYPE_VML_DRAWING, &drawing_part)?;
    host.register_relationship(sheet, REL_TYPE_COMMENTS, &comments_part)?;
    host.set_legacy_drawing_link(sheet, &drawing_rel)?;
    log::debug!("sheet {sheet:?}: minted note parts {comments_part} + {drawing_part}");

    Ok(NotePartIds {
        id,
        comments_part,
        drawing_part,
        created: true,
    })
}

/// The linked drawing plus the sheet's comments part.
///
/// Excel does not keep the two numbers in step (`vmlDrawing2.vml` next to `comments1.xml` is
/// common), so the comments part comes from the sheet's own comments relationship. A drawing
/// that only holds form controls has none; one is registered to the first free
/// `comments{n}.xml` at or after the drawing's id.
fn existing_ids<H: NoteHost + ?Sized>(
    host: &mut H,
    sheet: &str,
) -> Result<Option<NotePartIds>, NoteError> {
    let Some(rel_id) = host.legacy_drawing_link(sheet)? else {
        return Ok(None);
    };
    let drawing_part = host
        .relationship_target(sheet, &rel_id)?
        .ok_or_else(|| NoteError::DanglingLegacyDrawing(rel_id.clone()))?;
    let id = parse_drawing_part_id(&drawing_part)
        .ok_or_else(|| NoteError::MalformedDrawingPartName(drawing_part.clone()))?;

    let linked_comments = host.related_parts(sheet, REL_TYPE_COMMENTS)?.into_iter().next();
    let comments_part = match linked_comments {
        Some(part) => part,
        None => {
            let mut comments_id = id;
            while comments_id < u32::MAX
                && host.read_part(&comments_part_name(comments_id)).is_some()
            {
                comments_id += 1;
            }
            let part = comments_part_name(comments_id);
            host.register_relationship(sheet, REL_TYPE_COMMENTS, &part)?;
            log::debug!("sheet {sheet:?}: linked {part} to existing drawing {drawing_part}");
            part
        }
    };

    Ok(Some(NotePartIds {
        id,
        comments_part,
        drawing_part,
        created: false,
    }))
}

/// One past the number of existing comments parts, bumped past any id whose comments or
/// drawing part name is already in use.
fn mint_id<H: NoteHost + ?Sized>(host: &H) -> u32 {
    let existing = host.count_parts_with_prefix(COMMENTS_PART_PREFIX);
    let mut id = u32::try_from(existing).unwrap_or(u32::MAX).saturating_add(1);
    while id < u32::MAX
        && (host.read_part(&comments_part_name(id)).is_some()
            || host.read_part(&drawing_part_name(id)).is_some())
    {
        id += 1;
    }
    id
}
