//! The document-model surface that note insertion needs from its host.
//!
//! [`NoteHost`] keeps the note logic independent of how sheets, relationships and parts are
//! stored. [`XlsxPackage`] implements it directly on top of the OPC part map.

use crate::a1::{A1ParseError, CellRef};
use crate::content_types::{
    ensure_content_type, ContentTypeEntry, COMMENTS_CONTENT_TYPE, VML_DRAWING_CONTENT_TYPE,
};
use crate::openxml::{
    append_relationship, parse_relationships, rels_part_name, relative_target, resolve_target,
    Relationship,
};
use crate::worksheet::{column_width_px, legacy_drawing_rel_id, set_legacy_drawing};
use crate::{XlsxError, XlsxPackage};

pub trait NoteHost {
    /// Resolve an A1 reference to 0-indexed coordinates.
    fn resolve_cell(&self, cell: &str) -> Result<CellRef, A1ParseError> {
        CellRef::from_a1(cell)
    }

    /// Names of every sheet in workbook order.
    fn sheet_names(&self) -> Result<Vec<String>, XlsxError>;

    /// Rendered width of the 0-indexed column `col` on `sheet`, in pixels.
    fn column_width(&self, sheet: &str, col: u32) -> Result<f64, XlsxError>;

    /// Relationship id of the sheet's `<legacyDrawing>` link, if any.
    fn legacy_drawing_link(&self, sheet: &str) -> Result<Option<String>, XlsxError>;

    /// Point the sheet's `<legacyDrawing>` link at `rel_id`.
    fn set_legacy_drawing_link(&mut self, sheet: &str, rel_id: &str) -> Result<(), XlsxError>;

    /// Add a relationship from the sheet to `target_part` and return its new id.
    fn register_relationship(
        &mut self,
        sheet: &str,
        type_uri: &str,
        target_part: &str,
    ) -> Result<String, XlsxError>;

    /// Part name a sheet relationship points at (`None` for unknown or external ids).
    fn relationship_target(&self, sheet: &str, rel_id: &str) -> Result<Option<String>, XlsxError>;

    /// Part names of every internal sheet relationship of `type_uri`.
    fn related_parts(&self, sheet: &str, type_uri: &str) -> Result<Vec<String>, XlsxError>;

    /// Register content types for a newly created comments part and its VML drawing.
    fn register_comments_content_type(&mut self, comments_part: &str) -> Result<(), XlsxError>;

    fn read_part(&self, name: &str) -> Option<&[u8]>;

    fn write_part(&mut self, name: &str, bytes: Vec<u8>);

    fn count_parts_with_prefix(&self, prefix: &str) -> usize;
}

impl XlsxPackage {
    fn worksheet_xml(&self, sheet: &str) -> Result<(String, &[u8]), XlsxError> {
        let worksheet_part = self.worksheet_part(sheet)?;
        let xml = self
            .part(&worksheet_part)
            .ok_or_else(|| XlsxError::MissingPart(worksheet_part.clone()))?;
        Ok((worksheet_part, xml))
    }

    fn sheet_relationships(&self, sheet: &str) -> Result<(String, Vec<Relationship>), XlsxError> {
        let worksheet_part = self.worksheet_part(sheet)?;
        let rels = match self.part(&rels_part_name(&worksheet_part)) {
            Some(bytes) => parse_relationships(bytes)?,
            None => Vec::new(),
        };
        Ok((worksheet_part, rels))
    }
}

impl NoteHost for XlsxPackage {
    fn sheet_names(&self) -> Result<Vec<String>, XlsxError> {
        Ok(self
            .worksheet_parts()?
            .into_iter()
            .map(|info| info.name)
            .collect())
    }

    fn column_width(&self, sheet: &str, col: u32) -> Result<f64, XlsxError> {
        let (_, xml) = self.worksheet_xml(sheet)?;
        column_width_px(xml, col)
    }

    fn legacy_drawing_link(&self, sheet: &str) -> Result<Option<String>, XlsxError> {
        let (_, xml) = self.worksheet_xml(sheet)?;
        legacy_drawing_rel_id(xml)
    }

    fn set_legacy_drawing_link(&mut self, sheet: &str, rel_id: &str) -> Result<(), XlsxError> {
        let (worksheet_part, xml) = self.worksheet_xml(sheet)?;
        let patched = set_legacy_drawing(xml, rel_id)?;
        self.set_part(worksheet_part, patched);
        Ok(())
    }

    fn register_relationship(
        &mut self,
        sheet: &str,
        type_uri: &str,
        target_part: &str,
    ) -> Result<String, XlsxError> {
        let worksheet_part = self.worksheet_part(sheet)?;
        let rels_name = rels_part_name(&worksheet_part);
        let target = relative_target(&worksheet_part, target_part);
        let (rels_xml, id) = append_relationship(self.part(&rels_name), type_uri, &target)?;
        log::debug!("{rels_name}: registered {id} -> {target}");
        self.set_part(rels_name, rels_xml);
        Ok(id)
    }

    fn relationship_target(&self, sheet: &str, rel_id: &str) -> Result<Option<String>, XlsxError> {
        let (worksheet_part, rels) = self.sheet_relationships(sheet)?;
        Ok(rels
            .iter()
            .find(|rel| rel.id == rel_id && !rel.is_external())
            .map(|rel| resolve_target(&worksheet_part, &rel.target)))
    }

    fn related_parts(&self, sheet: &str, type_uri: &str) -> Result<Vec<String>, XlsxError> {
        let (worksheet_part, rels) = self.sheet_relationships(sheet)?;
        Ok(rels
            .iter()
            .filter(|rel| rel.type_uri == type_uri && !rel.is_external())
            .map(|rel| resolve_target(&worksheet_part, &rel.target))
            .collect())
    }

    fn register_comments_content_type(&mut self, comments_part: &str) -> Result<(), XlsxError> {
        let part_name = format!("/{}", comments_part.trim_start_matches('/'));
        let parts = self.parts_map_mut();
        ensure_content_type(
            parts,
            ContentTypeEntry::Default {
                extension: "vml",
                content_type: VML_DRAWING_CONTENT_TYPE,
            },
        )?;
        ensure_content_type(
            parts,
            ContentTypeEntry::Override {
                part_name: &part_name,
                content_type: COMMENTS_CONTENT_TYPE,
            },
        )
    }

    fn read_part(&self, name: &str) -> Option<&[u8]> {
        self.part(name)
    }

    fn write_part(&mut self, name: &str, bytes: Vec<u8>) {
        self.set_part(name, bytes);
    }

    fn count_parts_with_prefix(&self, prefix: &str) -> usize {
        XlsxPackage::count_parts_with_prefix(self, prefix)
    }
}
