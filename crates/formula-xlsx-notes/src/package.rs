use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use thiserror::Error;

use crate::openxml::{parse_relationships, rels_part_name, resolve_target};
use crate::workbook::parse_workbook_sheets;
use crate::zip_util::{
    read_zip_entry_with_budget, ZipInflateBudget, DEFAULT_MAX_ZIP_PART_BYTES,
    DEFAULT_MAX_ZIP_TOTAL_BYTES,
};

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Size limits enforced by [`XlsxPackage::from_bytes_limited`].
#[derive(Debug, Clone, Copy)]
pub struct XlsxPackageLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_ZIP_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_ZIP_TOTAL_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("unknown sheet: {0}")]
    UnknownSheet(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error(
        "xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// Resolved metadata for a workbook sheet and its corresponding worksheet part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPartInfo {
    pub name: String,
    pub rel_id: String,
    /// ZIP entry name for the worksheet XML (e.g. `xl/worksheets/sheet1.xml`).
    pub worksheet_part: String,
}

/// In-memory representation of an XLSX package as a map of part name -> bytes.
///
/// Every note operation is a read-modify-write against this map. Nothing here synchronizes
/// access; hosts that share a package between threads must serialize writers themselves.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut parts = BTreeMap::new();
        let mut budget = ZipInflateBudget::new(limits.max_total_bytes);
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            let declared_size = file.size();
            let buf = read_zip_entry_with_budget(
                &mut file,
                declared_size,
                &name,
                limits.max_part_bytes,
                &mut budget,
            )?;
            parts.insert(name, buf);
        }

        Ok(Self { parts })
    }

    /// Construct a package from an already-inflated part map.
    pub fn from_parts(parts: BTreeMap<String, Vec<u8>>) -> Self {
        Self { parts }
    }

    pub fn into_parts(self) -> BTreeMap<String, Vec<u8>> {
        self.parts
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        if let Some(bytes) = self.parts.get(name) {
            return Some(bytes.as_slice());
        }

        if let Some(stripped) = name.strip_prefix('/') {
            if let Some(bytes) = self.parts.get(stripped) {
                return Some(bytes.as_slice());
            }
        }

        // Fall back to a linear scan for non-canonical producer output (`\` separators, ASCII
        // case differences). Stored names are never rewritten.
        self.parts
            .iter()
            .find(|(key, _)| crate::zip_util::zip_part_names_equivalent(key.as_str(), name))
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Store `bytes` under `name`, replacing an existing entry that differs only in
    /// case/separators so the package never carries two spellings of one part.
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let key = self
            .parts
            .keys()
            .find(|key| key.as_str() != name && crate::zip_util::zip_part_names_equivalent(key, &name))
            .cloned()
            .unwrap_or(name);
        self.parts.insert(key, bytes);
    }

    /// Number of parts whose (canonical) name starts with `prefix`.
    pub fn count_parts_with_prefix(&self, prefix: &str) -> usize {
        let prefix = prefix.trim_start_matches('/');
        self.parts
            .keys()
            .filter(|name| name.trim_start_matches('/').starts_with(prefix))
            .count()
    }

    pub(crate) fn parts_map_mut(&mut self) -> &mut BTreeMap<String, Vec<u8>> {
        &mut self.parts
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), XlsxError> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        let cursor = zip.finish()?;
        w.write_all(&cursor.into_inner())?;
        Ok(())
    }

    /// Return the ordered workbook sheets with their resolved worksheet part paths.
    ///
    /// This reads `xl/workbook.xml` for the `<sheet>` list and `xl/_rels/workbook.xml.rels`
    /// to resolve each sheet's `r:id` relationship to a concrete worksheet XML part name.
    pub fn worksheet_parts(&self) -> Result<Vec<WorksheetPartInfo>, XlsxError> {
        let workbook_xml = self
            .part(WORKBOOK_PART)
            .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
        let sheets = parse_workbook_sheets(workbook_xml)?;

        let rels_name = rels_part_name(WORKBOOK_PART);
        let rels_xml = self
            .part(&rels_name)
            .ok_or_else(|| XlsxError::MissingPart(rels_name.clone()))?;
        let rels = parse_relationships(rels_xml)?;

        let mut out = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            let Some(rel) = rels.iter().find(|rel| rel.id == sheet.rel_id) else {
                log::warn!(
                    "sheet {:?} references missing workbook relationship {}",
                    sheet.name,
                    sheet.rel_id
                );
                continue;
            };
            out.push(WorksheetPartInfo {
                worksheet_part: resolve_target(WORKBOOK_PART, &rel.target),
                name: sheet.name,
                rel_id: sheet.rel_id,
            });
        }

        Ok(out)
    }

    /// Worksheet part name for the sheet called `sheet_name`.
    pub fn worksheet_part(&self, sheet_name: &str) -> Result<String, XlsxError> {
        self.worksheet_parts()?
            .into_iter()
            .find(|info| info.name == sheet_name)
            .map(|info| info.worksheet_part)
            .ok_or_else(|| XlsxError::UnknownSheet(sheet_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn two_sheet_package() -> XlsxPackage {
        crate::minimal::new_workbook(&["Sheet1", "Data"])
    }

    #[test]
    fn worksheet_parts_resolve_through_workbook_rels() {
        let pkg = two_sheet_package();
        let parts = pkg.worksheet_parts().unwrap();
        assert_eq!(
            parts,
            vec![
                WorksheetPartInfo {
                    name: "Sheet1".to_string(),
                    rel_id: "rId1".to_string(),
                    worksheet_part: "xl/worksheets/sheet1.xml".to_string(),
                },
                WorksheetPartInfo {
                    name: "Data".to_string(),
                    rel_id: "rId2".to_string(),
                    worksheet_part: "xl/worksheets/sheet2.xml".to_string(),
                },
            ]
        );
        assert!(matches!(
            pkg.worksheet_part("Missing"),
            Err(XlsxError::UnknownSheet(name)) if name == "Missing"
        ));
    }

    #[test]
    fn zip_round_trip_preserves_parts() {
        let pkg = two_sheet_package();
        let bytes = pkg.write_to_bytes().unwrap();
        let reread = XlsxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(
            reread.part_names().collect::<Vec<_>>(),
            pkg.part_names().collect::<Vec<_>>()
        );
        assert_eq!(reread.part("xl/workbook.xml"), pkg.part("xl/workbook.xml"));
    }

    #[test]
    fn from_bytes_limited_rejects_oversized_parts() {
        let bytes = two_sheet_package().write_to_bytes().unwrap();
        let err = XlsxPackage::from_bytes_limited(
            &bytes,
            XlsxPackageLimits {
                max_part_bytes: 16,
                max_total_bytes: u64::MAX,
            },
        )
        .unwrap_err();
        assert!(matches!(err, XlsxError::PartTooLarge { max: 16, .. }), "{err}");
    }

    #[test]
    fn part_lookup_tolerates_non_canonical_names() {
        let mut pkg = XlsxPackage::default();
        pkg.set_part("XL/Comments1.xml", b"<comments/>".to_vec());
        assert_eq!(pkg.part("/xl/comments1.xml"), Some(&b"<comments/>"[..]));

        pkg.set_part("xl/comments1.xml", b"<comments></comments>".to_vec());
        assert_eq!(pkg.part_names().collect::<Vec<_>>(), vec!["XL/Comments1.xml"]);
    }

    #[test]
    fn count_parts_with_prefix_matches_leading_segment() {
        let mut pkg = XlsxPackage::default();
        pkg.set_part("xl/comments1.xml", Vec::new());
        pkg.set_part("xl/comments2.xml", Vec::new());
        pkg.set_part("xl/threadedComments/threadedComment1.xml", Vec::new());
        assert_eq!(pkg.count_parts_with_prefix("xl/comments"), 2);
        assert_eq!(pkg.count_parts_with_prefix("/xl/comments"), 2);
    }
}
