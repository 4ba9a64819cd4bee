//! Worksheet XML helpers: the `<legacyDrawing>` link and column widths.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use roxmltree::Document;

use crate::openxml::{local_name, REL_NS};
use crate::XlsxError;

/// Rendered width of a column that has no explicit `<col>` width, in pixels.
pub const DEFAULT_COLUMN_WIDTH_PX: f64 = 64.0;

/// Maximum digit width of the default font (Calibri 11) in pixels.
const MAX_DIGIT_WIDTH_PX: f64 = 7.0;

/// `CT_Worksheet` children that must follow `<legacyDrawing>`.
const AFTER_LEGACY_DRAWING: &[&[u8]] = &[
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// The relationship id referenced by `<legacyDrawing r:id="..."/>`, if the sheet has one.
pub(crate) fn legacy_drawing_rel_id(worksheet_xml: &[u8]) -> Result<Option<String>, XlsxError> {
    let mut reader = Reader::from_reader(worksheet_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.local_name().as_ref() == b"legacyDrawing" {
                    return rel_id_attr(&e);
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == b"legacyDrawing" {
                    return rel_id_attr(&e);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

fn follows_legacy_drawing(local: &[u8]) -> bool {
    AFTER_LEGACY_DRAWING.iter().any(|tag| *tag == local)
}

fn rel_id_attr(e: &BytesStart<'_>) -> Result<Option<String>, XlsxError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key.contains(&b':') && local_name(key) == b"id" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Point the worksheet's `<legacyDrawing>` at `rel_id`, inserting the element at its schema
/// position when the sheet has none yet.
pub(crate) fn set_legacy_drawing(worksheet_xml: &[u8], rel_id: &str) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_reader(worksheet_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(worksheet_xml.len() + 64));
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut skip_depth = 0usize;
    let mut inserted = false;
    let mut legacy_tag = String::from("legacyDrawing");
    let mut rel_attr = String::from("r:id");

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Start(ref e) if depth == 0 => {
                let (root, tag, attr) = worksheet_root(e)?;
                legacy_tag = tag;
                rel_attr = attr;
                writer.write_event(Event::Start(root))?;
                depth = 1;
            }
            Event::Empty(ref e) if depth == 0 => {
                // Degenerate `<worksheet/>`: expand it so the link has a parent.
                let (root, tag, attr) = worksheet_root(e)?;
                let root_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(root))?;
                writer.write_event(Event::Empty(legacy_drawing_element(&tag, &attr, rel_id)))?;
                writer.write_event(Event::End(BytesEnd::new(root_name.as_str())))?;
                inserted = true;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1 && !inserted && e.local_name().as_ref() == b"legacyDrawing" =>
            {
                writer.write_event(Event::Empty(legacy_drawing_element(
                    &legacy_tag,
                    &rel_attr,
                    rel_id,
                )))?;
                inserted = true;
                if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1
                    && !inserted
                    && follows_legacy_drawing(e.local_name().as_ref()) =>
            {
                writer.write_event(Event::Empty(legacy_drawing_element(
                    &legacy_tag,
                    &rel_attr,
                    rel_id,
                )))?;
                inserted = true;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event.borrow())?;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(_) => {
                if depth == 1 && !inserted {
                    writer.write_event(Event::Empty(legacy_drawing_element(
                        &legacy_tag,
                        &rel_attr,
                        rel_id,
                    )))?;
                    inserted = true;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }

        buf.clear();
    }

    if !inserted {
        return Err(XlsxError::Invalid(
            "worksheet part has no root element".to_string(),
        ));
    }

    Ok(writer.into_inner())
}

/// Copy of the worksheet root with the relationships namespace declared, plus the qualified
/// names to use for `<legacyDrawing>` and its `r:id` attribute.
fn worksheet_root(e: &BytesStart<'_>) -> Result<(BytesStart<'static>, String, String), XlsxError> {
    let mut rel_prefix: Option<String> = None;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
            if attr.unescape_value()?.as_ref() == REL_NS {
                rel_prefix = Some(String::from_utf8_lossy(prefix).into_owned());
                break;
            }
        }
    }

    let mut root = e.to_owned().into_owned();
    let rel_prefix = match rel_prefix {
        Some(prefix) => prefix,
        None => {
            root.push_attribute(("xmlns:r", REL_NS));
            "r".to_string()
        }
    };

    let tag = crate::openxml::prefixed_tag(e.name().as_ref(), "legacyDrawing");
    Ok((root, tag, format!("{rel_prefix}:id")))
}

fn legacy_drawing_element<'a>(tag: &'a str, rel_attr: &'a str, rel_id: &'a str) -> BytesStart<'a> {
    let mut el = BytesStart::new(tag);
    el.push_attribute((rel_attr, rel_id));
    el
}

/// Convert a `<col width>` value (character units) to rendered pixels.
pub fn column_width_to_pixels(width: f64) -> f64 {
    let padding = (128.0 / MAX_DIGIT_WIDTH_PX).trunc();
    (((256.0 * width + padding) / 256.0) * MAX_DIGIT_WIDTH_PX).trunc()
}

/// Rendered width in pixels of the 0-indexed column `col`.
///
/// The last matching `<col>` wins, then `<sheetFormatPr defaultColWidth>`, then
/// [`DEFAULT_COLUMN_WIDTH_PX`].
pub(crate) fn column_width_px(worksheet_xml: &[u8], col: u32) -> Result<f64, XlsxError> {
    let xml = std::str::from_utf8(worksheet_xml)
        .map_err(|e| XlsxError::Invalid(format!("worksheet xml not utf-8: {e}")))?;
    let doc = Document::parse(xml)?;
    let col_1_based = col as u64 + 1;

    let mut width = None;
    let mut default_width = None;
    for node in doc.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "col" => {
                let min = node.attribute("min").and_then(|v| v.trim().parse::<u64>().ok());
                let max = node.attribute("max").and_then(|v| v.trim().parse::<u64>().ok());
                let (Some(min), Some(max)) = (min, max) else {
                    continue;
                };
                if !(min..=max).contains(&col_1_based) {
                    continue;
                }
                if let Some(w) = node.attribute("width").and_then(|v| v.trim().parse::<f64>().ok()) {
                    width = Some(w);
                }
            }
            "sheetFormatPr" => {
                default_width = node
                    .attribute("defaultColWidth")
                    .and_then(|v| v.trim().parse::<f64>().ok());
            }
            _ => {}
        }
    }

    Ok(width
        .or(default_width)
        .filter(|w| w.is_finite() && *w >= 0.0)
        .map(column_width_to_pixels)
        .unwrap_or(DEFAULT_COLUMN_WIDTH_PX))
}
