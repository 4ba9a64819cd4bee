use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};

use crate::openxml::{local_name, prefixed_tag};
use crate::XlsxError;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

pub(crate) const VML_DRAWING_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.vmlDrawing";
pub(crate) const COMMENTS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml";

/// A single `[Content_Types].xml` entry that must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentTypeEntry<'a> {
    Default {
        extension: &'a str,
        content_type: &'a str,
    },
    Override {
        part_name: &'a str,
        content_type: &'a str,
    },
}

impl ContentTypeEntry<'_> {
    fn tag(&self) -> &'static str {
        match self {
            ContentTypeEntry::Default { .. } => "Default",
            ContentTypeEntry::Override { .. } => "Override",
        }
    }

    /// Whether an existing `<Default>`/`<Override>` element already satisfies this entry.
    fn matches(&self, e: &BytesStart<'_>) -> Result<bool, XlsxError> {
        let name = e.name();
        if local_name(name.as_ref()) != self.tag().as_bytes() {
            return Ok(false);
        }
        let (key, wanted): (&[u8], &str) = match self {
            ContentTypeEntry::Default { extension, .. } => (b"Extension".as_slice(), *extension),
            ContentTypeEntry::Override { part_name, .. } => (b"PartName".as_slice(), *part_name),
        };
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if local_name(attr.key.as_ref()).eq_ignore_ascii_case(key) {
                let value = attr.unescape_value()?;
                let value = value.trim();
                return Ok(match self {
                    ContentTypeEntry::Default { .. } => value.eq_ignore_ascii_case(wanted),
                    ContentTypeEntry::Override { .. } => {
                        crate::zip_util::zip_part_names_equivalent(value, wanted)
                    }
                });
            }
        }
        Ok(false)
    }

    fn element(&self, tag: &str) -> BytesStart<'static> {
        let mut el = BytesStart::new(tag.to_string());
        match self {
            ContentTypeEntry::Default {
                extension,
                content_type,
            } => {
                el.push_attribute(("Extension", *extension));
                el.push_attribute(("ContentType", *content_type));
            }
            ContentTypeEntry::Override {
                part_name,
                content_type,
            } => {
                el.push_attribute(("PartName", *part_name));
                el.push_attribute(("ContentType", *content_type));
            }
        }
        el
    }
}

/// Make sure `[Content_Types].xml` carries `entry`, inserting it before `</Types>` when absent.
///
/// Packages without a content types part are left alone; we don't synthesize one.
pub(crate) fn ensure_content_type(
    parts: &mut BTreeMap<String, Vec<u8>>,
    entry: ContentTypeEntry<'_>,
) -> Result<(), XlsxError> {
    let ct_key = if parts.contains_key(CONTENT_TYPES_PART) {
        CONTENT_TYPES_PART.to_string()
    } else {
        let Some(found) = parts
            .keys()
            .find(|name| {
                crate::zip_util::zip_part_names_equivalent(name.as_str(), CONTENT_TYPES_PART)
            })
            .cloned()
        else {
            return Ok(());
        };
        found
    };

    let Some(existing) = parts.get(&ct_key).cloned() else {
        return Ok(());
    };

    let mut reader = XmlReader::from_reader(existing.as_slice());
    reader.config_mut().trim_text(false);
    let mut writer = XmlWriter::new(Vec::with_capacity(existing.len() + 160));
    let mut buf = Vec::new();

    let mut found = false;
    let mut changed = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if !found && entry.matches(e)? => {
                found = true;
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"Types" => {
                if !found {
                    let tag = prefixed_tag(e.name().as_ref(), entry.tag());
                    writer.write_event(Event::Empty(entry.element(&tag)))?;
                    found = true;
                    changed = true;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"Types" => {
                // Degenerate case: a self-closing `<Types/>` root. Expand it so we can inject
                // the required entry.
                let types_tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let tag = prefixed_tag(types_tag.as_bytes(), entry.tag());
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Empty(entry.element(&tag)))?;
                writer.write_event(Event::End(BytesEnd::new(types_tag.as_str())))?;
                found = true;
                changed = true;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }

        buf.clear();
    }

    if changed {
        parts.insert(ct_key, writer.into_inner());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

    fn parts_with_ct(ct: &str) -> BTreeMap<String, Vec<u8>> {
        let mut parts = BTreeMap::new();
        parts.insert(CONTENT_TYPES_PART.to_string(), ct.as_bytes().to_vec());
        parts
    }

    fn ct_text(parts: &BTreeMap<String, Vec<u8>>) -> String {
        String::from_utf8(parts[CONTENT_TYPES_PART].clone()).unwrap()
    }

    #[test]
    fn inserts_default_and_override_once() {
        let mut parts = parts_with_ct(CT);
        let vml = ContentTypeEntry::Default {
            extension: "vml",
            content_type: VML_DRAWING_CONTENT_TYPE,
        };
        let comments = ContentTypeEntry::Override {
            part_name: "/xl/comments1.xml",
            content_type: COMMENTS_CONTENT_TYPE,
        };

        for _ in 0..2 {
            ensure_content_type(&mut parts, vml).unwrap();
            ensure_content_type(&mut parts, comments).unwrap();
        }

        let text = ct_text(&parts);
        assert_eq!(text.matches(r#"Extension="vml""#).count(), 1, "{text}");
        assert_eq!(text.matches(r#"PartName="/xl/comments1.xml""#).count(), 1, "{text}");
        assert!(text.trim_end().ends_with("</Types>"));
    }

    #[test]
    fn existing_entries_are_recognized_case_insensitively() {
        let ct = CT.replace(
            "</Types>",
            r#"<Default Extension="VML" ContentType="application/vnd.openxmlformats-officedocument.vmlDrawing"/></Types>"#,
        );
        let mut parts = parts_with_ct(&ct);
        ensure_content_type(
            &mut parts,
            ContentTypeEntry::Default {
                extension: "vml",
                content_type: VML_DRAWING_CONTENT_TYPE,
            },
        )
        .unwrap();
        assert_eq!(ct_text(&parts), ct);
    }

    #[test]
    fn expands_self_closing_types_root() {
        let mut parts = parts_with_ct(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        );
        ensure_content_type(
            &mut parts,
            ContentTypeEntry::Override {
                part_name: "/xl/comments2.xml",
                content_type: COMMENTS_CONTENT_TYPE,
            },
        )
        .unwrap();
        let text = ct_text(&parts);
        assert!(text.contains(r#"<Override PartName="/xl/comments2.xml""#), "{text}");
        assert!(text.ends_with("</Types>"), "{text}");
    }

    #[test]
    fn missing_content_types_part_is_a_no_op() {
        let mut parts = BTreeMap::new();
        ensure_content_type(
            &mut parts,
            ContentTypeEntry::Default {
                extension: "vml",
                content_type: VML_DRAWING_CONTENT_TYPE,
            },
        )
        .unwrap();
        assert!(parts.is_empty());
    }
}
