//! Open Packaging Convention helpers: `.rels` parsing/patching and relationship target
//! resolution.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::XlsxError;

pub const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }
}

pub fn rels_part_name(part_name: &str) -> String {
    let part_name = part_name.strip_prefix('/').unwrap_or(part_name);
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_name}.rels"),
    }
}

pub fn resolve_target(base_part: &str, target: &str) -> String {
    // Relationship targets are URIs; some producers include a fragment (e.g. `foo.xml#bar`).
    // OPC part names do not include fragments, so strip them before resolving.
    let target = target
        .split_once('#')
        .map(|(base, _)| base)
        .unwrap_or(target);
    if target.is_empty() {
        return base_part
            .strip_prefix('/')
            .unwrap_or(base_part)
            .to_string();
    }

    let (target, is_absolute) = match target.strip_prefix('/') {
        Some(target) => (target, true),
        None => (target, false),
    };
    let base_dir = if is_absolute {
        ""
    } else {
        base_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    };

    let mut components: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(segment),
        }
    }

    components.join("/")
}

/// Relative relationship target from `source_part` to `target_part`
/// (`xl/worksheets/sheet1.xml` -> `xl/comments1.xml` gives `../comments1.xml`).
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let target: Vec<&str> = target_part.split('/').filter(|s| !s.is_empty()).collect();

    let common = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // The file name itself never counts as a shared directory.
    let common = common.min(target.len().saturating_sub(1));

    let mut out: Vec<&str> = Vec::new();
    out.extend(std::iter::repeat("..").take(source_dir.len() - common));
    out.extend(&target[common..]);
    out.join("/")
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                if local_name(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") {
                    let mut id = None;
                    let mut target = None;
                    let mut type_uri = None;
                    let mut target_mode = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"Id") {
                            id = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Target") {
                            target = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Type") {
                            type_uri = Some(value);
                        } else if key.eq_ignore_ascii_case(b"TargetMode") {
                            target_mode = Some(value);
                        }
                    }
                    if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                        relationships.push(Relationship {
                            id,
                            type_uri,
                            target,
                            target_mode,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Pick the next free `rId{n}` (one past the highest numeric `rId` already present).
pub fn next_relationship_id<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let mut max_id = 0u32;
    for id in ids {
        if let Some(rest) = id.strip_prefix("rId") {
            if let Ok(n) = rest.parse::<u32>() {
                max_id = max_id.max(n);
            }
        }
    }
    format!("rId{}", max_id.saturating_add(1))
}

/// Append a `<Relationship>` to an existing `.rels` payload (or create a new one), returning
/// the patched bytes and the id assigned to the new relationship.
///
/// Existing relationships are streamed through untouched.
pub fn append_relationship(
    rels_xml: Option<&[u8]>,
    type_uri: &str,
    target: &str,
) -> Result<(Vec<u8>, String), XlsxError> {
    let Some(existing) = rels_xml else {
        let id = "rId1".to_string();
        return Ok((new_relationships_xml(&id, type_uri, target)?, id));
    };

    let current = parse_relationships(existing)?;
    let id = next_relationship_id(current.iter().map(|rel| rel.id.as_str()));

    let mut reader = Reader::from_reader(existing);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(existing.len() + 256));
    let mut buf = Vec::new();
    let mut inserted = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::End(ref e)
                if !inserted && local_name(e.name().as_ref()) == b"Relationships" =>
            {
                let tag = prefixed_tag(e.name().as_ref(), "Relationship");
                writer.write_event(Event::Empty(relationship_element(&tag, &id, type_uri, target)))?;
                writer.write_event(Event::End(e.to_owned()))?;
                inserted = true;
            }
            Event::Empty(ref e)
                if !inserted && local_name(e.name().as_ref()) == b"Relationships" =>
            {
                // Degenerate `<Relationships/>` root: expand it so the new entry has a parent.
                let root = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let tag = prefixed_tag(root.as_bytes(), "Relationship");
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Empty(relationship_element(&tag, &id, type_uri, target)))?;
                writer.write_event(Event::End(BytesEnd::new(root.as_str())))?;
                inserted = true;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    if !inserted {
        return Err(XlsxError::Invalid(
            "relationships part has no <Relationships> root".to_string(),
        ));
    }

    Ok((writer.into_inner(), id))
}

fn new_relationships_xml(id: &str, type_uri: &str, target: &str) -> Result<Vec<u8>, XlsxError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", PACKAGE_REL_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Empty(relationship_element(
        "Relationship",
        id,
        type_uri,
        target,
    )))?;
    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner())
}

fn relationship_element<'a>(
    tag: &'a str,
    id: &'a str,
    type_uri: &'a str,
    target: &'a str,
) -> BytesStart<'a> {
    let mut el = BytesStart::new(tag);
    el.push_attribute(("Id", id));
    el.push_attribute(("Type", type_uri));
    el.push_attribute(("Target", target));
    el
}

pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Build `prefix:local` using the namespace prefix of `container_name` (if any).
pub(crate) fn prefixed_tag(container_name: &[u8], local: &str) -> String {
    match container_name.iter().position(|&b| b == b':') {
        Some(idx) => {
            let prefix = std::str::from_utf8(&container_name[..idx]).unwrap_or_default();
            format!("{prefix}:{local}")
        }
        None => local.to_string(),
    }
}
