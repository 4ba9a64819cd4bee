//! `xl/drawings/vmlDrawing{n}.vml`: the hidden text boxes Excel pops up over noted cells.
//!
//! Shapes read back from an existing part are carried over byte-for-byte, ids included, along
//! with any shape types other than the note type. New note shapes are composed element by
//! element and numbered after the ids already in use.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node};
use serde::Serialize;

use super::anchor::Anchor;
use super::error::FragmentError;
use crate::{CellRef, XlsxError};

const VML_NS: &str = "urn:schemas-microsoft-com:vml";
const OFFICE_NS: &str = "urn:schemas-microsoft-com:office:office";
const EXCEL_NS: &str = "urn:schemas-microsoft-com:office:excel";
const MAC_VML_NS: &str = "http://macVmlSchemaUri";

const NOTE_SHAPE_TYPE: &str = "_x0000_t202";
const NOTE_SHAPE_STYLE: &str =
    "position:absolute;73.5pt;width:108pt;height:59.25pt;z-index:1;visibility:hidden";
const NOTE_FILL_COLOR: &str = "#fbf6d6";
const NOTE_STROKE_COLOR: &str = "#edeaa1";
const NOTE_GRADIENT_COLOR: &str = "#fbfe82";

const SHAPE_ID_PREFIX: &str = "_x0000_s";
/// Each `o:idmap` block reserves 1024 shape ids.
const SHAPE_ID_BLOCK: u64 = 1024;

pub const NOTE_OBJECT_TYPE: &str = "Note";

/// Parsed contents of a sheet's VML drawing part.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawingFragment {
    pub shapes: Vec<VmlShape>,
    /// `o:idmap data` of the part this fragment was read from.
    pub idmap: Option<String>,
    /// Source markup of `v:shapetype` declarations other than the note type (form controls).
    #[serde(skip)]
    extra_shape_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmlShape {
    /// `_x0000_s{n}` id; `None` until the shape is first written.
    pub id: Option<String>,
    pub client_data: Option<ClientData>,
    #[serde(skip)]
    raw_xml: Option<String>,
}

/// The `x:ClientData` block tying a shape to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientData {
    pub object_type: String,
    pub anchor: Option<Anchor>,
    /// 0-indexed row of the annotated cell.
    pub row: Option<u32>,
    /// 0-indexed column of the annotated cell.
    pub column: Option<u32>,
}

impl VmlShape {
    /// A note text box for `cell`, drawn over `anchor`.
    pub fn note(anchor: Anchor, cell: CellRef) -> Self {
        Self {
            id: None,
            client_data: Some(ClientData {
                object_type: NOTE_OBJECT_TYPE.to_string(),
                anchor: Some(anchor),
                row: Some(cell.row),
                column: Some(cell.col),
            }),
            raw_xml: None,
        }
    }

    pub fn is_note(&self) -> bool {
        self.client_data
            .as_ref()
            .is_some_and(|data| data.object_type == NOTE_OBJECT_TYPE)
    }

    /// `<v:shape>` markup carried over from the part this shape was read from.
    pub fn raw_xml(&self) -> Option<&str> {
        self.raw_xml.as_deref()
    }
}

impl DrawingFragment {
    pub fn push_note(&mut self, anchor: Anchor, cell: CellRef) {
        self.shapes.push(VmlShape::note(anchor, cell));
    }

    pub fn note_count(&self) -> usize {
        self.shapes.iter().filter(|shape| shape.is_note()).count()
    }
}

pub fn parse_vml_drawing(bytes: &[u8]) -> Result<DrawingFragment, FragmentError> {
    let xml = std::str::from_utf8(bytes)?;
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "xml" {
        return Err(FragmentError::UnexpectedRoot {
            expected: "xml",
            found: root.tag_name().name().to_string(),
        });
    }

    let shapes = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "shape")
        .map(|shape| VmlShape {
            id: shape.attribute("id").map(str::to_string),
            client_data: first_child_element(shape, "ClientData").map(parse_client_data),
            raw_xml: Some(xml[shape.range()].to_string()),
        })
        .collect();

    let extra_shape_types = root
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == "shapetype"
                && n.attribute("id") != Some(NOTE_SHAPE_TYPE)
        })
        .map(|n| xml[n.range()].to_string())
        .collect();

    let idmap = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "idmap")
        .and_then(|n| n.attribute("data"))
        .map(str::to_string);

    Ok(DrawingFragment {
        shapes,
        idmap,
        extra_shape_types,
    })
}

/// Numeric part of a `_x0000_s{n}` shape id.
fn shape_number(id: &str) -> Option<u64> {
    id.strip_prefix(SHAPE_ID_PREFIX)?.parse().ok()
}

impl DrawingFragment {
    /// `o:idmap data` to write: the value read back, else the part id.
    fn idmap_data(&self, id: u32) -> String {
        self.idmap
            .as_deref()
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .map_or_else(|| id.to_string(), str::to_string)
    }

    /// Ids for every shape in order. Stored ids are kept; new shapes continue after the
    /// highest id already used in the first `o:idmap` block.
    fn shape_ids(&self, id: u32) -> Vec<String> {
        let block = self
            .idmap_data(id)
            .split(',')
            .find_map(|n| n.trim().parse::<u64>().ok())
            .unwrap_or(u64::from(id));
        let base = block.saturating_mul(SHAPE_ID_BLOCK);

        let mut next = self
            .shapes
            .iter()
            .filter_map(|shape| shape.id.as_deref().and_then(shape_number))
            .filter(|n| (base..base.saturating_add(SHAPE_ID_BLOCK)).contains(n))
            .max()
            .unwrap_or(base)
            .saturating_add(1);

        self.shapes
            .iter()
            .map(|shape| match &shape.id {
                Some(existing) => existing.clone(),
                None => {
                    let minted = format!("{SHAPE_ID_PREFIX}{next}");
                    next = next.saturating_add(1);
                    minted
                }
            })
            .collect()
    }
}

fn first_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn parse_client_data(node: Node<'_, '_>) -> ClientData {
    let text_of = |name: &str| {
        first_child_element(node, name)
            .and_then(|n| n.text())
            .map(str::trim)
    };
    ClientData {
        object_type: node.attribute("ObjectType").unwrap_or_default().to_string(),
        anchor: text_of("Anchor").and_then(Anchor::parse),
        row: text_of("Row").and_then(|v| v.parse().ok()),
        column: text_of("Column").and_then(|v| v.parse().ok()),
    }
}

/// Serialize `fragment` as drawing part `id`.
///
/// Shapes read back from a part keep their ids. New shapes are numbered after the highest id
/// in the `o:idmap` block, which defaults to `id` (block `id` spans `1024 * id + 1..`).
pub fn write_vml_drawing(id: u32, fragment: &DrawingFragment) -> Result<Vec<u8>, XlsxError> {
    let mut writer = Writer::new(Vec::new());

    let mut root = BytesStart::new("xml");
    root.push_attribute(("xmlns:v", VML_NS));
    root.push_attribute(("xmlns:o", OFFICE_NS));
    root.push_attribute(("xmlns:x", EXCEL_NS));
    root.push_attribute(("xmlns:mv", MAC_VML_NS));
    writer.write_event(Event::Start(root))?;

    write_shared_declarations(&mut writer, &fragment.idmap_data(id))?;
    for shape_type in &fragment.extra_shape_types {
        writer.get_mut().write_all(shape_type.as_bytes())?;
    }

    let shape_type = format!("#{NOTE_SHAPE_TYPE}");
    for (shape, shape_id) in fragment.shapes.iter().zip(fragment.shape_ids(id)) {
        if let Some(raw) = shape.raw_xml() {
            writer.get_mut().write_all(raw.as_bytes())?;
            continue;
        }

        let mut el = BytesStart::new("v:shape");
        el.push_attribute(("id", shape_id.as_str()));
        el.push_attribute(("type", shape_type.as_str()));
        el.push_attribute(("style", NOTE_SHAPE_STYLE));
        el.push_attribute(("fillcolor", NOTE_FILL_COLOR));
        el.push_attribute(("strokecolor", NOTE_STROKE_COLOR));
        writer.write_event(Event::Start(el))?;
        write_note_body(&mut writer, shape.client_data.as_ref())?;
        writer.write_event(Event::End(BytesEnd::new("v:shape")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("xml")))?;
    Ok(writer.into_inner())
}

fn write_shared_declarations<W: Write>(
    writer: &mut Writer<W>,
    idmap_data: &str,
) -> Result<(), XlsxError> {
    let mut layout = BytesStart::new("o:shapelayout");
    layout.push_attribute(("v:ext", "edit"));
    writer.write_event(Event::Start(layout))?;
    let mut idmap = BytesStart::new("o:idmap");
    idmap.push_attribute(("v:ext", "edit"));
    idmap.push_attribute(("data", idmap_data));
    writer.write_event(Event::Empty(idmap))?;
    writer.write_event(Event::End(BytesEnd::new("o:shapelayout")))?;

    let mut shape_type = BytesStart::new("v:shapetype");
    shape_type.push_attribute(("id", NOTE_SHAPE_TYPE));
    shape_type.push_attribute(("coordsize", "21600,21600"));
    shape_type.push_attribute(("o:spt", "202"));
    shape_type.push_attribute(("path", "m0,0l0,21600,21600,21600,21600,0xe"));
    writer.write_event(Event::Start(shape_type))?;
    let mut stroke = BytesStart::new("v:stroke");
    stroke.push_attribute(("joinstyle", "miter"));
    writer.write_event(Event::Empty(stroke))?;
    let mut path = BytesStart::new("v:path");
    path.push_attribute(("gradientshapeok", "t"));
    path.push_attribute(("o:connecttype", "miter"));
    writer.write_event(Event::Empty(path))?;
    writer.write_event(Event::End(BytesEnd::new("v:shapetype")))?;
    Ok(())
}

fn write_note_body<W: Write>(
    writer: &mut Writer<W>,
    client_data: Option<&ClientData>,
) -> Result<(), XlsxError> {
    let mut fill = BytesStart::new("v:fill");
    fill.push_attribute(("color2", NOTE_GRADIENT_COLOR));
    fill.push_attribute(("angle", "-180"));
    fill.push_attribute(("type", "gradient"));
    writer.write_event(Event::Start(fill))?;
    let mut office_fill = BytesStart::new("o:fill");
    office_fill.push_attribute(("v:ext", "view"));
    office_fill.push_attribute(("type", "gradientUnscaled"));
    writer.write_event(Event::Empty(office_fill))?;
    writer.write_event(Event::End(BytesEnd::new("v:fill")))?;

    let mut shadow = BytesStart::new("v:shadow");
    shadow.push_attribute(("on", "t"));
    shadow.push_attribute(("color", "black"));
    shadow.push_attribute(("obscured", "t"));
    writer.write_event(Event::Empty(shadow))?;

    let mut path = BytesStart::new("v:path");
    path.push_attribute(("o:connecttype", "none"));
    writer.write_event(Event::Empty(path))?;

    let mut textbox = BytesStart::new("v:textbox");
    textbox.push_attribute(("style", "mso-direction-alt:auto"));
    writer.write_event(Event::Start(textbox))?;
    let mut div = BytesStart::new("div");
    div.push_attribute(("style", "text-align:left"));
    writer.write_event(Event::Empty(div))?;
    writer.write_event(Event::End(BytesEnd::new("v:textbox")))?;

    if let Some(data) = client_data {
        write_client_data(writer, data)?;
    }
    Ok(())
}

fn write_client_data<W: Write>(writer: &mut Writer<W>, data: &ClientData) -> Result<(), XlsxError> {
    let mut el = BytesStart::new("x:ClientData");
    el.push_attribute(("ObjectType", data.object_type.as_str()));
    writer.write_event(Event::Start(el))?;
    if let Some(anchor) = data.anchor {
        write_text_element(writer, "x:Anchor", &anchor.to_string())?;
    }
    write_text_element(writer, "x:AutoFill", "True")?;
    if let Some(row) = data.row {
        write_text_element(writer, "x:Row", &row.to_string())?;
    }
    if let Some(column) = data.column {
        write_text_element(writer, "x:Column", &column.to_string())?;
    }
    writer.write_event(Event::End(BytesEnd::new("x:ClientData")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), XlsxError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
