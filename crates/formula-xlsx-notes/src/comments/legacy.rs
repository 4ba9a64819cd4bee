//! `xl/comments{n}.xml`: the author table and per-cell note records.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node};
use serde::Serialize;

use super::error::FragmentError;
use super::AuthorMode;
use crate::{CellRef, XlsxError};

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const NOTE_FONT: &str = "Calibri";
const NOTE_FONT_SIZE: f64 = 9.0;
const NOTE_FONT_FAMILY: u32 = 2;
/// "System foreground" in the legacy indexed palette.
const NOTE_COLOR_INDEXED: u32 = 81;

/// Parsed contents of a sheet's comments part.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentsFragment {
    pub authors: Vec<String>,
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    /// A1 reference of the annotated cell, as stored in the part.
    pub cell_ref: String,
    /// Index into [`CommentsFragment::authors`].
    pub author_id: u32,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub properties: Option<RunProperties>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunProperties {
    pub bold: bool,
    pub italic: bool,
    pub size: Option<f64>,
    pub color: Option<RunColor>,
    pub font: Option<String>,
    pub family: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunColor {
    Indexed(u32),
    Rgb(String),
    Theme(u32),
}

impl RunProperties {
    fn note(bold: bool) -> Self {
        Self {
            bold,
            size: Some(NOTE_FONT_SIZE),
            color: Some(RunColor::Indexed(NOTE_COLOR_INDEXED)),
            font: Some(NOTE_FONT.to_string()),
            family: Some(NOTE_FONT_FAMILY),
            ..Self::default()
        }
    }
}

impl CommentRecord {
    /// A note in Excel's default style: the author label in bold, then the body.
    pub fn note(cell: CellRef, author_id: u32, author: &str, text: &str) -> Self {
        Self {
            cell_ref: cell.to_a1(),
            author_id,
            runs: vec![
                TextRun {
                    properties: Some(RunProperties::note(true)),
                    text: author.to_string(),
                },
                TextRun {
                    properties: Some(RunProperties::note(false)),
                    text: text.to_string(),
                },
            ],
        }
    }

    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

impl CommentsFragment {
    pub fn author_of(&self, record: &CommentRecord) -> Option<&str> {
        self.authors
            .get(record.author_id as usize)
            .map(String::as_str)
    }

    /// Append a note for `cell`, keeping every existing record ahead of it.
    pub fn push_note(&mut self, cell: CellRef, author: &str, text: &str, mode: AuthorMode) {
        let author_id = match mode {
            AuthorMode::Distinct => match self.authors.iter().position(|a| a == author) {
                Some(idx) => idx,
                None => {
                    self.authors.push(author.to_string());
                    self.authors.len() - 1
                }
            },
            AuthorMode::LatestOnly => {
                self.authors = vec![author.to_string()];
                for comment in &mut self.comments {
                    comment.author_id = 0;
                }
                0
            }
        };
        let author_id = u32::try_from(author_id).unwrap_or(u32::MAX);
        self.comments
            .push(CommentRecord::note(cell, author_id, author, text));
    }
}

pub fn parse_comments_xml(bytes: &[u8]) -> Result<CommentsFragment, FragmentError> {
    let xml = std::str::from_utf8(bytes)?;
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "comments" {
        return Err(FragmentError::UnexpectedRoot {
            expected: "comments",
            found: root.tag_name().name().to_string(),
        });
    }

    let mut fragment = CommentsFragment::default();
    for section in root.children().filter(|n| n.is_element()) {
        match section.tag_name().name() {
            "authors" => fragment
                .authors
                .extend(child_elements(section, "author").map(element_text)),
            "commentList" => {
                for comment in child_elements(section, "comment") {
                    fragment.comments.push(parse_comment(comment)?);
                }
            }
            _ => {}
        }
    }

    Ok(fragment)
}

fn parse_comment(node: Node<'_, '_>) -> Result<CommentRecord, FragmentError> {
    let cell_ref = node
        .attribute("ref")
        .ok_or(FragmentError::MissingAttr("ref"))?
        .to_string();
    let author_id = match node.attribute("authorId") {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| FragmentError::InvalidAttr {
                attr: "authorId",
                value: value.to_string(),
            })?,
        None => 0,
    };

    let mut runs = Vec::new();
    if let Some(text) = child_elements(node, "text").next() {
        for child in text.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "r" => runs.push(TextRun {
                    properties: child_elements(child, "rPr").next().map(parse_run_properties),
                    text: child_elements(child, "t").map(element_text).collect(),
                }),
                // Plain (unformatted) note text.
                "t" => runs.push(TextRun {
                    properties: None,
                    text: element_text(child),
                }),
                _ => {}
            }
        }
    }

    Ok(CommentRecord {
        cell_ref,
        author_id,
        runs,
    })
}

fn parse_run_properties(node: Node<'_, '_>) -> RunProperties {
    let mut props = RunProperties::default();
    for child in node.children().filter(|n| n.is_element()) {
        let val = child.attribute("val").map(str::trim);
        match child.tag_name().name() {
            "b" => props.bold = is_on(val),
            "i" => props.italic = is_on(val),
            "sz" => props.size = val.and_then(|v| v.parse().ok()),
            "color" => {
                props.color = if let Some(indexed) = child.attribute("indexed") {
                    indexed.trim().parse().ok().map(RunColor::Indexed)
                } else if let Some(rgb) = child.attribute("rgb") {
                    Some(RunColor::Rgb(rgb.to_string()))
                } else {
                    child
                        .attribute("theme")
                        .and_then(|theme| theme.trim().parse().ok())
                        .map(RunColor::Theme)
                }
            }
            "rFont" => props.font = val.map(str::to_string),
            "family" => props.family = val.and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    props
}

fn is_on(val: Option<&str>) -> bool {
    !matches!(val, Some("0" | "false"))
}

fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

pub fn write_comments_xml(fragment: &CommentsFragment) -> Result<Vec<u8>, XlsxError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("comments");
    root.push_attribute(("xmlns", SPREADSHEETML_NS));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("authors")))?;
    for author in &fragment.authors {
        writer.write_event(Event::Start(BytesStart::new("author")))?;
        writer.write_event(Event::Text(BytesText::new(author)))?;
        writer.write_event(Event::End(BytesEnd::new("author")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("authors")))?;

    writer.write_event(Event::Start(BytesStart::new("commentList")))?;
    for comment in &fragment.comments {
        let author_id = comment.author_id.to_string();
        let mut el = BytesStart::new("comment");
        el.push_attribute(("ref", comment.cell_ref.as_str()));
        el.push_attribute(("authorId", author_id.as_str()));
        writer.write_event(Event::Start(el))?;
        writer.write_event(Event::Start(BytesStart::new("text")))?;
        for run in &comment.runs {
            write_run(&mut writer, run)?;
        }
        writer.write_event(Event::End(BytesEnd::new("text")))?;
        writer.write_event(Event::End(BytesEnd::new("comment")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("commentList")))?;

    writer.write_event(Event::End(BytesEnd::new("comments")))?;
    Ok(writer.into_inner())
}

fn write_run<W: Write>(writer: &mut Writer<W>, run: &TextRun) -> Result<(), XlsxError> {
    writer.write_event(Event::Start(BytesStart::new("r")))?;
    if let Some(props) = &run.properties {
        write_run_properties(writer, props)?;
    }
    let mut t = BytesStart::new("t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(&run.text)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("r")))?;
    Ok(())
}

fn write_run_properties<W: Write>(
    writer: &mut Writer<W>,
    props: &RunProperties,
) -> Result<(), XlsxError> {
    writer.write_event(Event::Start(BytesStart::new("rPr")))?;
    if props.bold {
        writer.write_event(Event::Empty(BytesStart::new("b")))?;
    }
    if props.italic {
        writer.write_event(Event::Empty(BytesStart::new("i")))?;
    }
    if let Some(size) = props.size {
        write_val(writer, "sz", &size.to_string())?;
    }
    if let Some(color) = &props.color {
        let mut el = BytesStart::new("color");
        match color {
            RunColor::Indexed(idx) => el.push_attribute(("indexed", idx.to_string().as_str())),
            RunColor::Rgb(rgb) => el.push_attribute(("rgb", rgb.as_str())),
            RunColor::Theme(theme) => el.push_attribute(("theme", theme.to_string().as_str())),
        }
        writer.write_event(Event::Empty(el))?;
    }
    if let Some(font) = &props.font {
        write_val(writer, "rFont", font)?;
    }
    if let Some(family) = props.family {
        write_val(writer, "family", &family.to_string())?;
    }
    writer.write_event(Event::End(BytesEnd::new("rPr")))?;
    Ok(())
}

fn write_val<W: Write>(writer: &mut Writer<W>, tag: &str, val: &str) -> Result<(), XlsxError> {
    let mut el = BytesStart::new(tag);
    el.push_attribute(("val", val));
    writer.write_event(Event::Empty(el))?;
    Ok(())
}
