use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::openxml::local_name;
use crate::XlsxError;

/// A `<sheet>` entry from `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkbookSheet {
    pub name: String,
    pub rel_id: String,
}

pub(crate) fn parse_workbook_sheets(workbook_xml: &[u8]) -> Result<Vec<WorkbookSheet>, XlsxError> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) => {
                if e.local_name().as_ref() == b"sheet" {
                    sheets.push(parse_sheet_element(&e)?);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn parse_sheet_element(e: &BytesStart<'_>) -> Result<WorkbookSheet, XlsxError> {
    let mut name: Option<String> = None;
    let mut rel_id: Option<String> = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        match key {
            b"name" => name = Some(attr.unescape_value()?.into_owned()),
            // `r:id`, whatever prefix the producer bound to the relationships namespace.
            _ if key.contains(&b':') && local_name(key) == b"id" => {
                rel_id = Some(attr.unescape_value()?.into_owned())
            }
            _ => {}
        }
    }

    Ok(WorkbookSheet {
        name: name.ok_or(XlsxError::MissingAttr("name"))?,
        rel_id: rel_id.ok_or(XlsxError::MissingAttr("r:id"))?,
    })
}
