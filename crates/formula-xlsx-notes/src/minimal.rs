use std::collections::BTreeMap;

use crate::XlsxPackage;

/// Build a minimal, valid XLSX package with one empty worksheet per name.
///
/// Sheet `n` (1-based) lives at `xl/worksheets/sheet{n}.xml` behind workbook relationship
/// `rId{n}`.
pub fn new_workbook(sheet_names: &[&str]) -> XlsxPackage {
    let mut parts = BTreeMap::new();
    parts.insert(
        "[Content_Types].xml".to_string(),
        content_types_xml(sheet_names.len()).into_bytes(),
    );
    parts.insert("_rels/.rels".to_string(), rels_xml().into_bytes());
    parts.insert(
        "xl/workbook.xml".to_string(),
        workbook_xml(sheet_names).into_bytes(),
    );
    parts.insert(
        "xl/_rels/workbook.xml.rels".to_string(),
        workbook_rels_xml(sheet_names.len()).into_bytes(),
    );
    for n in 1..=sheet_names.len() {
        parts.insert(
            format!("xl/worksheets/sheet{n}.xml"),
            worksheet_xml().into_bytes(),
        );
    }
    XlsxPackage::from_parts(parts)
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#,
    );
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            "  <Override PartName=\"/xl/worksheets/sheet{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n"
        ));
    }
    xml.push_str("</Types>\n");
    xml
}

fn rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#
    .to_owned()
}

fn workbook_xml(sheet_names: &[&str]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
"#,
    );
    for (idx, name) in sheet_names.iter().enumerate() {
        let n = idx + 1;
        xml.push_str(&format!(
            "    <sheet name=\"{}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>\n",
            xml_escape(name)
        ));
    }
    xml.push_str("  </sheets>\n</workbook>\n");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            "  <Relationship Id=\"rId{n}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>\n"
        ));
    }
    xml.push_str("</Relationships>\n");
    xml
}

fn worksheet_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
           xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheetData/>
  <pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>
</worksheet>
"#
    .to_owned()
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
