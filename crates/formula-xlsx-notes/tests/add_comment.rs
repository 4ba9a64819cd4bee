use pretty_assertions::assert_eq;

use formula_xlsx_notes::comments::{
    parse_comments_xml, parse_vml_drawing, REL_TYPE_COMMENTS, REL_TYPE_VML_DRAWING,
};
use formula_xlsx_notes::openxml::parse_relationships;
use formula_xlsx_notes::{
    new_workbook, AuthorMode, CorruptPartPolicy, NoteError, NoteHost, NoteOptions, XlsxPackage,
};

const EXAMPLE_PAYLOAD: &str = r#"{"author":"Excelize: ","text":"This is a comment."}"#;

fn part_str<'a>(pkg: &'a XlsxPackage, name: &str) -> &'a str {
    std::str::from_utf8(pkg.part(name).unwrap_or_else(|| panic!("missing part {name}")))
        .expect("utf-8 part")
}

fn sheet_rels(pkg: &XlsxPackage, sheet_part: &str) -> Vec<(String, String)> {
    let name = formula_xlsx_notes::openxml::rels_part_name(sheet_part);
    parse_relationships(pkg.part(&name).expect("sheet rels"))
        .expect("parse rels")
        .into_iter()
        .map(|rel| (rel.type_uri, rel.target))
        .collect()
}

#[test]
fn excel_style_example_note() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A30", EXAMPLE_PAYLOAD).unwrap();

    let comments = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    assert_eq!(comments.authors, vec!["Excelize: "]);
    assert_eq!(comments.comments.len(), 1);
    let record = &comments.comments[0];
    assert_eq!(record.cell_ref, "A30");
    assert_eq!(record.author_id, 0);
    assert_eq!(record.runs.len(), 2);
    assert_eq!(record.runs[0].text, "Excelize: ");
    assert!(record.runs[0].properties.as_ref().unwrap().bold);
    assert_eq!(record.runs[1].text, "This is a comment.");
    assert!(!record.runs[1].properties.as_ref().unwrap().bold);

    let drawing = parse_vml_drawing(pkg.part("xl/drawings/vmlDrawing1.vml").unwrap()).unwrap();
    assert_eq!(drawing.shapes.len(), 1);
    let data = drawing.shapes[0].client_data.as_ref().unwrap();
    assert_eq!(data.object_type, "Note");
    assert_eq!((data.column, data.row), (Some(0), Some(29)));
    assert_eq!(
        data.anchor.unwrap().to_string(),
        "1, 23, 30, 5, 2, 23, 30, 5"
    );

    let sheet = part_str(&pkg, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<legacyDrawing r:id="rId1"/>"#), "{sheet}");
    let rels = sheet_rels(&pkg, "xl/worksheets/sheet1.xml");
    assert_eq!(
        rels,
        vec![
            (
                REL_TYPE_VML_DRAWING.to_string(),
                "../drawings/vmlDrawing1.vml".to_string()
            ),
            (REL_TYPE_COMMENTS.to_string(), "../comments1.xml".to_string()),
        ]
    );

    let ct = part_str(&pkg, "[Content_Types].xml");
    assert!(ct.contains(
        r#"<Default Extension="vml" ContentType="application/vnd.openxmlformats-officedocument.vmlDrawing"/>"#
    ));
    assert!(ct.contains(
        r#"<Override PartName="/xl/comments1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml"/>"#
    ));
}

#[test]
fn second_note_reuses_the_sheet_part_pair() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A1", r#"{"author":"Alice","text":"first"}"#)
        .unwrap();
    pkg.add_comment("Sheet1", "D4", r#"{"author":"Alice","text":"second"}"#)
        .unwrap();

    assert_eq!(pkg.count_parts_with_prefix("xl/comments"), 1);
    assert_eq!(pkg.count_parts_with_prefix("xl/drawings/vmlDrawing"), 1);
    assert_eq!(sheet_rels(&pkg, "xl/worksheets/sheet1.xml").len(), 2);

    let sheet = part_str(&pkg, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("<legacyDrawing").count(), 1);

    let ct = part_str(&pkg, "[Content_Types].xml");
    assert_eq!(ct.matches(r#"Extension="vml""#).count(), 1);
    assert_eq!(ct.matches("/xl/comments1.xml").count(), 1);

    let comments = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    let refs: Vec<&str> = comments
        .comments
        .iter()
        .map(|c| c.cell_ref.as_str())
        .collect();
    assert_eq!(refs, vec!["A1", "D4"]);
    assert_eq!(comments.authors, vec!["Alice"]);

    let drawing = parse_vml_drawing(pkg.part("xl/drawings/vmlDrawing1.vml").unwrap()).unwrap();
    assert_eq!(drawing.note_count(), 2);
    let vml = part_str(&pkg, "xl/drawings/vmlDrawing1.vml");
    assert!(vml.contains(r#"id="_x0000_s1025""#));
    assert!(vml.contains(r#"id="_x0000_s1026""#));
    assert_eq!(vml.matches("<v:shapetype").count(), 1);
}

#[test]
fn each_sheet_gets_its_own_part_pair() {
    let mut pkg = new_workbook(&["Sheet1", "Data", "Empty"]);
    pkg.add_comment("Data", "B2", r#"{"text":"on data"}"#).unwrap();
    pkg.add_comment("Sheet1", "C3", r#"{"text":"on sheet1"}"#)
        .unwrap();
    pkg.add_comment("Data", "B3", r#"{"text":"on data again"}"#)
        .unwrap();

    // Data was noted first, so it owns id 1.
    assert!(pkg.part("xl/comments1.xml").is_some());
    assert!(pkg.part("xl/comments2.xml").is_some());
    assert_eq!(
        pkg.related_parts("Data", REL_TYPE_COMMENTS).unwrap(),
        vec!["xl/comments1.xml".to_string()]
    );
    assert_eq!(
        pkg.related_parts("Sheet1", REL_TYPE_COMMENTS).unwrap(),
        vec!["xl/comments2.xml".to_string()]
    );
    let vml = part_str(&pkg, "xl/drawings/vmlDrawing2.vml");
    assert!(vml.contains(r#"<o:idmap v:ext="edit" data="2"/>"#));
    assert!(vml.contains(r#"id="_x0000_s2049""#));

    let all = pkg.comments().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["Data", "Sheet1"]);
    assert_eq!(all["Data"].comments.len(), 2);
    assert_eq!(all["Sheet1"].comments.len(), 1);
    assert!(!all.contains_key("Empty"));

    let ct = part_str(&pkg, "[Content_Types].xml");
    assert!(ct.contains("/xl/comments1.xml"));
    assert!(ct.contains("/xl/comments2.xml"));
}

#[test]
fn oversized_fields_are_truncated() {
    let author = "a".repeat(300);
    let text = "b".repeat(40_000);
    let payload = serde_json::json!({ "author": author, "text": text }).to_string();

    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A1", &payload).unwrap();

    let comments = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    assert_eq!(comments.authors[0].len(), 255);
    assert_eq!(comments.comments[0].runs[0].text.len(), 255);
    assert_eq!(comments.comments[0].runs[1].text.len(), 32_512);
}

#[test]
fn box_height_follows_the_anchor_column_width() {
    let mut pkg = new_workbook(&["Narrow", "Wide"]);
    pkg.set_part(
        "xl/worksheets/sheet2.xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <cols><col min="2" max="2" width="20" customWidth="1"/></cols>
  <sheetData/>
</worksheet>"#
            .to_vec(),
    );

    // 201 characters: 2 rows over a 64px column, 1 row over a 140px one.
    let payload = serde_json::json!({ "author": "A", "text": "x".repeat(200) }).to_string();
    pkg.add_comment("Narrow", "A1", &payload).unwrap();
    pkg.add_comment("Wide", "A1", &payload).unwrap();

    let anchor_of = |part: &str| {
        let drawing = parse_vml_drawing(pkg.part(part).unwrap()).unwrap();
        drawing.shapes[0]
            .client_data
            .as_ref()
            .and_then(|d| d.anchor)
            .unwrap()
    };
    let narrow = anchor_of("xl/drawings/vmlDrawing1.vml");
    let wide = anchor_of("xl/drawings/vmlDrawing2.vml");
    assert_eq!((narrow.top_row, narrow.bottom_row), (1, 3));
    assert_eq!((wide.top_row, wide.bottom_row), (1, 2));

    // The second sheet had no `xmlns:r`; linking the drawing must declare it.
    let sheet = part_str(&pkg, "xl/worksheets/sheet2.xml");
    assert!(sheet.contains(r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#));
    assert!(sheet.contains(r#"<legacyDrawing r:id="rId1"/>"#));
}

#[test]
fn explicit_anchor_position_is_honored() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment_at("Sheet1", "B2", r#"{"text":"x"}"#, 5, 10)
        .unwrap();

    let drawing = parse_vml_drawing(pkg.part("xl/drawings/vmlDrawing1.vml").unwrap()).unwrap();
    let data = drawing.shapes[0].client_data.as_ref().unwrap();
    let anchor = data.anchor.unwrap();
    assert_eq!((anchor.left_column, anchor.top_row), (5, 10));
    assert_eq!(anchor.right_column, 6);
    assert_eq!((data.column, data.row), (Some(1), Some(1)));
}

#[test]
fn latest_only_mode_rewrites_the_author_table() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A1", r#"{"author":"Alice","text":"one"}"#)
        .unwrap();
    pkg.add_comment("Sheet1", "A2", r#"{"author":"Bob","text":"two"}"#)
        .unwrap();
    let distinct = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    assert_eq!(distinct.authors, vec!["Alice", "Bob"]);
    assert_eq!(distinct.author_of(&distinct.comments[1]), Some("Bob"));

    let options = NoteOptions {
        authors: AuthorMode::LatestOnly,
        ..NoteOptions::default()
    };
    pkg.add_comment_at_with_options("Sheet1", "A3", r#"{"author":"Carol"}"#, 1, 3, options)
        .unwrap();
    let latest = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    assert_eq!(latest.authors, vec!["Carol"]);
    assert_eq!(latest.comments.len(), 3);
    assert!(latest.comments.iter().all(|c| c.author_id == 0));
    assert_eq!(latest.comments[2].runs[1].text, " ");
}

#[test]
fn corrupt_prior_part_fails_by_default_and_can_be_replaced() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A1", r#"{"text":"kept?"}"#).unwrap();
    pkg.set_part("xl/comments1.xml", b"<comments><commentList>".to_vec());
    let before = pkg.clone().into_parts();

    let err = pkg
        .add_comment("Sheet1", "A2", r#"{"text":"new"}"#)
        .unwrap_err();
    match &err {
        NoteError::PartCorruption { part, .. } => assert_eq!(part, "xl/comments1.xml"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(pkg.clone().into_parts(), before);

    let options = NoteOptions {
        on_corrupt_part: CorruptPartPolicy::Replace,
        ..NoteOptions::default()
    };
    pkg.add_comment_at_with_options("Sheet1", "A2", r#"{"text":"new"}"#, 1, 2, options)
        .unwrap();
    let comments = parse_comments_xml(pkg.part("xl/comments1.xml").unwrap()).unwrap();
    assert_eq!(comments.comments.len(), 1);
    assert_eq!(comments.comments[0].cell_ref, "A2");

    // The drawing part was readable and keeps both shapes.
    let drawing = parse_vml_drawing(pkg.part("xl/drawings/vmlDrawing1.vml").unwrap()).unwrap();
    assert_eq!(drawing.shapes.len(), 2);
}

#[test]
fn unreadable_comments_are_skipped_when_listing() {
    let mut pkg = new_workbook(&["Sheet1", "Data"]);
    pkg.add_comment("Sheet1", "A1", "{}").unwrap();
    pkg.add_comment("Data", "A1", "{}").unwrap();
    pkg.set_part("xl/comments1.xml", b"not xml".to_vec());

    let all = pkg.comments().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["Data"]);
}

#[test]
fn notes_survive_a_zip_round_trip() {
    let mut pkg = new_workbook(&["Sheet1"]);
    pkg.add_comment("Sheet1", "A30", EXAMPLE_PAYLOAD).unwrap();

    let bytes = pkg.write_to_bytes().unwrap();
    let mut reread = XlsxPackage::from_bytes(&bytes).unwrap();
    reread
        .add_comment("Sheet1", "B30", r#"{"text":"after reload"}"#)
        .unwrap();

    let all = reread.comments().unwrap();
    let refs: Vec<&str> = all["Sheet1"]
        .comments
        .iter()
        .map(|c| c.cell_ref.as_str())
        .collect();
    assert_eq!(refs, vec!["A30", "B30"]);
    assert_eq!(reread.count_parts_with_prefix("xl/comments"), 1);
}
