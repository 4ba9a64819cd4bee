#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_xlsx_notes::comments::{
    parse_comments_xml, parse_vml_drawing, write_comments_xml, write_vml_drawing,
};

/// Keep the harness itself bounded; real note parts are far smaller.
const MAX_INPUT_BYTES: usize = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    if let Ok(comments) = parse_comments_xml(data) {
        let bytes = write_comments_xml(&comments).expect("rewrite parsed comments");
        let reparsed = parse_comments_xml(&bytes).expect("re-parse rewritten comments");
        assert_eq!(reparsed.comments.len(), comments.comments.len());
    }

    if let Ok(drawing) = parse_vml_drawing(data) {
        // Preserved shape bodies are copied verbatim, so the rewrite is only checked for errors.
        let _ = write_vml_drawing(1, &drawing);
    }
});
