#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_xlsx_notes::{new_workbook, NoteError};

const MAX_FIELD_BYTES: usize = 8 * 1024;

fn field(data: &[u8]) -> String {
    let data = if data.len() > MAX_FIELD_BYTES {
        &data[..MAX_FIELD_BYTES]
    } else {
        data
    };
    String::from_utf8_lossy(data).into_owned()
}

fuzz_target!(|data: &[u8]| {
    // `cell \0 payload`
    let mut split = data.splitn(2, |b| *b == 0);
    let cell = field(split.next().unwrap_or_default());
    let payload = field(split.next().unwrap_or_default());

    let mut pkg = new_workbook(&["Sheet1"]);
    for _ in 0..2 {
        match pkg.add_comment("Sheet1", &cell, &payload) {
            Ok(()) => {}
            Err(NoteError::InvalidReference { .. } | NoteError::PayloadParse(_)) => return,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    let comments = pkg.comments().expect("list notes");
    assert_eq!(comments["Sheet1"].comments.len(), 2);
    pkg.write_to_bytes().expect("write package");
});
