#![cfg(not(target_arch = "wasm32"))]

use std::process::Command;

use tempfile::tempdir;

use formula_xlsx_notes::new_workbook;

#[test]
fn add_then_list_round_trips_through_files() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("book.xlsx");
    let output = dir.path().join("noted.xlsx");
    std::fs::write(&input, new_workbook(&["Sheet1"]).write_to_bytes().unwrap()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_xlsx-notes"))
        .arg("add")
        .arg(&input)
        .arg(&output)
        .args(["--sheet", "Sheet1", "--cell", "A30"])
        .args([
            "--payload",
            r#"{"author":"Excelize: ","text":"This is a comment."}"#,
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let out = Command::new(env!("CARGO_BIN_EXE_xlsx-notes"))
        .arg("list")
        .arg(&output)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let notes: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(
        notes,
        serde_json::json!([{
            "sheet": "Sheet1",
            "cell": "A30",
            "author": "Excelize: ",
            "text": "Excelize: This is a comment.",
        }])
    );
}

#[test]
fn bad_cell_reference_fails_without_writing_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("book.xlsx");
    let output = dir.path().join("noted.xlsx");
    std::fs::write(&input, new_workbook(&["Sheet1"]).write_to_bytes().unwrap()).unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_xlsx-notes"))
        .arg("add")
        .arg(&input)
        .arg(&output)
        .args(["--sheet", "Sheet1", "--cell", "30A"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(!output.exists());
}
