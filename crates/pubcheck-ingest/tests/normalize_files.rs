//! Integration tests for [`pubcheck_ingest::normalize`] against files on disk.
//!
//! Workbooks are generated on the fly with rust_xlsxwriter so no binary
//! fixtures live in the repository.

use std::path::{Path, PathBuf};

use pubcheck_ingest::{ColumnNames, IngestError, normalize};
use rust_xlsxwriter::Workbook;

fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Write a one-sheet workbook; `None` cells are left empty.
fn write_workbook(dir: &Path, name: &str, rows: &[Vec<Option<Cell>>]) -> PathBuf {
    let path = dir.join(name);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Some(Cell::Text(s)) => {
                    sheet.write_string(r as u32, c as u16, *s).unwrap();
                }
                Some(Cell::Number(n)) => {
                    sheet.write_number(r as u32, c as u16, *n).unwrap();
                }
                None => {}
            }
        }
    }
    workbook.save(&path).unwrap();
    path
}

#[derive(Clone, Copy)]
enum Cell {
    Text(&'static str),
    Number(f64),
}

use Cell::{Number, Text};

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn csv_with_id_and_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_text(dir.path(), "input.csv", "Manuscript ID,Manuscript Title\n123,Some Title\n");

    let records = normalize(&arg(&path), &ColumnNames::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "123");
    assert_eq!(records[0].title(), "Some Title");
    assert_eq!(records[0].authors(), None);
    assert_eq!(records[0].manuscript_type(), None);
}

#[test]
fn xlsx_header_order_does_not_matter() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = write_workbook(
        dir.path(),
        "canonical.xlsx",
        &[
            vec![
                Some(Text("Manuscript ID")),
                Some(Text("Manuscript Title")),
                Some(Text("Author Names")),
                Some(Text("Manuscript Type")),
            ],
            vec![
                Some(Number(123.0)),
                Some(Text("Some Title")),
                Some(Text("Doe, J.")),
                Some(Text("Review")),
            ],
            vec![Some(Number(124.0)), None, Some(Text("No Title")), None],
        ],
    );
    let shuffled = write_workbook(
        dir.path(),
        "shuffled.xlsx",
        &[
            vec![
                Some(Text("Manuscript Type")),
                Some(Text("Decision")),
                Some(Text("Author Names")),
                Some(Text("Manuscript Title")),
                Some(Text("Manuscript ID")),
            ],
            vec![
                Some(Text("Review")),
                Some(Text("Accept")),
                Some(Text("Doe, J.")),
                Some(Text("Some Title")),
                Some(Number(123.0)),
            ],
            vec![Some(Text("Letter")), None, None, None, Some(Number(124.0))],
        ],
    );

    let columns = ColumnNames::default();
    let a = normalize(&arg(&canonical), &columns).unwrap();
    let b = normalize(&arg(&shuffled), &columns).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].id(), "123");
    assert_eq!(a[0].title(), "Some Title");
    assert_eq!(a[0].authors(), Some("Doe, J."));
    assert_eq!(a[0].manuscript_type(), Some("Review"));
}

#[test]
fn xlsx_without_title_column_is_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook(
        dir.path(),
        "wrong.xlsx",
        &[vec![Some(Text("ID")), Some(Text("Name"))], vec![Some(Number(1.0)), Some(Text("x"))]],
    );
    let err = normalize(&arg(&path), &ColumnNames::default()).unwrap_err();
    assert!(matches!(err, IngestError::MissingTitleColumn { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn workbook_saved_as_csv_is_still_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook(
        dir.path(),
        "export.csv",
        &[vec![Some(Text("Manuscript Title"))], vec![Some(Text("Hidden Workbook"))]],
    );
    let records = normalize(&arg(&path), &ColumnNames::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title(), "Hidden Workbook");
}

#[test]
fn custom_column_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_text(dir.path(), "custom.csv", "Ref,Paper\nR1,Custom Columns Work\n");
    let columns = ColumnNames {
        id: "Ref".into(),
        title: "Paper".into(),
        ..ColumnNames::default()
    };
    let records = normalize(&arg(&path), &columns).unwrap();
    assert_eq!(records[0].id(), "R1");
    assert_eq!(records[0].title(), "Custom Columns Work");
}

#[test]
fn docx_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_text(dir.path(), "report.docx", "not really a document");
    let err = normalize(&arg(&path), &ColumnNames::default()).unwrap_err();
    assert!(matches!(err, IngestError::Unsupported { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_file_is_treated_as_a_title() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    let records = normalize(&arg(&missing), &ColumnNames::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "NA");
    assert_eq!(records[0].title(), arg(&missing));
}
