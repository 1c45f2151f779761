//! Input format detection: extension first, magic bytes to confirm.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::IngestError;

/// OLE2 compound document header (legacy `.xls`, also `.doc`).
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// How much of a file is inspected to decide whether it is text.
const TEXT_PROBE_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetKind {
    /// Office Open XML (`.xlsx`, `.xlsm`).
    Xlsx,
    /// Legacy binary workbook.
    Xls,
    Xlsb,
    /// OpenDocument spreadsheet.
    Ods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Delimited { delimiter: u8 },
    Spreadsheet(SpreadsheetKind),
}

/// What the leading bytes of a file say it is.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Spreadsheet(SpreadsheetKind),
    /// A zip container that is not a workbook (e.g. a `.docx`).
    OtherZip(&'static str),
    Text,
    Binary,
}

/// Decide how to read `path`.
///
/// Unknown extensions are rejected without reading the file. Spreadsheet
/// extensions must be backed by a matching container; a `.csv`/`.tsv`/`.txt`
/// that is really a workbook is read as one. Files without an extension are
/// classified by content alone.
pub fn detect_format(path: &Path) -> Result<InputFormat, IngestError> {
    if !path.is_file() {
        return Err(unsupported(path, "not a regular file"));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" | "txt" | "tsv" => {
            let delimiter = if ext == "tsv" { b'\t' } else { b',' };
            match sniff(path)? {
                Content::Text => Ok(InputFormat::Delimited { delimiter }),
                Content::Spreadsheet(kind) => {
                    tracing::info!(path = %path.display(), ?kind, "delimited-text extension holds a workbook");
                    Ok(InputFormat::Spreadsheet(kind))
                }
                Content::OtherZip(what) => Err(unsupported(path, what)),
                Content::Binary => Err(unsupported(path, "binary content in a text file")),
            }
        }
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => match sniff(path)? {
            Content::Spreadsheet(kind) => Ok(InputFormat::Spreadsheet(kind)),
            Content::OtherZip(what) => Err(unsupported(path, what)),
            Content::Text | Content::Binary => Err(unsupported(
                path,
                &format!(".{ext} file is not a spreadsheet workbook"),
            )),
        },
        "" => match sniff(path)? {
            Content::Spreadsheet(kind) => Ok(InputFormat::Spreadsheet(kind)),
            Content::Text => Ok(InputFormat::Delimited { delimiter: b',' }),
            Content::OtherZip(what) => Err(unsupported(path, what)),
            Content::Binary => Err(unsupported(path, "unrecognized binary content")),
        },
        other => Err(unsupported(path, &format!("unsupported file extension .{other}"))),
    }
}

fn unsupported(path: &Path, detail: &str) -> IngestError {
    IngestError::Unsupported {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn sniff(path: &Path) -> Result<Content, IngestError> {
    let read_err = |source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut head = Vec::with_capacity(TEXT_PROBE_LEN);
    File::open(path)
        .map_err(read_err)?
        .take(TEXT_PROBE_LEN as u64)
        .read_to_end(&mut head)
        .map_err(read_err)?;

    if head.starts_with(&OLE_MAGIC) {
        return Ok(Content::Spreadsheet(SpreadsheetKind::Xls));
    }
    if head.starts_with(ZIP_MAGIC) {
        let file = File::open(path).map_err(read_err)?;
        return Ok(classify_zip(file));
    }
    Ok(if looks_like_text(&head) {
        Content::Text
    } else {
        Content::Binary
    })
}

fn classify_zip(file: File) -> Content {
    let archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(error = %e, "zip magic but unreadable archive");
            return Content::OtherZip("corrupt zip archive");
        }
    };

    let names: Vec<&str> = archive.file_names().collect();
    let has = |name: &str| names.iter().any(|n| n.eq_ignore_ascii_case(name));

    if has("xl/workbook.xml") {
        Content::Spreadsheet(SpreadsheetKind::Xlsx)
    } else if has("xl/workbook.bin") {
        Content::Spreadsheet(SpreadsheetKind::Xlsb)
    } else if has("content.xml") && has("mimetype") {
        Content::Spreadsheet(SpreadsheetKind::Ods)
    } else if names.iter().any(|n| n.starts_with("word/")) {
        Content::OtherZip("word-processing document")
    } else if names.iter().any(|n| n.starts_with("ppt/")) {
        Content::OtherZip("presentation")
    } else {
        Content::OtherZip("zip archive")
    }
}

/// UTF-8 without NUL bytes. A multi-byte sequence cut off at the probe
/// boundary still counts as text.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
