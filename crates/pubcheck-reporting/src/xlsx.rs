use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pubcheck_core::MatchResult;
use rust_xlsxwriter::{Format, Url, Workbook, Worksheet, XlsxError};

use crate::{Column, ReportError, ReportSink, Value};

/// Excel rejects hyperlinks longer than this. Such links, and any the writer
/// refuses after escaping, are written as text.
const MAX_URL_LEN: usize = 2079;
const SHEET_NAME: &str = "Matches";

/// Rows collected into one worksheet, saved as `<prefix>-<unix-ts>.xlsx`.
///
/// The file is claimed on disk when the sink is created and written on
/// [`finalize`](ReportSink::finalize). A sink dropped without being
/// finalized saves what it has.
pub struct XlsxSink {
    path: PathBuf,
    worksheet: Worksheet,
    columns: Vec<Column>,
    score_format: Format,
    next_row: u32,
    closed: bool,
}

impl XlsxSink {
    /// Reserve a fresh file in `dir` and write the bold header row.
    pub fn create(dir: &Path, prefix: &str, columns: Vec<Column>) -> Result<Self, ReportError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = reserve(dir, prefix, timestamp)?;
        tracing::info!(path = %path.display(), "spreadsheet report");

        let mut sink = Self {
            path,
            worksheet: Worksheet::new(),
            columns,
            score_format: Format::new().set_num_format("0.00"),
            next_row: 1,
            closed: false,
        };
        sink.write_header().map_err(|e| sink.xlsx_err(e))?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_header(&mut self) -> Result<(), XlsxError> {
        let bold = Format::new().set_bold();
        self.worksheet.set_name(SHEET_NAME)?;
        for (col, column) in self.columns.iter().enumerate() {
            let col = col as u16;
            self.worksheet
                .write_string_with_format(0, col, column.label(), &bold)?;
            let width = match column {
                Column::PaperTitle | Column::SearchTitle | Column::Description => 50.0,
                Column::Link | Column::Authors => 30.0,
                _ => 14.0,
            };
            self.worksheet.set_column_width(col, width)?;
        }
        self.worksheet.set_freeze_panes(1, 0)?;
        Ok(())
    }

    fn write_row(&mut self, m: &MatchResult) -> Result<(), XlsxError> {
        let row = self.next_row;
        for (col, column) in self.columns.iter().enumerate() {
            let col = col as u16;
            match column.value(m) {
                Value::Text(s) => {
                    if !s.is_empty() {
                        self.worksheet.write_string(row, col, s)?;
                    }
                }
                Value::Score(v) => {
                    self.worksheet
                        .write_number_with_format(row, col, v, &self.score_format)?;
                }
                Value::Link(link) => {
                    let linked = link.len() <= MAX_URL_LEN
                        && match self.worksheet.write_url_with_text(row, col, Url::new(link), link) {
                            Ok(_) => true,
                            Err(e) => {
                                tracing::debug!(error = %e, "link kept as plain text");
                                false
                            }
                        };
                    if !linked {
                        self.worksheet.write_string(row, col, link)?;
                    }
                }
            }
        }
        self.next_row += 1;
        Ok(())
    }

    fn save(&mut self) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();
        workbook.push_worksheet(std::mem::replace(&mut self.worksheet, Worksheet::new()));
        workbook.save(&self.path)
    }

    fn xlsx_err(&self, e: XlsxError) -> ReportError {
        ReportError::Spreadsheet {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

impl ReportSink for XlsxSink {
    fn emit(&mut self, m: &MatchResult) -> Result<(), ReportError> {
        if self.closed {
            return Err(ReportError::Spreadsheet {
                path: self.path.clone(),
                message: "report already finalized".into(),
            });
        }
        self.write_row(m).map_err(|e| self.xlsx_err(e))
    }

    fn finalize(&mut self) -> Result<(), ReportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.save().map_err(|e| self.xlsx_err(e))?;
        tracing::info!(path = %self.path.display(), rows = self.next_row - 1, "spreadsheet saved");
        Ok(())
    }
}

impl Drop for XlsxSink {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.finalize()
        {
            tracing::warn!("{e}");
        }
    }
}

/// Create `<dir>/<prefix>-<timestamp>.xlsx`, adding `-1`, `-2`, ... if a
/// file of that name already exists.
fn reserve(dir: &Path, prefix: &str, timestamp: u64) -> Result<PathBuf, ReportError> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{prefix}-{timestamp}.xlsx")
        } else {
            format!("{prefix}-{timestamp}-{attempt}.xlsx")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 1000 => {
                attempt += 1;
            }
            Err(source) => return Err(ReportError::Io { path, source }),
        }
    }
}
