use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Ods, Range, Reader, Xls, Xlsb, Xlsx, open_workbook};

use crate::{ColumnIndex, ColumnNames, IngestError, SearchRecord, SpreadsheetKind};

/// Read the first worksheet of a workbook. Row 0 is the header.
pub fn read_spreadsheet(
    path: &Path,
    kind: SpreadsheetKind,
    columns: &ColumnNames,
) -> Result<Vec<SearchRecord>, IngestError> {
    let range = match kind {
        SpreadsheetKind::Xlsx => first_sheet(open::<Xlsx<_>>(path)?, path)?,
        SpreadsheetKind::Xls => first_sheet(open::<Xls<_>>(path)?, path)?,
        SpreadsheetKind::Xlsb => first_sheet(open::<Xlsb<_>>(path)?, path)?,
        SpreadsheetKind::Ods => first_sheet(open::<Ods<_>>(path)?, path)?,
    };

    let Some(range) = range else {
        tracing::warn!(path = %path.display(), "workbook has no worksheets");
        return Ok(Vec::new());
    };
    records_from_range(&range, columns, path)
}

fn open<R>(path: &Path) -> Result<R, IngestError>
where
    R: Reader<BufReader<File>>,
    R::Error: Display,
{
    open_workbook::<R, _>(path).map_err(|e| spreadsheet_err(path, e))
}

fn first_sheet<R>(mut workbook: R, path: &Path) -> Result<Option<Range<Data>>, IngestError>
where
    R: Reader<BufReader<File>>,
    R::Error: Display,
{
    workbook
        .worksheet_range_at(0)
        .transpose()
        .map_err(|e| spreadsheet_err(path, e))
}

fn spreadsheet_err(path: &Path, e: impl Display) -> IngestError {
    IngestError::Spreadsheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Header discovery on the first row, one record per later row.
pub(crate) fn records_from_range(
    range: &Range<Data>,
    columns: &ColumnNames,
    path: &Path,
) -> Result<Vec<SearchRecord>, IngestError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        tracing::warn!(path = %path.display(), "first worksheet is empty");
        return Ok(Vec::new());
    };

    let header: Vec<String> = header.iter().map(cell_text).collect();
    let index = ColumnIndex::locate(header.iter().map(String::as_str), columns, path)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        match index.record(|i| cells.get(i).map(String::as_str)) {
            Some(rec) => records.push(rec),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped rows without a title");
    }
    Ok(records)
}

/// Text of a cell as a reader would see it. Whole numbers lose the `.0`
/// spreadsheets add to numeric ids.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => {
            tracing::debug!(error = ?e, "cell holds a spreadsheet error value");
            String::new()
        }
        other => other.to_string(),
    }
}
