use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod delimited;
pub mod sniff;
pub mod spreadsheet;

// Re-export domain types for convenience
pub use pubcheck_core::{ColumnNames, SearchRecord};
pub use sniff::{InputFormat, SpreadsheetKind, detect_format};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no input given: pass a file path or a manuscript title")]
    EmptyArgument,
    #[error("unsupported input file {}: {detail}", .path.display())]
    Unsupported { path: PathBuf, detail: String },
    #[error("no {column:?} column in the header of {}", .path.display())]
    MissingTitleColumn { path: PathBuf, column: String },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Delimited { path: PathBuf, source: csv::Error },
    #[error("failed to read spreadsheet {}: {message}", .path.display())]
    Spreadsheet { path: PathBuf, message: String },
}

impl IngestError {
    /// Process exit code for this failure.
    ///
    /// `1` for a missing argument or an unreadable file, `2` when the file's
    /// type or layout is not something the checker can read.
    pub fn exit_code(&self) -> i32 {
        match self {
            IngestError::Unsupported { .. } | IngestError::MissingTitleColumn { .. } => 2,
            IngestError::EmptyArgument
            | IngestError::Read { .. }
            | IngestError::Delimited { .. }
            | IngestError::Spreadsheet { .. } => 1,
        }
    }
}

/// What the positional argument turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Not an existing regular file: the argument itself is the title.
    Title(String),
    File(PathBuf),
}

/// Decide whether `argument` names an existing file or is a literal title.
///
/// Only regular files count; a directory of the same name is searched as a title.
pub fn classify(argument: &str) -> Result<Argument, IngestError> {
    if argument.trim().is_empty() {
        return Err(IngestError::EmptyArgument);
    }
    let path = Path::new(argument);
    if path.is_file() {
        Ok(Argument::File(path.to_path_buf()))
    } else {
        Ok(Argument::Title(argument.to_string()))
    }
}

/// Turn the command-line argument into search records.
///
/// A literal title yields exactly one record with the placeholder id; an
/// existing file is read according to its detected format. An unsupported
/// file type fails before anything else happens.
pub fn normalize(argument: &str, columns: &ColumnNames) -> Result<Vec<SearchRecord>, IngestError> {
    match classify(argument)? {
        Argument::Title(title) => {
            tracing::debug!(title = %title, "argument is a literal title");
            Ok(SearchRecord::literal(title).into_iter().collect())
        }
        Argument::File(path) => read_records(&path, columns),
    }
}

/// Read records from an input file.
pub fn read_records(path: &Path, columns: &ColumnNames) -> Result<Vec<SearchRecord>, IngestError> {
    let format = detect_format(path)?;
    tracing::info!(path = %path.display(), ?format, "reading input file");
    let records = match format {
        InputFormat::Delimited { delimiter } => delimited::read_delimited(path, delimiter, columns)?,
        InputFormat::Spreadsheet(kind) => spreadsheet::read_spreadsheet(path, kind, columns)?,
    };
    tracing::info!(path = %path.display(), count = records.len(), "loaded records");
    Ok(records)
}

/// Positions of the recognized columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnIndex {
    pub id: Option<usize>,
    pub title: usize,
    pub authors: Option<usize>,
    pub manuscript_type: Option<usize>,
}

impl ColumnIndex {
    /// Locate the recognized columns by name. Order does not matter; matching
    /// ignores case, whitespace and underscores. The first occurrence wins.
    pub fn locate<'a>(
        headers: impl IntoIterator<Item = &'a str>,
        columns: &ColumnNames,
        path: &Path,
    ) -> Result<Self, IngestError> {
        let headers: Vec<String> = headers.into_iter().map(header_key).collect();
        let find = |name: &str| {
            let key = header_key(name);
            headers.iter().position(|h| *h == key)
        };

        let title = find(&columns.title).ok_or_else(|| IngestError::MissingTitleColumn {
            path: path.to_path_buf(),
            column: columns.title.clone(),
        })?;

        Ok(Self {
            id: find(&columns.id),
            title,
            authors: find(&columns.authors),
            manuscript_type: find(&columns.manuscript_type),
        })
    }

    /// Build a record from one row's cells; `None` if the title cell is blank.
    pub fn record<'a>(&self, cell: impl Fn(usize) -> Option<&'a str>) -> Option<SearchRecord> {
        let text = |idx: Option<usize>| idx.and_then(&cell).unwrap_or("");
        let record = SearchRecord::new(text(self.id), text(Some(self.title)))?;
        Some(
            record
                .with_authors(text(self.authors))
                .with_manuscript_type(text(self.manuscript_type)),
        )
    }
}

fn header_key(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
