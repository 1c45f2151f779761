use std::io::Write;
use std::path::PathBuf;

use pubcheck_core::{MatchResult, MatchSink, OutputSettings};
use thiserror::Error;

pub mod console;
pub mod xlsx;

pub use console::ConsoleSink;
pub use xlsx::XlsxSink;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write console report: {0}")]
    Console(#[from] csv::Error),
    #[error("failed to write spreadsheet {}: {message}", .path.display())]
    Spreadsheet { path: PathBuf, message: String },
}

/// One column of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    PaperId,
    PaperTitle,
    SearchTitle,
    Authors,
    ManuscriptType,
    DirectMatch,
    PartialMatch,
    Link,
    Description,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::PaperId,
        Column::PaperTitle,
        Column::SearchTitle,
        Column::Authors,
        Column::ManuscriptType,
        Column::DirectMatch,
        Column::PartialMatch,
        Column::Link,
        Column::Description,
    ];

    /// Columns in output order. Without details the Authors and Manuscript
    /// Type columns are left out.
    pub fn schema(include_details: bool) -> Vec<Column> {
        Self::ALL
            .into_iter()
            .filter(|c| include_details || !matches!(c, Column::Authors | Column::ManuscriptType))
            .collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::PaperId => "Paper ID",
            Column::PaperTitle => "Paper Title",
            Column::SearchTitle => "Search Title",
            Column::Authors => "Authors",
            Column::ManuscriptType => "Manuscript Type",
            Column::DirectMatch => "Direct Match",
            Column::PartialMatch => "Partial Match",
            Column::Link => "Link",
            Column::Description => "Description",
        }
    }

    pub fn value(self, m: &MatchResult) -> Value<'_> {
        match self {
            Column::PaperId => Value::Text(m.record.id()),
            Column::PaperTitle => Value::Text(m.record.title()),
            Column::SearchTitle => Value::Text(&m.result.title),
            Column::Authors => Value::Text(m.record.authors().unwrap_or("")),
            Column::ManuscriptType => Value::Text(m.record.manuscript_type().unwrap_or("")),
            Column::DirectMatch => Value::Score(m.direct_score),
            Column::PartialMatch => Value::Score(m.partial_score),
            Column::Link => Value::Link(&m.result.link),
            Column::Description => Value::Text(m.result.description.as_deref().unwrap_or("")),
        }
    }
}

/// A typed cell value; each sink renders these its own way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Text(&'a str),
    /// Similarity score, 0–100.
    Score(f64),
    Link(&'a str),
}

impl Value<'_> {
    /// Plain-text rendering; scores get two decimals.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) | Value::Link(s) => s.to_string(),
            Value::Score(v) => format!("{v:.2}"),
        }
    }
}

/// A destination for report rows.
pub trait ReportSink {
    fn emit(&mut self, m: &MatchResult) -> Result<(), ReportError>;

    /// Flush and close. Calling it again is a no-op.
    fn finalize(&mut self) -> Result<(), ReportError>;
}

/// What a finished report produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    pub rows: usize,
    pub spreadsheet: Option<PathBuf>,
}

/// The set of sinks configured for a run.
pub struct Report {
    console: Option<ConsoleSink<Box<dyn Write>>>,
    spreadsheet: Option<XlsxSink>,
    rows: usize,
}

impl Report {
    /// Open every sink `settings` enables. Console rows go to `console_out`.
    ///
    /// The spreadsheet file is created immediately, so an unwritable output
    /// directory fails the run before any search happens.
    pub fn open(settings: &OutputSettings, console_out: Box<dyn Write>) -> Result<Self, ReportError> {
        let columns = Column::schema(settings.include_details);
        let console = settings
            .console
            .then(|| ConsoleSink::new(console_out, columns.clone()));
        let spreadsheet = if settings.spreadsheet {
            Some(XlsxSink::create(&settings.directory, &settings.prefix, columns)?)
        } else {
            None
        };
        Ok(Self {
            console,
            spreadsheet,
            rows: 0,
        })
    }

    pub fn spreadsheet_path(&self) -> Option<&std::path::Path> {
        self.spreadsheet.as_ref().map(XlsxSink::path)
    }

    /// Close every sink. Both are closed even if the first one fails; the
    /// first error is returned.
    pub fn finalize(mut self) -> Result<ReportOutcome, ReportError> {
        let console = match self.console.as_mut() {
            Some(sink) => sink.finalize(),
            None => Ok(()),
        };
        let spreadsheet = match self.spreadsheet.as_mut() {
            Some(sink) => sink.finalize(),
            None => Ok(()),
        };
        console?;
        spreadsheet?;

        Ok(ReportOutcome {
            rows: self.rows,
            spreadsheet: self.spreadsheet_path().map(|p| p.to_path_buf()),
        })
    }
}

impl MatchSink for Report {
    type Error = ReportError;

    fn accept(&mut self, m: &MatchResult) -> Result<(), ReportError> {
        if let Some(sink) = self.console.as_mut() {
            sink.emit(m)?;
        }
        if let Some(sink) = self.spreadsheet.as_mut() {
            sink.emit(m)?;
        }
        self.rows += 1;
        Ok(())
    }
}
