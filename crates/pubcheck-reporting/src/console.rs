use std::io::Write;

use pubcheck_core::MatchResult;

use crate::{Column, ReportError, ReportSink};

/// Comma-separated rows on a text stream.
///
/// The header line is written just before the first row, so a run without
/// matches prints nothing. Fields are quoted only when they need it.
pub struct ConsoleSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<Column>,
    header_written: bool,
    finalized: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, columns: Vec<Column>) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .quote_style(csv::QuoteStyle::Necessary)
                .from_writer(out),
            columns,
            header_written: false,
            finalized: false,
        }
    }

    /// Recover the underlying writer, flushing buffered rows first.
    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Console(csv::Error::from(e.into_error())))
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn emit(&mut self, m: &MatchResult) -> Result<(), ReportError> {
        if !self.header_written {
            self.writer
                .write_record(self.columns.iter().map(|c| c.label()))?;
            self.header_written = true;
        }
        self.writer
            .write_record(self.columns.iter().map(|c| c.value(m).render()))?;
        // Rows should appear as records are processed, not at exit.
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ReportError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
