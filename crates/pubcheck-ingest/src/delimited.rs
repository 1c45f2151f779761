use std::path::Path;

use crate::{ColumnIndex, ColumnNames, IngestError, SearchRecord};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a header-labeled delimited text file.
pub fn read_delimited(
    path: &Path,
    delimiter: u8,
    columns: &ColumnNames,
) -> Result<Vec<SearchRecord>, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_delimited(&bytes, delimiter, columns, path)
}

/// Parse delimited text already in memory. `source` is only used in errors and logs.
///
/// Unrecognized columns are ignored, short rows are padded with empty
/// fields, rows with a blank title are skipped. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn parse_delimited(
    bytes: &[u8],
    delimiter: u8,
    columns: &ColumnNames,
    source: &Path,
) -> Result<Vec<SearchRecord>, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        tracing::warn!(path = %source.display(), "input file is empty");
        return Ok(Vec::new());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let csv_err = |e: csv::Error| IngestError::Delimited {
        path: source.to_path_buf(),
        source: e,
    };

    let headers: Vec<String> = rdr
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    let index = ColumnIndex::locate(headers.iter().map(String::as_str), columns, source)?;

    let (records, skipped) = collect_rows(rdr.byte_records(), &index, source);
    if skipped.malformed > 0 {
        tracing::warn!(path = %source.display(), count = skipped.malformed, "skipped malformed rows");
    }
    if skipped.untitled > 0 {
        tracing::warn!(path = %source.display(), count = skipped.untitled, "skipped rows without a title");
    }
    Ok(records)
}

/// Rows left out of the result, by reason.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Skipped {
    malformed: usize,
    untitled: usize,
}

fn collect_rows(
    rows: impl Iterator<Item = Result<csv::ByteRecord, csv::Error>>,
    index: &ColumnIndex,
    source: &Path,
) -> (Vec<SearchRecord>, Skipped) {
    let mut records = Vec::new();
    let mut skipped = Skipped::default();
    for (row, result) in rows.enumerate() {
        let fields: Vec<String> = match result {
            Ok(rec) => rec
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect(),
            Err(e) => {
                tracing::debug!(path = %source.display(), row = row + 2, error = %e, "malformed row");
                skipped.malformed += 1;
                continue;
            }
        };
        match index.record(|i| fields.get(i).map(String::as_str)) {
            Some(rec) => records.push(rec),
            None => skipped.untitled += 1,
        }
    }
    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<SearchRecord> {
        parse_delimited(text.as_bytes(), b',', &ColumnNames::default(), Path::new("in.csv")).unwrap()
    }

    #[test]
    fn id_and_title_only() {
        let records = parse("Manuscript ID,Manuscript Title\n123,Some Title\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "123");
        assert_eq!(records[0].title(), "Some Title");
        assert_eq!(records[0].authors(), None);
        assert_eq!(records[0].manuscript_type(), None);
    }

    #[test]
    fn bom_and_extra_columns_are_tolerated() {
        let text = "\u{feff}Reviewer,Manuscript Type,Manuscript Title,Author Names,Manuscript ID\n\
                    Bob,Original Article,\"Bleach, Revisited\",\"Doe, J.; Roe, R.\",M-7\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.id(), "M-7");
        assert_eq!(rec.title(), "Bleach, Revisited");
        assert_eq!(rec.authors(), Some("Doe, J.; Roe, R."));
        assert_eq!(rec.manuscript_type(), Some("Original Article"));
    }

    #[test]
    fn blank_titles_are_skipped_and_short_rows_padded() {
        let records = parse("Manuscript Title,Manuscript ID\n,1\nSecond,\nThird\n  ,4\n");
        let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["Second", "Third"]);
        assert_eq!(records[0].id(), "NA");
    }

    #[test]
    fn malformed_and_untitled_rows_are_counted_apart() {
        let index = ColumnIndex {
            id: Some(1),
            title: 0,
            authors: None,
            manuscript_type: None,
        };
        let rows = vec![
            Ok(csv::ByteRecord::from(vec!["First", "1"])),
            Err(csv::Error::from(std::io::Error::other("truncated"))),
            Ok(csv::ByteRecord::from(vec!["", "3"])),
            Ok(csv::ByteRecord::from(vec!["  ", "4"])),
        ];

        let (records, skipped) = collect_rows(rows.into_iter(), &index, Path::new("in.csv"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "1");
        assert_eq!(
            skipped,
            Skipped {
                malformed: 1,
                untitled: 2,
            }
        );
    }

    #[test]
    fn empty_file_has_no_records() {
        assert!(parse("").is_empty());
        assert!(parse("\u{feff}\n").is_empty());
    }

    #[test]
    fn header_only_has_no_records() {
        assert!(parse("Manuscript ID,Manuscript Title\n").is_empty());
    }

    #[test]
    fn missing_title_column() {
        let err = parse_delimited(
            b"ID,Title\n1,x\n",
            b',',
            &ColumnNames::default(),
            Path::new("in.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::MissingTitleColumn { .. }));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let records = parse_delimited(
            b"Manuscript Title\nCaf\xE9 Society\n",
            b',',
            &ColumnNames::default(),
            Path::new("in.csv"),
        )
        .unwrap();
        assert_eq!(records[0].title(), "Caf\u{fffd} Society");
    }

    #[test]
    fn tab_delimited() {
        let records = parse_delimited(
            b"Manuscript ID\tManuscript Title\n9\tA, B and C\n",
            b'\t',
            &ColumnNames::default(),
            Path::new("in.tsv"),
        )
        .unwrap();
        assert_eq!(records[0].id(), "9");
        assert_eq!(records[0].title(), "A, B and C");
    }
}
