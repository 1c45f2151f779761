use std::io::Write;

use owo_colors::OwoColorize;
use pubcheck_core::{ProgressEvent, RunSummary, SearchRecord};
use pubcheck_core::orchestrator::RunOutcome;
use pubcheck_reporting::ReportOutcome;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn shorten(title: &str, max_chars: usize) -> String {
    if title.chars().count() > max_chars {
        let cut: String = title.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

/// Print a real-time progress event.
///
/// Search failures are reported through the log, not here.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Querying {
            index,
            total,
            record,
        } => {
            writeln!(
                w,
                "[{}/{}] Searching: \"{}\"",
                index + 1,
                total,
                shorten(record.title(), 60)
            )?;
        }
        ProgressEvent::Scored {
            index,
            total,
            candidates,
            accepted,
            ..
        } => {
            let idx = index + 1;
            if *accepted > 0 {
                let label = if *accepted == 1 {
                    "1 MATCH".to_string()
                } else {
                    format!("{accepted} MATCHES")
                };
                if color.enabled() {
                    writeln!(
                        w,
                        "[{}/{}] -> {} (of {} results)",
                        idx,
                        total,
                        label.green(),
                        candidates
                    )?;
                } else {
                    writeln!(w, "[{}/{}] -> {} (of {} results)", idx, total, label, candidates)?;
                }
            } else {
                let line = format!("[{idx}/{total}] -> no match ({candidates} results)");
                if color.enabled() {
                    writeln!(w, "{}", line.dimmed())?;
                } else {
                    writeln!(w, "{line}")?;
                }
            }
        }
        ProgressEvent::SearchFailed { .. } | ProgressEvent::Throttling { .. } => {}
    }
    Ok(())
}

/// Print the end-of-run summary.
pub fn print_summary(
    w: &mut dyn Write,
    summary: &RunSummary,
    report: &ReportOutcome,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "=== Summary ===".bold())?;
    } else {
        writeln!(w, "=== Summary ===")?;
    }
    writeln!(w, "Titles checked:   {}/{}", summary.searched, summary.total)?;
    writeln!(w, "With matches:     {}", summary.records_matched)?;
    writeln!(w, "Matches reported: {}", summary.matches)?;

    if summary.search_failures > 0 {
        let line = format!("Search failures:  {}", summary.search_failures);
        if color.enabled() {
            writeln!(w, "{}", line.red())?;
        } else {
            writeln!(w, "{line}")?;
        }
    }
    if summary.outcome == RunOutcome::Cancelled {
        let line = "Run interrupted; remaining titles were not checked.";
        if color.enabled() {
            writeln!(w, "{}", line.yellow())?;
        } else {
            writeln!(w, "{line}")?;
        }
    }
    if let Some(path) = &report.spreadsheet {
        writeln!(w, "Spreadsheet:      {}", path.display())?;
    }
    Ok(())
}

/// Print normalized records for `--dry-run`.
pub fn print_records(
    w: &mut dyn Write,
    records: &[SearchRecord],
    color: ColorMode,
) -> std::io::Result<()> {
    let heading = format!("DRY RUN: {} title(s) would be searched", records.len());
    if color.enabled() {
        writeln!(w, "{}\n", heading.bold().cyan())?;
    } else {
        writeln!(w, "{heading}\n")?;
    }
    for record in records {
        writeln!(w, "{}\t{}", record.id(), record.title())?;
        if let Some(authors) = record.authors() {
            writeln!(w, "    Authors: {authors}")?;
        }
        if let Some(kind) = record.manuscript_type() {
            writeln!(w, "    Type:    {kind}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn shorten_respects_char_boundaries() {
        assert_eq!(shorten("Über die Elektrodynamik", 4), "Über...");
        assert_eq!(shorten("short", 60), "short");
    }

    #[test]
    fn progress_lines() {
        let color = ColorMode(false);
        let record = SearchRecord::literal("Curing Cancer with Bleach").unwrap();
        let text = render(|w| {
            print_progress(
                w,
                &ProgressEvent::Querying {
                    index: 0,
                    total: 2,
                    record,
                },
                color,
            )?;
            print_progress(
                w,
                &ProgressEvent::Scored {
                    index: 0,
                    total: 2,
                    id: "NA".into(),
                    candidates: 10,
                    accepted: 2,
                },
                color,
            )
        });
        assert_eq!(
            text,
            "[1/2] Searching: \"Curing Cancer with Bleach\"\n[1/2] -> 2 MATCHES (of 10 results)\n"
        );
    }

    #[test]
    fn summary_mentions_failures_and_spreadsheet() {
        let summary = RunSummary {
            total: 3,
            searched: 2,
            search_failures: 1,
            matches: 2,
            records_matched: 2,
            outcome: RunOutcome::Completed,
        };
        let report = ReportOutcome {
            rows: 2,
            spreadsheet: Some(PathBuf::from("paper-published-1700000000.xlsx")),
        };
        let text = render(|w| print_summary(w, &summary, &report, ColorMode(false)));
        assert!(text.contains("Titles checked:   2/3"));
        assert!(text.contains("Search failures:  1"));
        assert!(text.contains("paper-published-1700000000.xlsx"));
        assert!(!text.contains("interrupted"));
    }
}
