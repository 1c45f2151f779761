//! Sequential driver: query, score, report, pause, repeat.
//!
//! Records are processed strictly one after another. A search failure is
//! isolated to its record; a report sink failure ends the run.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::matching::Matcher;
use crate::rate_limit::Throttle;
use crate::search::{SearchBackend, SearchError};
use crate::{Config, MatchResult, SearchRecord};

/// Destination for accepted matches.
pub trait MatchSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn accept(&mut self, m: &MatchResult) -> Result<(), Self::Error>;
}

/// Collecting sink, mostly useful in tests.
impl MatchSink for Vec<MatchResult> {
    type Error = std::convert::Infallible;

    fn accept(&mut self, m: &MatchResult) -> Result<(), Self::Error> {
        self.push(m.clone());
        Ok(())
    }
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Querying {
        index: usize,
        total: usize,
        record: SearchRecord,
    },
    Scored {
        index: usize,
        total: usize,
        id: String,
        candidates: usize,
        accepted: usize,
    },
    SearchFailed {
        index: usize,
        total: usize,
        id: String,
        error: SearchError,
    },
    /// About to pause before the next query.
    Throttling { delay: Duration },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    Completed,
    Cancelled,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// Records whose query got a usable response.
    pub searched: usize,
    pub search_failures: usize,
    /// Accepted matches handed to the sink.
    pub matches: usize,
    /// Records with at least one accepted match.
    pub records_matched: usize,
    pub outcome: RunOutcome,
}

/// Check every record against `backend`, streaming accepted matches to `sink`.
///
/// Pauses exactly `config.throttle` between consecutive queries, never after
/// the last one. A 429 counts as an ordinary search failure. Returns early with
/// [`RunOutcome::Cancelled`] once `cancel` fires; matches already handed to
/// the sink stay there.
pub async fn run<S: MatchSink>(
    records: &[SearchRecord],
    backend: &dyn SearchBackend,
    config: &Config,
    sink: &mut S,
    progress: impl Fn(ProgressEvent),
    cancel: &CancellationToken,
) -> Result<RunSummary, S::Error> {
    let total = records.len();
    let matcher = Matcher::new(config.matching.clone());
    let throttle = Throttle::new(config.throttle);
    let mut summary = RunSummary {
        total,
        ..RunSummary::default()
    };

    tracing::info!(
        total,
        backend = backend.name(),
        threshold = matcher.threshold(),
        "starting run"
    );

    for (index, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.outcome = RunOutcome::Cancelled;
            break;
        }

        progress(ProgressEvent::Querying {
            index,
            total,
            record: record.clone(),
        });

        let outcome = backend.query(record.title()).await;

        match outcome {
            Ok(results) => {
                summary.searched += 1;
                let accepted = matcher.accepted(record, &results);
                for m in &accepted {
                    sink.accept(m)?;
                }
                summary.matches += accepted.len();
                if !accepted.is_empty() {
                    summary.records_matched += 1;
                }
                tracing::debug!(
                    id = record.id(),
                    candidates = results.len(),
                    accepted = accepted.len(),
                    "record scored"
                );
                progress(ProgressEvent::Scored {
                    index,
                    total,
                    id: record.id().to_string(),
                    candidates: results.len(),
                    accepted: accepted.len(),
                });
            }
            Err(error) => {
                summary.search_failures += 1;
                tracing::warn!(
                    id = record.id(),
                    title = record.title(),
                    "search failed: {error}"
                );
                progress(ProgressEvent::SearchFailed {
                    index,
                    total,
                    id: record.id().to_string(),
                    error,
                });
            }
        }

        if index + 1 < total {
            progress(ProgressEvent::Throttling {
                delay: throttle.interval(),
            });
            if !throttle.pause(cancel).await {
                summary.outcome = RunOutcome::Cancelled;
                break;
            }
        }
    }

    tracing::info!(
        searched = summary.searched,
        failures = summary.search_failures,
        matches = summary.matches,
        cancelled = summary.outcome == RunOutcome::Cancelled,
        "run finished"
    );
    Ok(summary)
}
