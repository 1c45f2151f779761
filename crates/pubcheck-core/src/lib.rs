use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod config_file;
pub mod matching;
pub mod orchestrator;
pub mod rate_limit;
pub mod search;

// Re-export for convenience
pub use matching::{Matcher, direct_score, partial_score, score};
pub use orchestrator::{MatchSink, ProgressEvent, RunOutcome, RunSummary, run};
pub use rate_limit::Throttle;
pub use search::{HtmlSearch, SearchBackend, SearchError};

/// Placeholder id for records that carry no manuscript id (e.g. a literal title).
pub const DEFAULT_RECORD_ID: &str = "NA";

/// One manuscript title to verify.
///
/// The title is guaranteed non-empty: [`SearchRecord::new`] refuses blank
/// titles, so a record that exists is always worth querying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRecord {
    id: String,
    title: String,
    authors: Option<String>,
    manuscript_type: Option<String>,
}

impl SearchRecord {
    /// Build a record, returning `None` when `title` is blank.
    ///
    /// A blank `id` falls back to [`DEFAULT_RECORD_ID`].
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return None;
        }
        let id = id.into().trim().to_string();
        Some(Self {
            id: if id.is_empty() {
                DEFAULT_RECORD_ID.to_string()
            } else {
                id
            },
            title,
            authors: None,
            manuscript_type: None,
        })
    }

    /// The single synthetic record produced for a literal title argument.
    pub fn literal(title: impl Into<String>) -> Option<Self> {
        Self::new(DEFAULT_RECORD_ID, title)
    }

    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = non_blank(authors.into());
        self
    }

    pub fn with_manuscript_type(mut self, manuscript_type: impl Into<String>) -> Self {
        self.manuscript_type = non_blank(manuscript_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn authors(&self) -> Option<&str> {
        self.authors.as_deref()
    }

    pub fn manuscript_type(&self) -> Option<&str> {
        self.manuscript_type.as_deref()
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One organic hit extracted from the search endpoint's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
}

/// A scored pairing of a record with one candidate result.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub record: SearchRecord,
    pub result: SearchResult,
    /// Whole-string similarity, 0–100.
    pub direct_score: f64,
    /// Best-aligned substring similarity, 0–100.
    pub partial_score: f64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("match threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),
    #[error("invalid {which} selector {selector:?}: {message}")]
    InvalidSelector {
        which: &'static str,
        selector: String,
        message: String,
    },
    #[error("invalid search URL {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("search timeout must be greater than zero")]
    ZeroTimeout,
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// CSS selectors locating the parts of one organic result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSettings {
    /// Marker of one organic hit.
    pub container: String,
    pub heading: String,
    pub anchor: String,
    pub snippet: Option<String>,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            container: "div.g".into(),
            heading: "h3".into(),
            anchor: "a".into(),
            snippet: Some("span.st".into()),
        }
    }
}

/// How to reach the search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Base URL the encoded query parameter is appended to.
    pub base_url: String,
    pub query_param: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub selectors: SelectorSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.google.com/search?".into(),
            query_param: "q".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.14; rv:65.0) Gecko/20100101 Firefox/65.0".into(),
            timeout: Duration::from_secs(30),
            selectors: SelectorSettings::default(),
        }
    }
}

/// Scoring and acceptance policy.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    /// Minimum partial score (0–100) for a candidate to be reported.
    pub threshold: f64,
    /// Only score the first `n` candidates of each response.
    pub top_n: Option<usize>,
    /// Drop candidates whose title does not literally contain the record title.
    pub require_containment: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: 60.0,
            top_n: None,
            require_containment: false,
        }
    }
}

/// Header names recognized in batch input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub manuscript_type: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "Manuscript ID".into(),
            title: "Manuscript Title".into(),
            authors: "Author Names".into(),
            manuscript_type: "Manuscript Type".into(),
        }
    }
}

/// Where and how accepted matches are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub console: bool,
    pub spreadsheet: bool,
    pub directory: PathBuf,
    /// Spreadsheet file name prefix; the run's unix timestamp is appended.
    pub prefix: String,
    /// Include the Authors and Manuscript Type columns.
    pub include_details: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            console: true,
            spreadsheet: true,
            directory: PathBuf::from("."),
            prefix: "paper-published".into(),
            include_details: true,
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub search: SearchSettings,
    pub matching: MatchSettings,
    /// Fixed pause between consecutive search queries.
    pub throttle: Duration,
    pub columns: ColumnNames,
    pub output: OutputSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            matching: MatchSettings::default(),
            throttle: Duration::from_secs(1),
            columns: ColumnNames::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Config {
    /// Reject values that would make the run meaningless before any I/O happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.search.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        reqwest::Url::parse(&self.search.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.search.base_url.clone(),
            message: e.to_string(),
        })?;
        search::ResultSelectors::compile(&self.search.selectors)?;
        Ok(())
    }
}
