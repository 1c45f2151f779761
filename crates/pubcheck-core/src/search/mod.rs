//! Search backend trait and the HTML results-page implementation.

pub mod html;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use scraper::Selector;
use thiserror::Error;

use crate::{ConfigError, SearchResult, SelectorSettings};

pub use html::HtmlSearch;

/// Why a search query produced no usable response.
///
/// Every variant is recoverable at the run level: the record is skipped and
/// the run moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Server returned 429 Too Many Requests.
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    /// Any other non-success status.
    #[error("search endpoint returned HTTP {status}")]
    Http { status: u16 },
    #[error("search request timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {:.1}s", d.as_secs_f64()),
        None => String::new(),
    }
}

/// A search endpoint that can be queried by title.
pub trait SearchBackend: Send + Sync {
    /// Short name used in log lines (e.g. "google").
    fn name(&self) -> &str;

    /// Query the endpoint for `title` and return its organic results in page order.
    ///
    /// A page with no recognizable results is `Ok(vec![])`, not an error.
    fn query<'a>(
        &'a self,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchResult>, SearchError>> + Send + 'a>>;
}

/// Compiled form of [`SelectorSettings`].
#[derive(Debug, Clone)]
pub struct ResultSelectors {
    pub container: Selector,
    pub heading: Selector,
    pub anchor: Selector,
    pub snippet: Option<Selector>,
}

impl ResultSelectors {
    pub fn compile(settings: &SelectorSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            container: parse_selector("container", &settings.container)?,
            heading: parse_selector("heading", &settings.heading)?,
            anchor: parse_selector("anchor", &settings.anchor)?,
            snippet: settings
                .snippet
                .as_deref()
                .map(|s| parse_selector("snippet", s))
                .transpose()?,
        })
    }
}

fn parse_selector(which: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        which,
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
