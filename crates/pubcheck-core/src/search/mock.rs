//! Scripted search backend for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use super::{SearchBackend, SearchError};
use crate::SearchResult;

/// A configurable response for [`MockSearch`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return these results.
    Results(Vec<SearchResult>),
    /// Fail with this error.
    Error(SearchError),
}

impl MockResponse {
    /// A successful response with one hit per title.
    pub fn titles(titles: &[&str]) -> Self {
        MockResponse::Results(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| SearchResult {
                    title: t.to_string(),
                    link: format!("https://example.org/result/{i}"),
                    description: None,
                })
                .collect(),
        )
    }
}

/// A hand-rolled [`SearchBackend`] returning scripted responses.
///
/// Supports a fixed response, or a sequence (one per call, repeating the last
/// once exhausted), optional per-call latency, and records when and with what
/// title each call started.
pub struct MockSearch {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl MockSearch {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    ///
    /// An empty sequence behaves like a backend that never finds anything.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses
            .last()
            .cloned()
            .unwrap_or(MockResponse::Results(Vec::new()));
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            ..Self::new(fallback)
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `query()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Titles queried so far, in call order.
    pub fn queried_titles(&self) -> Vec<String> {
        self.lock_calls().iter().map(|(t, _)| t.clone()).collect()
    }

    /// When each call started, in call order.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.lock_calls().iter().map(|(_, at)| *at).collect()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(String, Instant)>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl SearchBackend for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    fn query<'a>(
        &'a self,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchResult>, SearchError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.lock_calls().push((title.to_string(), Instant::now()));
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Results(results) => Ok(results),
                MockResponse::Error(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_then_repeat_last() {
        let mock = MockSearch::with_sequence(vec![
            MockResponse::Error(SearchError::Http { status: 500 }),
            MockResponse::titles(&["A"]),
        ]);

        assert!(mock.query("one").await.is_err());
        assert_eq!(mock.query("two").await.unwrap().len(), 1);
        assert_eq!(mock.query("three").await.unwrap().len(), 1);
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.queried_titles(), vec!["one", "two", "three"]);
    }
}
