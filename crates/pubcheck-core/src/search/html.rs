use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};

use super::{ResultSelectors, SearchBackend, SearchError};
use crate::rate_limit::check_rate_limit_response;
use crate::{ConfigError, SearchResult, SearchSettings};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Queries a web search endpoint and scrapes its HTML results page.
///
/// The request is a plain GET of `base_url + query_param=<percent-encoded title>`
/// with a browser User-Agent; endpoints tend to serve a stripped page (or
/// nothing) to clients that don't look like a browser.
pub struct HtmlSearch {
    client: reqwest::Client,
    base_url: String,
    base: Url,
    query_param: String,
    timeout: Duration,
    selectors: ResultSelectors,
}

impl HtmlSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self, ConfigError> {
        let base = Url::parse(&settings.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            message: e.to_string(),
        })?;
        let selectors = ResultSelectors::compile(&settings.selectors)?;
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            base,
            query_param: settings.query_param.clone(),
            timeout: settings.timeout,
            selectors,
        })
    }

    /// Full request URL for `title`.
    pub fn query_url(&self, title: &str) -> String {
        let sep = if self.base_url.ends_with('?') || self.base_url.ends_with('&') {
            ""
        } else if self.base_url.contains('?') {
            "&"
        } else {
            "?"
        };
        format!(
            "{}{}{}={}",
            self.base_url,
            sep,
            self.query_param,
            urlencoding::encode(title)
        )
    }

    async fn fetch(&self, title: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = self.query_url(title);
        tracing::debug!(%url, "querying search endpoint");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(self.timeout)
            } else {
                SearchError::Network(e.to_string())
            }
        })?;

        check_rate_limit_response(&resp)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(self.timeout)
            } else {
                SearchError::Body(e.to_string())
            }
        })?;

        let results = parse_results(&body, &self.selectors, &self.base);
        tracing::debug!(count = results.len(), "parsed search results");
        Ok(results)
    }
}

impl SearchBackend for HtmlSearch {
    fn name(&self) -> &str {
        self.base.host_str().unwrap_or("search")
    }

    fn query<'a>(
        &'a self,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SearchResult>, SearchError>> + Send + 'a>> {
        Box::pin(self.fetch(title))
    }
}

/// Extract organic results from a results page, in document order.
///
/// Containers without a heading or without a link are skipped. An empty or
/// unrecognized page yields no results.
pub fn parse_results(html: &str, selectors: &ResultSelectors, base: &Url) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for container in document.select(&selectors.container) {
        let Some(title) = container
            .select(&selectors.heading)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
        else {
            continue;
        };

        let Some(link) = container
            .select(&selectors.anchor)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_link(href, base))
        else {
            continue;
        };

        let description = selectors.snippet.as_ref().and_then(|sel| {
            container
                .select(sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
        });

        results.push(SearchResult {
            title,
            link,
            description,
        });
    }

    results
}

fn element_text(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<String>();
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

/// Turn an `href` from the results page into an absolute URL.
///
/// Redirect wrappers of the form `/url?q=<target>&...` are unwrapped to their
/// target. Fragment-only and `javascript:` links are dropped.
fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let absolute = base.join(href).ok()?;
    if absolute.path() == "/url"
        && let Some((_, target)) = absolute
            .query_pairs()
            .find(|(k, _)| k == "q" || k == "url")
        && (target.starts_with("http://") || target.starts_with("https://"))
    {
        return Some(target.into_owned());
    }

    match absolute.scheme() {
        "http" | "https" => Some(absolute.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelectorSettings;

    const PAGE: &str = r#"
        <html><body>
          <div class="g">
            <a href="https://journals.example.org/bleach"><h3>Curing Cancer with Bleach — Journal X</h3></a>
            <span class="st">A  randomized
              trial.</span>
          </div>
          <div class="g">
            <a href="/url?q=https://preprints.example.org/42&amp;sa=U"><h3>Bleach Therapies (preprint)</h3></a>
          </div>
          <div class="g"><span class="st">container without heading</span></div>
          <div class="g"><h3>heading without link</h3></div>
        </body></html>
    "#;

    fn selectors() -> ResultSelectors {
        ResultSelectors::compile(&SelectorSettings::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.google.com/search?").unwrap()
    }

    #[test]
    fn parses_organic_results_in_order() {
        let results = parse_results(PAGE, &selectors(), &base());
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Curing Cancer with Bleach — Journal X");
        assert_eq!(results[0].link, "https://journals.example.org/bleach");
        assert_eq!(results[0].description.as_deref(), Some("A randomized trial."));

        assert_eq!(results[1].title, "Bleach Therapies (preprint)");
        assert_eq!(results[1].link, "https://preprints.example.org/42");
        assert_eq!(results[1].description, None);
    }

    #[test]
    fn unrecognized_page_yields_nothing() {
        assert!(parse_results("<html><p>captcha</p></html>", &selectors(), &base()).is_empty());
        assert!(parse_results("", &selectors(), &base()).is_empty());
    }

    #[test]
    fn relative_links_are_resolved_against_base() {
        assert_eq!(
            resolve_link("/scholar?cluster=1", &base()).as_deref(),
            Some("https://www.google.com/scholar?cluster=1")
        );
        assert_eq!(resolve_link("#top", &base()), None);
        assert_eq!(resolve_link("javascript:void(0)", &base()), None);
    }

    #[test]
    fn query_url_appends_encoded_title() {
        let search = HtmlSearch::new(&SearchSettings::default()).unwrap();
        assert_eq!(
            search.query_url("Curing Cancer with Bleach"),
            "https://www.google.com/search?q=Curing%20Cancer%20with%20Bleach"
        );
        assert_eq!(search.query_url("A&B"), "https://www.google.com/search?q=A%26B");
    }

    #[test]
    fn query_url_picks_separator() {
        let mut settings = SearchSettings::default();
        settings.base_url = "https://search.example.org/find".into();
        let search = HtmlSearch::new(&settings).unwrap();
        assert_eq!(search.query_url("x"), "https://search.example.org/find?q=x");

        settings.base_url = "https://search.example.org/find?hl=en".into();
        let search = HtmlSearch::new(&settings).unwrap();
        assert_eq!(
            search.query_url("x"),
            "https://search.example.org/find?hl=en&q=x"
        );
    }

    // ── against a local HTTP server ────────────────────────────────────

    fn settings_for(server: &mockito::Server) -> SearchSettings {
        SearchSettings {
            base_url: format!("{}/search?", server.url()),
            timeout: Duration::from_secs(5),
            ..SearchSettings::default()
        }
    }

    #[tokio::test]
    async fn sends_browser_user_agent_and_encoded_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".into(),
                "Curing Cancer with Bleach".into(),
            ))
            .match_header("user-agent", mockito::Matcher::Regex("Mozilla".into()))
            .with_status(200)
            .with_body(PAGE)
            .create_async()
            .await;

        let search = HtmlSearch::new(&settings_for(&server)).unwrap();
        let results = search.query("Curing Cancer with Bleach").await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        // Relative redirect links resolve against the mock server, then unwrap.
        assert_eq!(results[1].link, "https://preprints.example.org/42");
    }

    #[tokio::test]
    async fn non_success_status_is_an_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let search = HtmlSearch::new(&settings_for(&server)).unwrap();
        let err = search.query("anything").await.unwrap_err();
        assert_eq!(err, SearchError::Http { status: 500 });
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let search = HtmlSearch::new(&settings_for(&server)).unwrap();
        let err = search.query("anything").await.unwrap_err();
        assert_eq!(
            err,
            SearchError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[tokio::test]
    async fn success_with_empty_page_is_ok_and_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html><body>no results</body></html>")
            .create_async()
            .await;

        let search = HtmlSearch::new(&settings_for(&server)).unwrap();
        assert!(search.query("anything").await.unwrap().is_empty());
    }
}
