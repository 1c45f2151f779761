//! Fixed pacing between search queries, and 429 classification.
//!
//! The run pauses for the configured interval after every query except the
//! last. The interval never changes during a run, whatever the endpoint
//! answers; a 429 is only classified so it can be reported.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::search::SearchError;

#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// The pause every call to [`pause`](Self::pause) waits.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep for the interval.
    ///
    /// Returns `false` if `cancel` fired before the pause elapsed.
    pub async fn pause(&self, cancel: &CancellationToken) -> bool {
        if self.interval.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

/// Check if an HTTP response is a 429 and extract Retry-After if present.
///
/// Returns `Err(SearchError::RateLimited { .. })` if 429, `Ok(())` otherwise.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), SearchError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(SearchError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
///
/// HTTP-dates are not resolved against the clock; they map to a fixed 5s.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_retry_after ──────────────────────────────────────────────

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
    }

    #[test]
    fn parse_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn parse_garbage_none() {
        assert_eq!(parse_retry_after("soon"), None);
    }

    // ── check_rate_limit_response ──────────────────────────────────────

    #[test]
    fn ok_on_200_and_500() {
        for status in [200, 500] {
            let http_resp = http::Response::builder().status(status).body("").unwrap();
            let resp = reqwest::Response::from(http_resp);
            assert!(check_rate_limit_response(&resp).is_ok());
        }
    }

    #[test]
    fn rate_limited_429_with_retry_after() {
        let http_resp = http::Response::builder()
            .status(429)
            .header("retry-after", "10")
            .body("")
            .unwrap();
        let resp = reqwest::Response::from(http_resp);
        match check_rate_limit_response(&resp).unwrap_err() {
            SearchError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(10)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    // ── Throttle ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn pause_sleeps_for_interval() {
        let throttle = Throttle::new(Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        assert!(throttle.pause(&CancellationToken::new()).await);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_returns_early_on_cancel() {
        let throttle = Throttle::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = tokio::time::Instant::now();
        assert!(!throttle.pause(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
