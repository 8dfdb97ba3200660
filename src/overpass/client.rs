//! HTTP client for the Overpass interpreter with retry, mirror rotation and
//! global request throttling.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{info_span, warn, Instrument};

use super::api_model::OverpassResponse;

/// Decides which failures are worth another attempt and how long to wait
/// before it. One policy is injected into the single client so the retry
/// numbers live in one place instead of every call site.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Backoff after the first rate-limited attempt; doubles each further one.
    pub rate_limit_backoff: Duration,
    /// Flat pause after a gateway timeout before asking again.
    pub gateway_timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            rate_limit_backoff: Duration::from_secs(5),
            gateway_timeout_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Statuses the interpreter recovers from on its own. Anything else is
    /// terminal (a 400 stays a 400 no matter how often it's sent).
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::GATEWAY_TIMEOUT
    }

    /// Pause after the given 1-based failed attempt. Network errors ramp
    /// linearly, rate limits exponentially, gateway timeouts stay flat.
    pub fn backoff(&self, attempt: u32, status: Option<StatusCode>) -> Duration {
        match status {
            Some(StatusCode::TOO_MANY_REQUESTS) => {
                self.rate_limit_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
            }
            Some(StatusCode::GATEWAY_TIMEOUT) => self.gateway_timeout_backoff,
            _ => self.rate_limit_backoff * attempt.max(1),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OverpassError {
    #[error("error sending query to {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("overpass returned status {status}")]
    Status { status: StatusCode },

    #[error("error parsing the interpreter response")]
    Parse(#[from] serde_json::Error),

    #[error("giving up after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<OverpassError>,
    },
}

impl OverpassError {
    fn retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            OverpassError::Http { .. } => true,
            OverpassError::Status { status } => policy.is_retryable(*status),
            _ => false,
        }
    }

    fn status(&self) -> Option<StatusCode> {
        match self {
            OverpassError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

pub struct OverpassClient {
    http: reqwest::Client,
    /// Interpreter endpoints; attempt `n` uses `servers[n % len]`.
    servers: Vec<String>,
    policy: RetryPolicy,
    min_interval: Duration,
    /// Start time of the most recent request, shared by every caller of this
    /// client so the interpreter sees at most one request per interval.
    last_request: Mutex<Option<Instant>>,
}

impl OverpassClient {
    pub fn new(
        servers: Vec<String>,
        policy: RetryPolicy,
        min_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;

        Ok(OverpassClient {
            http,
            servers,
            policy,
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    /// Sends one QL query and parses the JSON answer, retrying per the
    /// injected policy. Mirrors rotate per attempt so a rate-limited server
    /// isn't asked again immediately.
    pub async fn query(&self, ql: &str) -> Result<OverpassResponse, OverpassError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let url = &self.servers[(attempt as usize - 1) % self.servers.len()];

            self.throttle().await;
            let err = match self.send(url, ql).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.retryable(&self.policy) {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(OverpassError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let backoff = self.policy.backoff(attempt, err.status());
            warn!(
                "overpass attempt {attempt}/{} failed ({err}), retrying in {backoff:?}",
                self.policy.max_attempts
            );
            sleep(backoff).await;
        }
    }

    /// Enforces the minimum spacing between requests. The lock is held
    /// through the pause so concurrent callers queue instead of stampeding
    /// the interpreter the moment the interval elapses.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let since = previous.elapsed();
            if since < self.min_interval {
                sleep(self.min_interval - since).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send(&self, url: &str, ql: &str) -> Result<OverpassResponse, OverpassError> {
        let response = self
            .http
            .post(url)
            .body(ql.to_string())
            .send()
            .instrument(info_span!("Sending overpass query"))
            .await
            .map_err(|source| OverpassError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OverpassError::Status { status });
        }

        let body = response
            .text()
            .instrument(info_span!("Reading body of response"))
            .await
            .map_err(|source| OverpassError::Http {
                url: url.to_string(),
                source,
            })?;

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_back_off_exponentially() {
        let policy = RetryPolicy::default();
        let rate_limited = Some(StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(policy.backoff(1, rate_limited), Duration::from_secs(5));
        assert_eq!(policy.backoff(2, rate_limited), Duration::from_secs(10));
        assert_eq!(policy.backoff(3, rate_limited), Duration::from_secs(20));
    }

    #[test]
    fn gateway_timeouts_back_off_flat() {
        let policy = RetryPolicy::default();
        let timed_out = Some(StatusCode::GATEWAY_TIMEOUT);

        assert_eq!(policy.backoff(1, timed_out), Duration::from_secs(10));
        assert_eq!(policy.backoff(3, timed_out), Duration::from_secs(10));
    }

    #[test]
    fn network_errors_back_off_linearly() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(1, None), Duration::from_secs(5));
        assert_eq!(policy.backoff(2, None), Duration::from_secs(10));
        assert_eq!(policy.backoff(3, None), Duration::from_secs(15));
    }

    #[test]
    fn only_rate_limit_and_gateway_timeout_are_retryable() {
        let policy = RetryPolicy::default();

        assert!(policy.is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(policy.is_retryable(StatusCode::GATEWAY_TIMEOUT));
        assert!(!policy.is_retryable(StatusCode::BAD_REQUEST));
        assert!(!policy.is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!policy.is_retryable(StatusCode::OK));
    }
}
