//! Rate limiting and retry for provider requests.
//!
//! A sliding-window limiter paces requests under the provider's short-term
//! budget (Strava allows 100 requests per 15 minutes; the default keeps a
//! margin at 90). Transient failures are retried with exponential backoff.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::provider::ProviderError;

const DEFAULT_MAX_REQUESTS: u64 = 90;

const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Sliding-window limiter shared by every provider call in a run.
///
/// Holds the issue time of each request still inside the window. A full
/// window makes `acquire()` sleep until its oldest request ages out.
pub struct RateLimiter {
    issued: Mutex<VecDeque<Instant>>,
    budget: u64,
    window: Duration,
    tracker: RequestTracker,
}

impl RateLimiter {
    pub fn new(budget: u64, window: Duration) -> Self {
        Self {
            issued: Mutex::new(VecDeque::with_capacity(budget as usize)),
            budget,
            window,
            tracker: RequestTracker::new(),
        }
    }

    /// Waits for a free slot in the window and claims it.
    pub async fn acquire(&self) {
        loop {
            let now = Instant::now();
            let wait = {
                let mut issued = self.issued.lock().await;
                if let Some(cutoff) = now.checked_sub(self.window) {
                    while issued.front().is_some_and(|&t| t < cutoff) {
                        issued.pop_front();
                    }
                }
                if (issued.len() as u64) < self.budget {
                    issued.push_back(now);
                    return;
                }
                issued
                    .front()
                    .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                    .unwrap_or_default()
            };
            tracing::debug!("request budget spent, waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Atomic counters tracking request outcomes.
pub struct RequestTracker {
    requests_made: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_rate_limited: AtomicU64,
    requests_failed: AtomicU64,
    requests_retried: AtomicU64,
    /// Milliseconds.
    total_backoff_ms: AtomicU64,
}

impl RequestTracker {
    fn new() -> Self {
        Self {
            requests_made: AtomicU64::new(0),
            requests_succeeded: AtomicU64::new(0),
            requests_rate_limited: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_retried: AtomicU64::new(0),
            total_backoff_ms: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backoff(&self, duration: Duration) {
        self.requests_retried.fetch_add(1, Ordering::Relaxed);
        self.total_backoff_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn summary(&self) -> TrackerSummary {
        TrackerSummary {
            requests_made: self.requests_made.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_retried: self.requests_retried.load(Ordering::Relaxed),
            total_backoff_secs: self.total_backoff_ms.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Immutable snapshot of tracker counters for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerSummary {
    pub requests_made: u64,
    pub requests_succeeded: u64,
    pub requests_rate_limited: u64,
    pub requests_failed: u64,
    pub requests_retried: u64,
    pub total_backoff_secs: f64,
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Reads `CLIMBERRANKINGS_RETRY_MAX`, `CLIMBERRANKINGS_RETRY_BASE_MS` and
    /// `CLIMBERRANKINGS_RETRY_MAX_MS`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_usize("CLIMBERRANKINGS_RETRY_MAX", defaults.max_retries),
            base_delay_ms: env_u64("CLIMBERRANKINGS_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_u64("CLIMBERRANKINGS_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), with +/-20% jitter.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Runs `operation` under the rate limiter, retrying transient failures.
///
/// Each attempt acquires a limiter slot first. Non-transient errors (401,
/// other 4xx, parse failures) return immediately.
pub async fn with_retry<F, Fut, T>(
    rate_limiter: &RateLimiter,
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let tracker = rate_limiter.tracker();
    let mut attempt = 0usize;
    loop {
        rate_limiter.acquire().await;

        match operation().await {
            Ok(value) => {
                tracker.record_success();
                return Ok(value);
            }
            Err(err) => {
                if err.is_rate_limited() {
                    tracker.record_rate_limited();
                } else {
                    tracker.record_failure();
                }

                attempt += 1;
                if attempt > config.max_retries || !err.is_transient() {
                    tracing::error!("{} request failed: {}", label, err);
                    return Err(err);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "{} request failed (attempt {}/{}), retrying in {:.1}s: {}",
                    label,
                    attempt,
                    config.max_retries,
                    delay.as_secs_f64(),
                    err
                );
                tracker.record_backoff(delay);
                sleep(delay).await;
            }
        }
    }
}
