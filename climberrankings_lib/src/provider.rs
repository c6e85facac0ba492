//! Source of raw efforts and segment details.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use strava_api::{Client, EffortQuery, Query};

use crate::cache::MemoryCache;
use crate::model::{DateRange, Effort, Gender, Segment};
use crate::retry::{with_retry, RateLimiter, RetryConfig, TrackerSummary};

/// Largest page the provider serves.
pub const MAX_PAGE_SIZE: usize = 200;

const SEGMENT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Api(#[from] strava_api::Error),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(e) => e.is_transient(),
            Self::Malformed(_) => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(strava_api::Error::Unauthorized))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api(strava_api::Error::RateLimited))
    }
}

/// Read-only access to a leaderboard source.
///
/// `list_efforts` returns at most `page_size` efforts on `segment_id` made by
/// athletes of `gender`, restricted to `range` when given. Order is
/// unspecified; callers rank.
pub trait LeaderboardProvider: Send + Sync {
    fn list_efforts(
        &self,
        segment_id: i64,
        gender: Gender,
        range: Option<DateRange>,
        page_size: usize,
    ) -> impl Future<Output = Result<Vec<Effort>, ProviderError>> + Send;

    fn get_segment(
        &self,
        segment_id: i64,
    ) -> impl Future<Output = Result<Segment, ProviderError>> + Send;
}

/// [`LeaderboardProvider`] backed by the Strava v3 API.
pub struct StravaProvider {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    segments: MemoryCache<i64, Segment>,
}

impl StravaProvider {
    /// Production client. `STRAVA_BASE_URL`, when set, overrides the API root.
    pub fn new(access_token: &str) -> Result<Self, ProviderError> {
        let client = match std::env::var("STRAVA_BASE_URL") {
            Ok(base) if !base.trim().is_empty() => Client::with_base_url(&base, access_token)?,
            _ => Client::new(access_token)?,
        };
        Ok(Self::from_client(client))
    }

    /// Points at a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str, access_token: &str) -> Result<Self, ProviderError> {
        Ok(Self::from_client(Client::with_base_url(
            base_url,
            access_token,
        )?))
    }

    fn from_client(client: Client) -> Self {
        Self {
            client,
            limiter: Arc::new(RateLimiter::default()),
            retry: RetryConfig::from_env(),
            segments: MemoryCache::new(SEGMENT_CACHE_TTL),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn request_summary(&self) -> TrackerSummary {
        self.limiter.tracker().summary()
    }
}

impl LeaderboardProvider for StravaProvider {
    async fn list_efforts(
        &self,
        segment_id: i64,
        gender: Gender,
        range: Option<DateRange>,
        page_size: usize,
    ) -> Result<Vec<Effort>, ProviderError> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut query = EffortQuery::default()
            .with_per_page(page_size as i64)
            .with_gender(gender);
        if let Some(range) = range {
            query = query.with_date_range(range.start, range.end);
        }

        let label = format!("segment {} {} efforts", segment_id, gender);
        let raw = with_retry(&self.limiter, &self.retry, &label, || async {
            Ok(self.client.list_segment_efforts(segment_id, &query).await?)
        })
        .await?;

        let mut efforts = Vec::with_capacity(raw.len().min(page_size));
        for effort in raw.into_iter().take(page_size) {
            if effort.elapsed_time < 0 {
                return Err(ProviderError::Malformed(format!(
                    "effort {} has negative elapsed time {}",
                    effort.id, effort.elapsed_time
                )));
            }
            efforts.push(Effort::from_api(effort, gender));
        }
        tracing::debug!(
            "segment {}: {} {} efforts fetched",
            segment_id,
            efforts.len(),
            gender
        );
        Ok(efforts)
    }

    async fn get_segment(&self, segment_id: i64) -> Result<Segment, ProviderError> {
        if let Some(segment) = self.segments.get(&segment_id) {
            return Ok(segment);
        }

        let label = format!("segment {}", segment_id);
        let detail = with_retry(&self.limiter, &self.retry, &label, || async {
            Ok(self.client.get_segment(segment_id).await?)
        })
        .await?;

        let segment = Segment::from(detail);
        self.segments.set(segment_id, segment.clone());
        Ok(segment)
    }
}
