//! HTTP client for the Strava v3 segments API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    query::{EffortQuery, Query},
    types::{SegmentDetail, SegmentEffort},
    Error,
};

/// Request timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Strava v3 API.
///
/// Every request carries the access token as a bearer credential. The token
/// must already be authorized; this client does not perform the OAuth flow.
pub struct Client {
    http: reqwest::Client,
    /// Base URL for the API. Defaults to `https://www.strava.com/api/v3`.
    base_api_url: String,
    access_token: String,
}

impl Client {
    /// Creates a new client pointing at the production API.
    pub fn new(access_token: &str) -> Result<Self, Error> {
        Self::with_base_url("https://www.strava.com/api/v3", access_token)
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str, access_token: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_api_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn get_url(&self, path: &str, query: Option<&impl Query>) -> Result<Url, Error> {
        let url = Url::parse(format!("{}{}", &self.base_api_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(e.to_string())
        })?;
        Ok(match query {
            Some(query) => query.add_to_url(&url),
            None => url,
        })
    }

    async fn get<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Query,
    {
        let url = self.get_url(path, query)?;
        tracing::debug!("GET {}", url.path());
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::Network(e)
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }

        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::Network(e)
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse resource: {} | body: {}", e, snippet);
            Error::Parse(e.to_string())
        })
    }

    /// Fetches a single segment by its numeric ID.
    pub async fn get_segment(&self, segment_id: i64) -> Result<SegmentDetail, Error> {
        self.get::<SegmentDetail, EffortQuery>(format!("/segments/{}", segment_id).as_str(), None)
            .await
    }

    /// Fetches one page of efforts on a segment matching the given query.
    pub async fn list_segment_efforts(
        &self,
        segment_id: i64,
        query: &EffortQuery,
    ) -> Result<Vec<SegmentEffort>, Error> {
        self.get::<Vec<SegmentEffort>, EffortQuery>(
            format!("/segments/{}/all_efforts", segment_id).as_str(),
            Some(query),
        )
        .await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
