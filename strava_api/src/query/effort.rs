use chrono::{DateTime, Utc};
use url::Url;

use crate::types::Gender;

use super::common::{Query, QueryCommon};

const DATE_PARAM_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Filters for `GET /segments/{id}/all_efforts`.
#[derive(Debug, Clone, Default)]
pub struct EffortQuery {
    pub common: QueryCommon,
    pub gender: Option<Gender>,
    pub start_date_local: Option<DateTime<Utc>>,
    pub end_date_local: Option<DateTime<Utc>>,
}

impl Query for EffortQuery {
    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }

    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = self.common.add_to_url(url);
        if let Some(gender) = self.gender {
            url.query_pairs_mut().append_pair("gender", gender.code());
        }
        if let Some(start) = self.start_date_local {
            url.query_pairs_mut().append_pair(
                "start_date_local",
                &start.format(DATE_PARAM_FORMAT).to_string(),
            );
        }
        if let Some(end) = self.end_date_local {
            url.query_pairs_mut().append_pair(
                "end_date_local",
                &end.format(DATE_PARAM_FORMAT).to_string(),
            );
        }
        url
    }
}

impl EffortQuery {
    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Restricts results to efforts started within `[start, end]`.
    pub fn with_date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date_local = Some(start);
        self.end_date_local = Some(end);
        self
    }
}
