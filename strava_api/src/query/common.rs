//! Shared query infrastructure: the [`Query`] trait and [`QueryCommon`] pagination fields.

use url::Url;

/// Trait implemented by all query builders. Provides URL serialization and
/// the shared page-size builder.
pub trait Query {
    /// Appends this query's parameters to the given URL, returning the modified URL.
    fn add_to_url(&self, url: &Url) -> Url;

    /// Returns a mutable reference to the common query fields.
    fn get_common(&mut self) -> &mut QueryCommon;

    /// Sets the number of results per page.
    fn with_per_page(mut self, per_page: i64) -> Self
    where
        Self: Sized,
    {
        self.get_common().per_page = Some(per_page);
        self
    }
}

/// Pagination fields shared by every list endpoint.
#[derive(Debug, Clone)]
pub struct QueryCommon {
    pub page: i64,
    pub per_page: Option<i64>,
}

impl Default for QueryCommon {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
        }
    }
}

impl QueryCommon {
    pub fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("page", &self.page.to_string());
        if let Some(per_page) = self.per_page {
            url.query_pairs_mut()
                .append_pair("per_page", &per_page.to_string());
        }
        url
    }
}
