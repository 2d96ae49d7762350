use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::mapper::InvalidItem;
use super::types::{FeedItem, FeedResponse};
use super::{FeedClient, FeedError, FeedPage};
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};

/// Feed client speaking `GET <base>?page=<n>&pageSize=<k>`.
pub struct HttpFeedClient<T = ReqwestTransport> {
    base_url: Url,
    transport: T,
}

impl HttpFeedClient<ReqwestTransport> {
    /// Build a client over reqwest with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Self::with_transport(base_url, transport)
    }
}

impl<T: HttpTransport> HttpFeedClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self, FeedError> {
        let base_url = Url::parse(base_url).map_err(|e| FeedError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            transport,
        })
    }

    /// URL for one page. Existing query parameters on the base URL are kept.
    pub fn page_url(&self, page: u32, page_size: u32) -> Url {
        let mut url = self.base_url.clone();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page" && k != "pageSize")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());
        url
    }
}

#[async_trait]
impl<T: HttpTransport> FeedClient for HttpFeedClient<T> {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<FeedPage, FeedError> {
        let url = self.page_url(page, page_size).to_string();
        tracing::debug!(%url, "fetching feed page");

        let response = self
            .transport
            .send(HttpRequest::get(url.clone()))
            .await?;

        if !response.is_success() {
            return Err(FeedError::Status {
                status: response.status,
                url,
            });
        }

        let decoded: FeedResponse = serde_json::from_slice(&response.body)
            .map_err(|source| FeedError::Decode { url, source })?;

        Ok(split_items(decoded))
    }
}

/// Decode each raw item on its own so a malformed one is rejected individually.
fn split_items(response: FeedResponse) -> FeedPage {
    let mut items = Vec::with_capacity(response.content.len());
    let mut rejected = Vec::new();

    for raw in response.content {
        match serde_json::from_value::<FeedItem>(raw) {
            Ok(item) => items.push(item),
            Err(e) => rejected.push(InvalidItem::Undecodable {
                reason: e.to_string(),
            }),
        }
    }

    FeedPage {
        info: response.page_info,
        items,
        rejected,
    }
}
