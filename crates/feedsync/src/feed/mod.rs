//! The paginated content feed: wire types, HTTP client, and record mapping.

mod client;
pub mod mapper;
mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::HttpError;

pub use client::HttpFeedClient;
pub use mapper::{InvalidItem, map_item, parse_date, parse_epoch, validate_item};
pub use types::{FeedItem, FeedLeadMedia, PageInfo};

/// Errors fetching a feed page. All of them abort the current run.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("feed returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("feed response from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FeedError {
    /// Whether the failure happened below HTTP status handling.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport(_))
    }
}

/// One fetched page.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub info: PageInfo,
    /// Items that decoded.
    pub items: Vec<FeedItem>,
    /// Items that did not decode, in feed order.
    pub rejected: Vec<InvalidItem>,
}

impl FeedPage {
    /// Number of entries the feed put on this page, decodable or not.
    pub fn len(&self) -> usize {
        self.items.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of feed pages.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<FeedPage, FeedError>;
}
