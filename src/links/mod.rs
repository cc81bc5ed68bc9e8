//! Web lookups triggered from chat: page titles and the news feed.

mod extract;
mod fetcher;

use chrono::{DateTime, Utc};
use url::Url;

use crate::Result;

pub use extract::extract_urls;
pub use fetcher::{extract_title, validate_url, HttpLinkLookup};

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Publication time, if the feed states one.
    pub published: Option<DateTime<Utc>>,
    /// Entry text (title, or summary when untitled).
    pub text: String,
    /// Link to the entry.
    pub link: Option<String>,
}

/// Source of page titles and feed entries.
///
/// The session awaits these inline; implementations bound their own time.
#[allow(async_fn_in_trait)]
pub trait LinkLookup {
    /// Title of the page at `url`, if it has one.
    async fn title(&self, url: &Url) -> Result<Option<String>>;

    /// Entries of the configured feed, newest first.
    async fn latest_entries(&self) -> Result<Vec<FeedEntry>>;
}
