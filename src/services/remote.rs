use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Collection, RemoteAsset, RemoteBookmark};

/// One page of a bookmark listing.
#[derive(Debug, Clone, Default)]
pub struct BookmarkPage {
    pub items: Vec<RemoteBookmark>,
    /// The service reported a page after this one.
    pub has_next: bool,
    /// Total size of the listing, when the service reports it.
    pub count: Option<u64>,
}

/// Operations the sync engine needs from the bookmark service.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list_bookmarks(
        &self,
        collection: Collection,
        limit: u32,
        offset: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<BookmarkPage>;

    async fn list_assets(&self, bookmark_id: i64) -> Result<Vec<RemoteAsset>>;

    async fn download_asset(&self, bookmark_id: i64, asset_id: i64) -> Result<Vec<u8>>;

    async fn mark_read(&self, bookmark_id: i64) -> Result<()>;
}
