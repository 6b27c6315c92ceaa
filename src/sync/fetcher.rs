use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Collection;
use crate::services::{BookmarkPage, RemoteApi};

/// Walks one remote listing page by page from a persisted offset.
#[derive(Debug, Clone)]
pub struct PageCursor {
    collection: Collection,
    limit: u32,
    offset: u64,
    since: Option<DateTime<Utc>>,
    done: bool,
}

impl PageCursor {
    pub fn new(
        collection: Collection,
        offset: u64,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            collection,
            limit,
            offset,
            since,
            done: false,
        }
    }

    /// Offset of the page after the last one returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    ///
    /// Errors are returned as-is; the cursor does not move past a page it
    /// failed to fetch.
    pub async fn next_page(&mut self, remote: &dyn RemoteApi) -> Result<Option<BookmarkPage>> {
        if self.done {
            return Ok(None);
        }

        let page = remote
            .list_bookmarks(self.collection, self.limit, self.offset, self.since)
            .await?;

        self.offset += page.items.len() as u64;
        if !page.has_next || page.items.len() < self.limit as usize {
            self.done = true;
        }

        Ok(Some(page))
    }
}
