use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{CollectionProgress, PassMode};

use super::fetcher::PageCursor;
use super::resolver::{resolve, Resolution};
use super::{SyncContext, SyncPhase};

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub progress: CollectionProgress,
    /// Items whose remote version was written locally.
    pub processed: usize,
}

/// Page through one collection and merge it into the local replica.
///
/// Offset and observed identifiers are persisted after every page, before
/// the next one is requested, so an interrupted pass resumes at the first
/// page it had not finished.
pub async fn reconcile_collection(
    ctx: &SyncContext<'_>,
    mut progress: CollectionProgress,
    mode: PassMode,
    since: Option<DateTime<Utc>>,
    page_size: u32,
) -> Result<CollectionOutcome> {
    let collection = progress.collection;
    let phase = SyncPhase::for_collection(collection);
    let mut cursor = PageCursor::new(collection, progress.offset, page_size, since);
    let mut processed = 0;
    let mut pages = 0;
    let mut seen = 0;

    tracing::info!(
        "Reconciling {} bookmarks ({} pass, offset {})",
        collection.as_str(),
        mode.as_str(),
        progress.offset
    );
    ctx.progress.emit(phase, progress.offset, None);

    loop {
        ctx.check_cancelled()?;

        let page_start = cursor.offset();
        let Some(page) = cursor.next_page(ctx.remote).await? else {
            break;
        };
        pages += 1;

        let mut page_ids = Vec::with_capacity(page.items.len());
        for (index, item) in page.items.iter().enumerate() {
            ctx.check_cancelled()?;

            let local = ctx.repo.get_bookmark(item.id).await?;
            if let Resolution::Apply(merged) = resolve(item, local.as_ref()) {
                ctx.repo.put_bookmark(merged).await?;
                processed += 1;
            }
            if mode.is_full() {
                page_ids.push(item.id);
            }

            seen += 1;
            ctx.progress
                .emit(phase, page_start + index as u64 + 1, page.count);
            ctx.maybe_yield(seen).await;
        }

        ctx.repo
            .save_page_progress(collection, cursor.offset(), page_ids.clone())
            .await?;
        progress.offset = cursor.offset();
        progress.observed_ids.extend(page_ids);

        tracing::debug!(
            "Applied {} page {} ({} items, next offset {})",
            collection.as_str(),
            pages,
            page.items.len(),
            progress.offset
        );
    }

    tracing::info!(
        "Finished {} bookmarks: {} updated across {} pages",
        collection.as_str(),
        processed,
        pages
    );

    Ok(CollectionOutcome {
        progress,
        processed,
    })
}
