use std::collections::HashSet;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Asset, AssetStatus, Bookmark, RemoteAsset};

use super::isolate::isolate_each;
use super::{SyncContext, SyncPhase};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPhaseReport {
    /// Bookmarks whose assets are fully reconciled and unflagged.
    pub synced: usize,
    /// Bookmarks left flagged because listing or a download failed.
    pub failed: usize,
    pub interrupted: bool,
}

/// Reconcile assets for every bookmark flagged `needs_asset_sync`.
pub async fn sync_assets(ctx: &SyncContext<'_>, cache_content: bool) -> Result<AssetPhaseReport> {
    let flagged = ctx.repo.bookmarks_needing_asset_sync().await?;
    tracing::info!("Syncing assets for {} bookmarks", flagged.len());

    let run = isolate_each(
        ctx,
        Some(SyncPhase::Assets),
        flagged,
        |bookmark| bookmark.id,
        |bookmark| sync_bookmark_assets(ctx, bookmark, cache_content),
    )
    .await;

    Ok(AssetPhaseReport {
        synced: run.succeeded(),
        failed: run.failed(),
        interrupted: run.interrupted,
    })
}

/// Reconcile one bookmark. Clears its flag only when nothing failed.
async fn sync_bookmark_assets(
    ctx: &SyncContext<'_>,
    bookmark: Bookmark,
    cache_content: bool,
) -> Result<()> {
    // Archived bookmarks never keep content, even if listing fails below
    if bookmark.is_archived {
        let purged = ctx.repo.purge_cached_content(bookmark.id).await?;
        if purged > 0 {
            tracing::info!(
                "Bookmark {} was archived, dropped {} cached assets",
                bookmark.id,
                purged
            );
        }
    }

    let complete: Vec<RemoteAsset> = ctx
        .remote
        .list_assets(bookmark.id)
        .await?
        .into_iter()
        .filter(|asset| asset.status == AssetStatus::Complete)
        .collect();

    for asset in &complete {
        ctx.repo.upsert_asset_metadata(Asset::from(asset)).await?;
    }
    let removed = ctx
        .repo
        .delete_assets_except(bookmark.id, complete.iter().map(|a| a.id).collect())
        .await?;
    if removed > 0 {
        tracing::debug!("Removed {} stale assets of bookmark {}", removed, bookmark.id);
    }

    if bookmark.is_archived || !cache_content {
        ctx.repo.clear_needs_asset_sync(bookmark.id).await?;
        return Ok(());
    }

    let cached: HashSet<i64> = ctx
        .repo
        .cached_asset_ids(bookmark.id)
        .await?
        .into_iter()
        .collect();
    let missing: Vec<RemoteAsset> = complete
        .into_iter()
        .filter(|asset| !cached.contains(&asset.id))
        .collect();
    let wanted = missing.len();

    let bookmark_id = bookmark.id;
    let run = isolate_each(
        ctx,
        None,
        missing,
        |asset| asset.id,
        |asset| download_asset(ctx, bookmark_id, asset),
    )
    .await;

    if run.interrupted {
        return Err(AppError::Cancelled);
    }
    if run.failed() > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} asset downloads failed for bookmark {}",
            run.failed(),
            wanted,
            bookmark_id
        )
        .into());
    }

    ctx.repo.clear_needs_asset_sync(bookmark_id).await?;
    Ok(())
}

async fn download_asset(ctx: &SyncContext<'_>, bookmark_id: i64, asset: RemoteAsset) -> Result<()> {
    let content = ctx.remote.download_asset(bookmark_id, asset.id).await?;
    tracing::debug!(
        "Cached asset {} ({}, {} bytes)",
        asset.id,
        asset.display_name,
        content.len()
    );
    ctx.repo
        .store_asset_content(asset.id, content, Utc::now())
        .await
}
