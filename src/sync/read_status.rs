use super::isolate::isolate_each;
use super::{SyncContext, SyncPhase};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPhaseReport {
    pub pushed: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Push locally-read bookmarks to the server.
///
/// The pending flag is cleared only after the server acknowledged the read;
/// failures leave it set for the next sync.
pub async fn push_read_status(ctx: &SyncContext<'_>) -> Result<ReadPhaseReport> {
    let pending = ctx.repo.bookmarks_needing_read_sync().await?;
    if !pending.is_empty() {
        tracing::info!("Pushing read status for {} bookmarks", pending.len());
    }

    let run = isolate_each(
        ctx,
        Some(SyncPhase::ReadStatus),
        pending,
        |bookmark| bookmark.id,
        |bookmark| async move {
            ctx.remote.mark_read(bookmark.id).await?;
            ctx.repo.confirm_read_synced(bookmark.id).await
        },
    )
    .await;

    Ok(ReadPhaseReport {
        pushed: run.succeeded(),
        failed: run.failed(),
        interrupted: run.interrupted,
    })
}
