use std::collections::BTreeSet;

use crate::error::{AppError, Result};

use super::isolate::isolate_each;
use super::SyncContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub candidates: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Delete local bookmarks that neither remote collection listed during a full pass.
///
/// Individual deletions that fail are logged and skipped. Cancellation stops
/// the reaper and is reported as `Cancelled`; the observed identifiers stay
/// persisted, so the resumed pass reaps the rest.
pub async fn reap_orphans(ctx: &SyncContext<'_>, observed: &BTreeSet<i64>) -> Result<ReapReport> {
    let candidates: Vec<i64> = ctx
        .repo
        .all_bookmark_ids()
        .await?
        .into_iter()
        .filter(|id| !observed.contains(id))
        .collect();

    if candidates.is_empty() {
        return Ok(ReapReport::default());
    }

    tracing::info!("Removing {} bookmarks no longer on the server", candidates.len());

    let repo = ctx.repo;
    let run = isolate_each(
        ctx,
        None,
        candidates.clone(),
        |id| *id,
        |id| async move {
            repo.delete_bookmark(id).await?;
            Ok::<(), AppError>(())
        },
    )
    .await;

    if run.interrupted {
        return Err(AppError::Cancelled);
    }

    Ok(ReapReport {
        candidates: candidates.len(),
        deleted: run.succeeded(),
        failed: run.failed(),
    })
}
