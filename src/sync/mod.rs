//! Phased reconciliation of the local replica against the bookmark service.
//!
//! A sync walks the unarchived and archived listings, reaps orphans after a
//! full pass, commits the watermark, and then runs the best-effort asset and
//! read-status phases. Everything needed to resume is written to the
//! repository as it happens.

mod assets;
mod engine;
mod fetcher;
mod isolate;
mod progress;
mod read_status;
mod reaper;
mod reconcile;
mod resolver;
mod retry;

#[cfg(test)]
mod tests;

use tokio_util::sync::CancellationToken;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::services::RemoteApi;

pub use assets::AssetPhaseReport;
pub use engine::{SyncEngine, SyncReport, SyncSettings, SyncStatus, SyncTicket};
pub use fetcher::PageCursor;
pub use isolate::{isolate_each, IsolatedRun, ItemOutcome};
pub use progress::{ProgressReporter, SyncPhase, SyncProgress};
pub use read_status::ReadPhaseReport;
pub use reaper::ReapReport;
pub use resolver::{resolve, should_apply, Resolution};
pub use retry::{Connectivity, RetryDecision, RetrySchedule};

/// Borrowed collaborators shared by every phase of one sync.
pub struct SyncContext<'a> {
    pub repo: &'a Repository,
    pub remote: &'a dyn RemoteApi,
    pub cancel: &'a CancellationToken,
    pub progress: &'a ProgressReporter,
    /// Yield to the runtime after this many items. Zero disables yielding.
    pub yield_every: usize,
}

impl SyncContext<'_> {
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub async fn maybe_yield(&self, count: usize) {
        if self.yield_every > 0 && count % self.yield_every == 0 {
            tokio::task::yield_now().await;
        }
    }
}
