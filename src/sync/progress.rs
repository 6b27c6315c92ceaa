use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Bookmarks,
    ArchivedBookmarks,
    Assets,
    ReadStatus,
    Complete,
}

impl SyncPhase {
    pub fn for_collection(collection: Collection) -> Self {
        match collection {
            Collection::Unarchived => SyncPhase::Bookmarks,
            Collection::Archived => SyncPhase::ArchivedBookmarks,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Bookmarks => "bookmarks",
            SyncPhase::ArchivedBookmarks => "archived-bookmarks",
            SyncPhase::Assets => "assets",
            SyncPhase::ReadStatus => "read-status",
            SyncPhase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub sync_id: Uuid,
    pub phase: SyncPhase,
    pub current: u64,
    /// Unknown until the service reports a count.
    pub total: Option<u64>,
}

/// Publishes progress for one sync to every subscriber.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: broadcast::Sender<SyncProgress>,
    sync_id: Uuid,
}

impl ProgressReporter {
    pub fn new(sender: broadcast::Sender<SyncProgress>, sync_id: Uuid) -> Self {
        Self { sender, sync_id }
    }

    pub fn emit(&self, phase: SyncPhase, current: u64, total: Option<u64>) {
        let event = SyncProgress {
            sync_id: self.sync_id,
            phase,
            current,
            total,
        };
        if self.sender.send(event).is_err() {
            tracing::trace!("No progress subscribers for {}", phase);
        }
    }
}
