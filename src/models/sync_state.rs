use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two remote listings a pass walks, in the order they are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Unarchived,
    Archived,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Unarchived, Collection::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Unarchived => "unarchived",
            Collection::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unarchived" => Some(Collection::Unarchived),
            "archived" => Some(Collection::Archived),
            _ => None,
        }
    }
}

/// Persisted paging progress for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionProgress {
    pub collection: Collection,
    /// Offset of the next page to fetch.
    pub offset: u64,
    /// Identifiers seen so far in the current full pass.
    pub observed_ids: BTreeSet<i64>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl CollectionProgress {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            offset: 0,
            observed_ids: BTreeSet::new(),
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Whether a full pass has been started and not yet committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassState {
    #[default]
    Idle,
    FullInProgress,
}

impl PassState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::FullInProgress => "full-in-progress",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "full-in-progress" => PassState::FullInProgress,
            _ => PassState::Idle,
        }
    }
}

/// The kind of pass the next sync will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassMode {
    /// No watermark and no pass underway: enumerate everything from offset 0.
    Full,
    /// No watermark, but an earlier full pass was interrupted: continue from the saved offsets.
    ResumedFull,
    /// Only items modified since the watermark.
    Incremental,
}

impl PassMode {
    /// Full passes observe every remote identifier and may reap orphans.
    pub fn is_full(&self) -> bool {
        matches!(self, PassMode::Full | PassMode::ResumedFull)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PassMode::Full => "full",
            PassMode::ResumedFull => "resumed-full",
            PassMode::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncMeta {
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub pass: PassState,
    /// When the current full pass began; the watermark it will commit.
    pub pass_started_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub meta: SyncMeta,
    pub unarchived: CollectionProgress,
    pub archived: CollectionProgress,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            meta: SyncMeta::default(),
            unarchived: CollectionProgress::new(Collection::Unarchived),
            archived: CollectionProgress::new(Collection::Archived),
        }
    }
}

impl SyncState {
    pub fn pass_mode(&self) -> PassMode {
        if self.meta.last_sync_timestamp.is_some() {
            PassMode::Incremental
        } else if self.meta.pass == PassState::FullInProgress {
            PassMode::ResumedFull
        } else {
            PassMode::Full
        }
    }

    pub fn progress(&self, collection: Collection) -> &CollectionProgress {
        match collection {
            Collection::Unarchived => &self.unarchived,
            Collection::Archived => &self.archived,
        }
    }

    pub fn progress_mut(&mut self, collection: Collection) -> &mut CollectionProgress {
        match collection {
            Collection::Unarchived => &mut self.unarchived,
            Collection::Archived => &mut self.archived,
        }
    }

    /// Identifiers observed in either collection during the current full pass.
    pub fn observed_union(&self) -> BTreeSet<i64> {
        self.unarchived
            .observed_ids
            .union(&self.archived.observed_ids)
            .copied()
            .collect()
    }
}
