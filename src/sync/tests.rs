use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{broadcast, Notify};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Repository;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    AssetStatus, Bookmark, Collection, PassMode, PassState, ReadingMode, RemoteAsset,
    RemoteBookmark,
};
use crate::services::{BookmarkPage, RemoteApi};

use super::reaper::reap_orphans;
use super::{
    ProgressReporter, RetryDecision, SyncContext, SyncEngine, SyncPhase, SyncSettings, SyncStatus,
};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, minute, 0).unwrap()
}

fn bookmark(id: i64, modified: DateTime<Utc>) -> RemoteBookmark {
    RemoteBookmark {
        id,
        url: format!("https://example.com/{id}"),
        title: format!("Remote {id}"),
        description: String::new(),
        notes: String::new(),
        website_title: None,
        tag_names: vec![],
        is_archived: false,
        unread: true,
        date_added: at(0),
        date_modified: modified,
    }
}

fn archived(id: i64, modified: DateTime<Utc>) -> RemoteBookmark {
    RemoteBookmark {
        is_archived: true,
        ..bookmark(id, modified)
    }
}

fn snapshot(id: i64, bookmark_id: i64) -> RemoteAsset {
    RemoteAsset {
        id,
        bookmark_id,
        asset_type: "snapshot".to_string(),
        content_type: "text/html".to_string(),
        display_name: format!("Snapshot {id}"),
        file_size: Some(64),
        status: AssetStatus::Complete,
        date_created: at(1),
    }
}

#[derive(Default)]
struct FakeState {
    unarchived: Vec<RemoteBookmark>,
    archived: Vec<RemoteBookmark>,
    assets: HashMap<i64, Vec<RemoteAsset>>,
    failing_downloads: HashSet<i64>,
    failing_reads: HashSet<i64>,
    fail_listing: Option<(Collection, u64, u16)>,
    /// Cancel this token when serving the listing call with this index.
    cancel_on_call: Option<(usize, CancellationToken)>,
    list_calls: Vec<(Collection, u64, Option<DateTime<Utc>>)>,
    read_pushes: Vec<i64>,
    downloads: Vec<(i64, i64)>,
}

/// In-memory bookmark service.
#[derive(Default)]
struct FakeRemote {
    state: Mutex<FakeState>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRemote {
    fn with(unarchived: Vec<RemoteBookmark>, archived: Vec<RemoteBookmark>) -> Arc<Self> {
        let remote = Self::default();
        {
            let mut state = remote.state.lock().unwrap();
            state.unarchived = unarchived;
            state.archived = archived;
        }
        Arc::new(remote)
    }

    fn edit(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Make the next listing call wait until the returned handle is notified.
    fn hold_next_listing(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    fn list_calls(&self) -> Vec<(Collection, u64, Option<DateTime<Utc>>)> {
        self.state.lock().unwrap().list_calls.clone()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list_bookmarks(
        &self,
        collection: Collection,
        limit: u32,
        offset: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<BookmarkPage> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        let call = state.list_calls.len();
        state.list_calls.push((collection, offset, since));

        if let Some((token_call, token)) = &state.cancel_on_call {
            if *token_call == call {
                token.cancel();
            }
        }
        if let Some((fail_collection, fail_offset, status)) = state.fail_listing {
            if fail_collection == collection && fail_offset == offset {
                return Err(AppError::Api {
                    status,
                    message: "listing failed".to_string(),
                });
            }
        }

        let source = match collection {
            Collection::Unarchived => &state.unarchived,
            Collection::Archived => &state.archived,
        };
        let matching: Vec<RemoteBookmark> = source
            .iter()
            .filter(|b| since.map_or(true, |since| b.date_modified >= since))
            .cloned()
            .collect();
        let start = (offset as usize).min(matching.len());
        let end = (start + limit as usize).min(matching.len());

        Ok(BookmarkPage {
            items: matching[start..end].to_vec(),
            has_next: end < matching.len(),
            count: Some(matching.len() as u64),
        })
    }

    async fn list_assets(&self, bookmark_id: i64) -> Result<Vec<RemoteAsset>> {
        let state = self.state.lock().unwrap();
        Ok(state.assets.get(&bookmark_id).cloned().unwrap_or_default())
    }

    async fn download_asset(&self, bookmark_id: i64, asset_id: i64) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.downloads.push((bookmark_id, asset_id));
        if state.failing_downloads.contains(&bookmark_id) {
            return Err(AppError::Api {
                status: 502,
                message: "download failed".to_string(),
            });
        }
        Ok(format!("asset {asset_id}").into_bytes())
    }

    async fn mark_read(&self, bookmark_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_reads.contains(&bookmark_id) {
            return Err(AppError::Api {
                status: 500,
                message: "read push failed".to_string(),
            });
        }
        state.read_pushes.push(bookmark_id);
        Ok(())
    }
}

async fn setup(remote: &Arc<FakeRemote>) -> (Arc<Repository>, Arc<SyncEngine>) {
    let repo = Arc::new(Repository::in_memory().await.unwrap());
    let engine = Arc::new(SyncEngine::new(Arc::clone(&repo), remote.clone()));
    (repo, engine)
}

fn settings(page_size: u32) -> SyncSettings {
    SyncSettings {
        page_size,
        yield_every: 1,
        ..SyncSettings::default()
    }
}

async fn local_ids(repo: &Repository) -> BTreeSet<i64> {
    repo.all_bookmark_ids().await.unwrap().into_iter().collect()
}

fn ids(range: impl IntoIterator<Item = i64>) -> BTreeSet<i64> {
    range.into_iter().collect()
}

#[tokio::test]
async fn first_sync_is_a_full_pass_that_commits_the_watermark() {
    let remote = FakeRemote::with(
        (1..=5).map(|id| bookmark(id, at(10))).collect(),
        vec![archived(6, at(10)), archived(7, at(10))],
    );
    let (repo, engine) = setup(&remote).await;

    let report = assert_ok!(engine.run_sync(settings(2)).await);

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.mode, Some(PassMode::Full));
    assert_eq!(report.processed_count, 7);
    assert_eq!(local_ids(&repo).await, ids(1..=7));
    assert!(repo.get_bookmark(6).await.unwrap().unwrap().is_archived);

    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.last_sync_timestamp, report.watermark);
    assert_eq!(state.meta.pass, PassState::Idle);
    assert_eq!(state.unarchived.offset, 0);
    assert!(state.observed_union().is_empty());
    assert!(remote.list_calls().iter().all(|(_, _, since)| since.is_none()));
}

#[tokio::test]
async fn unchanged_data_makes_the_next_sync_a_no_op() {
    let remote = FakeRemote::with((1..=3).map(|id| bookmark(id, at(10))).collect(), vec![]);
    let (repo, engine) = setup(&remote).await;

    let first = engine.run_sync(settings(2)).await.unwrap();
    let before: Vec<Bookmark> = repo.list_bookmarks(None).await.unwrap();

    let second = engine.run_sync(settings(2)).await.unwrap();

    assert_eq!(second.mode, Some(PassMode::Incremental));
    assert_eq!(second.processed_count, 0);
    assert!(second.watermark >= first.watermark);
    assert_eq!(repo.list_bookmarks(None).await.unwrap(), before);

    let incremental_calls: Vec<_> = remote.list_calls().into_iter().skip(3).collect();
    assert!(!incremental_calls.is_empty());
    assert!(incremental_calls
        .iter()
        .all(|(_, offset, since)| *offset == 0 && *since == first.watermark));
}

#[tokio::test]
async fn interrupted_full_pass_resumes_and_matches_an_uninterrupted_one() {
    let unarchived: Vec<RemoteBookmark> = (1..=6).map(|id| bookmark(id, at(10))).collect();
    let remote = FakeRemote::with(unarchived.clone(), vec![archived(7, at(10))]);
    let (repo, engine) = setup(&remote).await;

    // A local leftover that the server no longer has
    let mut stale = Bookmark::from_remote(&bookmark(99, at(5)));
    stale.title = "Stale".to_string();
    repo.put_bookmark(stale).await.unwrap();

    let cancel = CancellationToken::new();
    remote.edit(|s| s.cancel_on_call = Some((2, cancel.clone())));

    let report = engine.run_with_token(settings(2), cancel).await.unwrap();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.watermark, None);
    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.pass, PassState::FullInProgress);
    assert_eq!(state.meta.last_sync_timestamp, None);
    assert_eq!(state.unarchived.offset, 4);
    assert_eq!(state.unarchived.observed_ids, ids(1..=4));
    assert!(local_ids(&repo).await.contains(&99));

    remote.edit(|s| s.cancel_on_call = None);
    let resumed = engine.run_sync(settings(2)).await.unwrap();

    assert_eq!(resumed.status, SyncStatus::Completed);
    assert_eq!(resumed.mode, Some(PassMode::ResumedFull));
    assert_eq!(resumed.processed_count, 3);
    assert_eq!(resumed.reaped.deleted, 1);
    let calls = remote.list_calls();
    assert_eq!(calls[3], (Collection::Unarchived, 4, None));

    // Same end state as a clean run against a fresh replica
    let clean_remote = FakeRemote::with(unarchived, vec![archived(7, at(10))]);
    let (clean_repo, clean_engine) = setup(&clean_remote).await;
    clean_engine.run_sync(settings(2)).await.unwrap();
    assert_eq!(
        repo.list_bookmarks(None).await.unwrap(),
        clean_repo.list_bookmarks(None).await.unwrap()
    );
}

#[tokio::test]
async fn transient_listing_failure_keeps_progress_and_schedules_a_retry() {
    let remote = FakeRemote::with((1..=5).map(|id| bookmark(id, at(10))).collect(), vec![]);
    remote.edit(|s| s.fail_listing = Some((Collection::Unarchived, 2, 503)));
    let (repo, engine) = setup(&remote).await;

    let report = engine.run_sync(settings(2)).await.unwrap();

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.error_kind, Some(ErrorKind::Transient));
    assert_eq!(
        report.retry,
        Some(RetryDecision::RetryAfter(Duration::from_secs(5)))
    );

    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.last_sync_timestamp, None);
    assert_eq!(state.meta.retry_count, 1);
    assert!(state.meta.last_error.is_some());
    assert_eq!(state.unarchived.offset, 2);
    assert_eq!(state.unarchived.retry_count, 1);
    assert_eq!(local_ids(&repo).await, ids(1..=2));

    // Scheduled retries walk the schedule without resetting it
    let scheduled = SyncSettings {
        manual: false,
        ..settings(2)
    };
    let again = engine.run_sync(scheduled.clone()).await.unwrap();
    assert_eq!(
        again.retry,
        Some(RetryDecision::RetryAfter(Duration::from_secs(15)))
    );
    assert_eq!(remote.list_calls().last(), Some(&(Collection::Unarchived, 2, None)));
    engine.run_sync(scheduled.clone()).await.unwrap();
    engine.run_sync(scheduled.clone()).await.unwrap();
    let exhausted = engine.run_sync(scheduled).await.unwrap();
    assert_eq!(exhausted.retry, Some(RetryDecision::Exhausted));

    remote.edit(|s| s.fail_listing = None);
    let recovered = engine.run_sync(settings(2)).await.unwrap();
    assert_eq!(recovered.mode, Some(PassMode::ResumedFull));
    assert!(recovered.success());
    assert_eq!(local_ids(&repo).await, ids(1..=5));
    assert_eq!(repo.load_sync_state().await.unwrap().meta.retry_count, 0);
}

#[tokio::test]
async fn fatal_failure_is_not_retried() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    remote.edit(|s| s.fail_listing = Some((Collection::Unarchived, 0, 401)));
    let (repo, engine) = setup(&remote).await;

    let report = engine.run_sync(settings(10)).await.unwrap();

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.error_kind, Some(ErrorKind::Fatal));
    assert_eq!(report.retry, Some(RetryDecision::NotRetryable));
    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.retry_count, 0);
    assert!(state.meta.last_error.is_some());
}

#[tokio::test]
async fn last_write_wins_with_ties_kept_local() {
    let remote = FakeRemote::with(
        vec![
            bookmark(1, at(10)),
            bookmark(2, at(20)),
            bookmark(3, at(30)),
        ],
        vec![],
    );
    let (repo, engine) = setup(&remote).await;

    for (id, modified) in [(1, at(20)), (2, at(20)), (3, at(20))] {
        let mut local = Bookmark::from_remote(&bookmark(id, modified));
        local.title = "Local".to_string();
        local.read_progress = 0.5;
        local.reading_mode = Some(ReadingMode::Original);
        repo.put_bookmark(local).await.unwrap();
    }

    let report = engine.run_sync(settings(10)).await.unwrap();
    assert_eq!(report.processed_count, 1);

    let older = repo.get_bookmark(1).await.unwrap().unwrap();
    let tied = repo.get_bookmark(2).await.unwrap().unwrap();
    let newer = repo.get_bookmark(3).await.unwrap().unwrap();
    assert_eq!(older.title, "Local");
    assert_eq!(tied.title, "Local");
    assert_eq!(newer.title, "Remote 3");
    assert_eq!(newer.date_modified, at(30));
    assert_eq!(newer.read_progress, 0.5);
    assert_eq!(newer.reading_mode, Some(ReadingMode::Original));
}

#[tokio::test]
async fn only_full_passes_remove_orphans() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10)), bookmark(2, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    engine.run_sync(settings(10)).await.unwrap();

    remote.edit(|s| s.unarchived.retain(|b| b.id != 1));

    let incremental = engine.run_sync(settings(10)).await.unwrap();
    assert_eq!(incremental.mode, Some(PassMode::Incremental));
    assert_eq!(incremental.reaped.deleted, 0);
    assert_eq!(local_ids(&repo).await, ids([1, 2]));

    let full = engine
        .run_sync(SyncSettings {
            force_full: true,
            ..settings(10)
        })
        .await
        .unwrap();
    assert_eq!(full.mode, Some(PassMode::Full));
    assert_eq!(full.reaped.deleted, 1);
    assert_eq!(local_ids(&repo).await, ids([2]));
}

#[tokio::test]
async fn bookmark_moving_between_collections_is_not_reaped() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    engine.run_sync(settings(10)).await.unwrap();

    remote.edit(|s| {
        s.unarchived.clear();
        s.archived.push(archived(1, at(40)));
    });
    let report = engine
        .run_sync(SyncSettings {
            force_full: true,
            ..settings(10)
        })
        .await
        .unwrap();

    assert_eq!(report.reaped.deleted, 0);
    assert!(repo.get_bookmark(1).await.unwrap().unwrap().is_archived);
}

#[tokio::test]
async fn one_failing_asset_does_not_fail_the_sync() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10)), bookmark(2, at(10))], vec![]);
    remote.edit(|s| {
        s.assets.insert(1, vec![snapshot(11, 1)]);
        s.assets.insert(2, vec![snapshot(21, 2)]);
        s.failing_downloads.insert(1);
    });
    let (repo, engine) = setup(&remote).await;

    let report = engine.run_sync(settings(10)).await.unwrap();

    assert!(report.success());
    assert_eq!(report.assets.synced, 1);
    assert_eq!(report.assets.failed, 1);
    assert!(repo.get_bookmark(1).await.unwrap().unwrap().needs_asset_sync);
    assert!(!repo.get_bookmark(2).await.unwrap().unwrap().needs_asset_sync);
    assert!(repo.get_assets(2).await.unwrap()[0].is_cached());
    assert!(!repo.get_assets(1).await.unwrap()[0].is_cached());

    // The flagged bookmark is retried on the next sync, even without remote changes
    remote.edit(|s| {
        s.failing_downloads.clear();
        s.downloads.clear();
    });
    let retry = engine.run_sync(settings(10)).await.unwrap();
    assert_eq!(retry.processed_count, 0);
    assert_eq!(retry.assets.synced, 1);
    assert_eq!(remote.state.lock().unwrap().downloads, vec![(1, 11)]);
    assert!(!repo.get_bookmark(1).await.unwrap().unwrap().needs_asset_sync);
}

#[tokio::test]
async fn archiving_a_bookmark_drops_its_cached_content() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    remote.edit(|s| {
        s.assets.insert(1, vec![snapshot(11, 1)]);
    });
    let (repo, engine) = setup(&remote).await;
    engine.run_sync(settings(10)).await.unwrap();
    assert!(repo.get_assets(1).await.unwrap()[0].is_cached());

    let moved = archived(1, Utc::now() + chrono::Duration::hours(1));
    remote.edit(|s| {
        s.unarchived.clear();
        s.archived.push(moved);
    });
    engine.run_sync(settings(10)).await.unwrap();

    let local = repo.get_bookmark(1).await.unwrap().unwrap();
    assert!(local.is_archived);
    assert!(!local.needs_asset_sync);
    let assets = repo.get_assets(1).await.unwrap();
    assert_eq!(assets.len(), 1);
    assert!(!assets[0].is_cached());
}

#[tokio::test]
async fn local_reads_are_pushed_and_failures_stay_pending() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10)), bookmark(2, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    engine.run_sync(settings(10)).await.unwrap();

    repo.mark_read_locally(1, at(50)).await.unwrap();
    repo.mark_read_locally(2, at(50)).await.unwrap();
    remote.edit(|s| {
        s.failing_reads.insert(2);
    });

    let report = engine.run_sync(settings(10)).await.unwrap();

    assert!(report.success());
    assert_eq!(report.read_status.pushed, 1);
    assert_eq!(report.read_status.failed, 1);
    assert_eq!(remote.state.lock().unwrap().read_pushes, vec![1]);
    let pushed = repo.get_bookmark(1).await.unwrap().unwrap();
    assert!(!pushed.needs_read_sync && !pushed.unread);
    let pending = repo.get_bookmark(2).await.unwrap().unwrap();
    assert!(pending.needs_read_sync);
    assert_eq!(pending.last_read_at, Some(at(50)));
}

#[tokio::test]
async fn pending_read_survives_a_newer_remote_edit() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    engine.run_sync(settings(10)).await.unwrap();
    repo.mark_read_locally(1, at(50)).await.unwrap();

    let mut edited = bookmark(1, Utc::now() + chrono::Duration::hours(1));
    edited.title = "Edited".to_string();
    remote.edit(|s| {
        s.unarchived = vec![edited];
        s.failing_reads.insert(1);
    });
    engine.run_sync(settings(10)).await.unwrap();

    let local = repo.get_bookmark(1).await.unwrap().unwrap();
    assert_eq!(local.title, "Edited");
    assert!(local.needs_read_sync);
    assert!(!local.unread);
    assert_eq!(local.last_read_at, Some(at(50)));
}

#[tokio::test]
async fn second_sync_is_rejected_while_one_runs() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (_repo, engine) = setup(&remote).await;
    let gate = remote.hold_next_listing();

    let ticket = engine.start_sync(settings(10)).await.unwrap();
    assert!(engine.is_syncing());
    assert!(matches!(
        engine.run_sync(settings(10)).await,
        Err(AppError::AlreadyRunning)
    ));
    assert!(matches!(
        engine.start_sync(settings(10)).await,
        Err(AppError::AlreadyRunning)
    ));

    gate.notify_one();
    let report = ticket.wait().await.unwrap();
    assert!(report.success());
    assert!(!engine.is_syncing());
    assert!(engine.run_sync(settings(10)).await.is_ok());
}

#[tokio::test]
async fn cancel_sync_stops_the_running_sync() {
    let remote = FakeRemote::with((1..=4).map(|id| bookmark(id, at(10))).collect(), vec![]);
    let (repo, engine) = setup(&remote).await;
    let gate = remote.hold_next_listing();

    let ticket = engine.start_sync(settings(2)).await.unwrap();
    assert!(engine.cancel_sync());
    gate.notify_one();
    let report = ticket.wait().await.unwrap();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(report.retry, None);
    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.last_sync_timestamp, None);
    assert_eq!(state.meta.last_error, None);
    assert!(!engine.cancel_sync());
}

#[tokio::test]
async fn pause_blocks_only_scheduled_syncs() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    repo.set_paused(true).await.unwrap();

    let scheduled = SyncSettings {
        manual: false,
        ..settings(10)
    };
    let err = assert_err!(engine.run_sync(scheduled.clone()).await);
    assert!(matches!(err, AppError::Paused));
    assert!(remote.list_calls().is_empty());

    assert!(engine.run_sync(settings(10)).await.unwrap().success());

    repo.set_paused(false).await.unwrap();
    assert!(engine.run_sync(scheduled).await.unwrap().success());
}

#[tokio::test]
async fn zero_page_size_is_rejected_as_fatal() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (_repo, engine) = setup(&remote).await;

    let report = engine.run_sync(settings(0)).await.unwrap();

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.error_kind, Some(ErrorKind::Fatal));
    assert!(remote.list_calls().is_empty());
}

#[tokio::test]
async fn progress_is_published_for_every_phase() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![archived(2, at(10))]);
    remote.edit(|s| {
        s.assets.insert(1, vec![snapshot(11, 1)]);
    });
    let (_repo, engine) = setup(&remote).await;
    let mut rx = engine.subscribe();

    let report = engine.run_sync(settings(10)).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.iter().all(|e| e.sync_id == report.sync_id));
    for phase in [
        SyncPhase::Bookmarks,
        SyncPhase::ArchivedBookmarks,
        SyncPhase::Assets,
    ] {
        assert!(events.iter().any(|e| e.phase == phase), "no {phase} events");
    }
    assert_eq!(events.last().map(|e| e.phase), Some(SyncPhase::Complete));
}

#[tokio::test]
async fn resume_state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.db");
    let path = path.to_str().unwrap();
    let remote = FakeRemote::with((1..=6).map(|id| bookmark(id, at(10))).collect(), vec![]);

    {
        let repo = Arc::new(Repository::new(path).await.unwrap());
        let engine = SyncEngine::new(Arc::clone(&repo), remote.clone());
        let cancel = CancellationToken::new();
        remote.edit(|s| s.cancel_on_call = Some((1, cancel.clone())));
        let report = engine.run_with_token(settings(2), cancel).await.unwrap();
        assert_eq!(report.status, SyncStatus::Cancelled);
    }

    remote.edit(|s| s.cancel_on_call = None);
    let repo = Arc::new(Repository::new(path).await.unwrap());
    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.pass, PassState::FullInProgress);
    assert_eq!(state.unarchived.offset, 2);

    let engine = SyncEngine::new(Arc::clone(&repo), remote.clone());
    let report = engine.run_sync(settings(2)).await.unwrap();
    assert_eq!(report.mode, Some(PassMode::ResumedFull));
    assert_eq!(local_ids(&repo).await, ids(1..=6));
}

#[tokio::test]
async fn edits_made_while_a_full_pass_was_suspended_are_not_lost() {
    let remote = FakeRemote::with((1..=4).map(|id| bookmark(id, at(10))).collect(), vec![]);
    let (repo, engine) = setup(&remote).await;
    let exact = SyncSettings {
        watermark_margin: Duration::ZERO,
        ..settings(2)
    };

    let cancel = CancellationToken::new();
    remote.edit(|s| s.cancel_on_call = Some((1, cancel.clone())));
    let report = engine.run_with_token(exact.clone(), cancel).await.unwrap();
    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(local_ids(&repo).await, ids([1, 2]));
    let pass_started_at = repo.load_sync_state().await.unwrap().meta.pass_started_at;
    assert!(pass_started_at.is_some());

    // Bookmark 1 was already fetched; the resumed pass will not see it again
    remote.edit(|s| {
        s.cancel_on_call = None;
        s.unarchived[0].title = "Edited while suspended".to_string();
        s.unarchived[0].date_modified = Utc::now();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let resumed = engine.run_sync(exact.clone()).await.unwrap();
    assert_eq!(resumed.mode, Some(PassMode::ResumedFull));
    assert_eq!(resumed.watermark, pass_started_at);
    assert_eq!(repo.load_sync_state().await.unwrap().meta.pass_started_at, None);

    for _ in 0..2 {
        let incremental = engine.run_sync(exact.clone()).await.unwrap();
        assert_eq!(incremental.mode, Some(PassMode::Incremental));
    }
    assert_eq!(
        repo.get_bookmark(1).await.unwrap().unwrap().title,
        "Edited while suspended"
    );
}

#[tokio::test]
async fn watermark_leaves_room_for_a_server_clock_behind_ours() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    let margin = chrono::Duration::seconds(60);

    let before = Utc::now();
    let report = engine.run_sync(settings(10)).await.unwrap();
    let watermark = report.watermark.unwrap();
    assert!(watermark >= before - margin);
    assert!(watermark <= Utc::now() - margin);

    // Stamped by a server clock running 30s behind the local one
    remote.edit(|s| {
        s.unarchived[0].title = "Edited".to_string();
        s.unarchived[0].date_modified = Utc::now() - chrono::Duration::seconds(30);
    });
    let next = engine.run_sync(settings(10)).await.unwrap();

    assert_eq!(next.mode, Some(PassMode::Incremental));
    assert_eq!(next.processed_count, 1);
    assert_eq!(repo.get_bookmark(1).await.unwrap().unwrap().title, "Edited");
}

const BLOCK_DELETE_OF_2: &str = "CREATE TRIGGER block_delete BEFORE DELETE ON bookmarks \
     WHEN OLD.id = 2 BEGIN SELECT RAISE(ABORT, 'bookmark is locked'); END;";

#[tokio::test]
async fn reaper_skips_deletions_that_fail() {
    let repo = Repository::in_memory().await.unwrap();
    for id in 1..=4 {
        repo.put_bookmark(Bookmark::from_remote(&bookmark(id, at(10))))
            .await
            .unwrap();
    }
    repo.execute_batch(BLOCK_DELETE_OF_2).await.unwrap();

    let remote = FakeRemote::with(vec![], vec![]);
    let cancel = CancellationToken::new();
    let (tx, _) = broadcast::channel(16);
    let progress = ProgressReporter::new(tx, Uuid::new_v4());
    let ctx = SyncContext {
        repo: &repo,
        remote: remote.as_ref(),
        cancel: &cancel,
        progress: &progress,
        yield_every: 1,
    };

    let report = reap_orphans(&ctx, &ids([1])).await.unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(local_ids(&repo).await, ids([1, 2]));
}

#[tokio::test]
async fn failed_orphan_deletion_does_not_fail_the_sync() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    for id in [2, 3] {
        repo.put_bookmark(Bookmark::from_remote(&bookmark(id, at(10))))
            .await
            .unwrap();
    }
    repo.execute_batch(BLOCK_DELETE_OF_2).await.unwrap();

    let report = engine.run_sync(settings(10)).await.unwrap();

    assert!(report.success());
    assert_eq!(report.reaped.deleted, 1);
    assert_eq!(report.reaped.failed, 1);
    assert!(report.watermark.is_some());
    assert_eq!(local_ids(&repo).await, ids([1, 2]));
}

#[tokio::test]
async fn cancelled_reap_keeps_the_pass_resumable() {
    let remote = FakeRemote::with(vec![bookmark(1, at(10)), bookmark(2, at(10))], vec![]);
    let (repo, engine) = setup(&remote).await;
    for id in [1, 2, 8, 9] {
        repo.put_bookmark(Bookmark::from_remote(&bookmark(id, at(10))))
            .await
            .unwrap();
    }
    repo.begin_full_pass(at(30)).await.unwrap();
    repo.save_page_progress(Collection::Unarchived, 2, vec![1, 2])
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, _) = broadcast::channel(16);
    let progress = ProgressReporter::new(tx, Uuid::new_v4());
    let ctx = SyncContext {
        repo: &repo,
        remote: remote.as_ref(),
        cancel: &cancel,
        progress: &progress,
        yield_every: 1,
    };
    let observed = repo.load_sync_state().await.unwrap().observed_union();

    let result = reap_orphans(&ctx, &observed).await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    let state = repo.load_sync_state().await.unwrap();
    assert_eq!(state.meta.pass, PassState::FullInProgress);
    assert_eq!(state.unarchived.observed_ids, ids([1, 2]));
    assert_eq!(local_ids(&repo).await, ids([1, 2, 8, 9]));

    let resumed = engine.run_sync(settings(10)).await.unwrap();
    assert_eq!(resumed.mode, Some(PassMode::ResumedFull));
    assert_eq!(resumed.reaped.deleted, 2);
    assert_eq!(local_ids(&repo).await, ids([1, 2]));
}
