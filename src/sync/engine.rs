use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{Collection, PassMode};
use crate::services::RemoteApi;

use super::assets::{sync_assets, AssetPhaseReport};
use super::progress::{ProgressReporter, SyncPhase, SyncProgress};
use super::read_status::{push_read_status, ReadPhaseReport};
use super::reaper::{reap_orphans, ReapReport};
use super::reconcile::reconcile_collection;
use super::retry::{Connectivity, RetryDecision, RetrySchedule};
use super::SyncContext;

const PROGRESS_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_WATERMARK_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub page_size: u32,
    /// Drop the watermark and any interrupted pass and enumerate everything again.
    pub force_full: bool,
    pub cache_assets: bool,
    pub push_read_status: bool,
    pub yield_every: usize,
    /// Started by the user rather than a schedule: ignores the pause flag and
    /// restores the retry budget.
    pub manual: bool,
    pub retry_schedule: RetrySchedule,
    /// Subtracted from the committed watermark to absorb clock skew against the server.
    pub watermark_margin: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            force_full: false,
            cache_assets: true,
            push_read_status: true,
            yield_every: 10,
            manual: true,
            retry_schedule: RetrySchedule::default(),
            watermark_margin: DEFAULT_WATERMARK_MARGIN,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            cache_assets: config.cache_assets,
            push_read_status: config.push_read_status,
            yield_every: config.yield_every,
            retry_schedule: RetrySchedule::from_secs(&config.retry_schedule_secs),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AppError::Config("page_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub sync_id: Uuid,
    pub status: SyncStatus,
    pub mode: Option<PassMode>,
    /// Bookmarks written by the reconciliation phases.
    pub processed_count: usize,
    pub reaped: ReapReport,
    pub assets: AssetPhaseReport,
    pub read_status: ReadPhaseReport,
    /// Watermark committed by this sync.
    pub watermark: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub retry: Option<RetryDecision>,
}

impl SyncReport {
    fn new(sync_id: Uuid) -> Self {
        Self {
            sync_id,
            status: SyncStatus::Completed,
            mode: None,
            processed_count: 0,
            reaped: ReapReport::default(),
            assets: AssetPhaseReport::default(),
            read_status: ReadPhaseReport::default(),
            watermark: None,
            error: None,
            error_kind: None,
            retry: None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

/// A sync running on its own task.
pub struct SyncTicket {
    pub id: Uuid,
    handle: JoinHandle<SyncReport>,
}

impl SyncTicket {
    pub async fn wait(self) -> Result<SyncReport> {
        let id = self.id;
        self.handle
            .await
            .map_err(|e| anyhow::anyhow!("sync task {} did not finish: {}", id, e).into())
    }
}

struct ActiveSync {
    id: Uuid,
    cancel: CancellationToken,
}

/// Releases the in-progress slot when the sync that claimed it ends.
struct ActiveGuard<'a> {
    engine: &'a SyncEngine,
    id: Uuid,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.engine.active();
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
        }
    }
}

/// A collection-phase error, tagged with the collection it happened in.
struct PhaseFailure {
    collection: Option<Collection>,
    error: AppError,
}

impl From<AppError> for PhaseFailure {
    fn from(error: AppError) -> Self {
        Self {
            collection: None,
            error,
        }
    }
}

pub struct SyncEngine {
    repo: Arc<Repository>,
    remote: Arc<dyn RemoteApi>,
    progress_tx: broadcast::Sender<SyncProgress>,
    active: Mutex<Option<ActiveSync>>,
}

impl SyncEngine {
    pub fn new(repo: Arc<Repository>, remote: Arc<dyn RemoteApi>) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            repo,
            remote,
            progress_tx,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.active().is_some()
    }

    /// Request cancellation of the running sync. Returns false if none is running.
    pub fn cancel_sync(&self) -> bool {
        match self.active().as_ref() {
            Some(active) => {
                tracing::info!("Cancelling sync {}", active.id);
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Start a sync on a background task. Rejected while another sync is running.
    pub async fn start_sync(self: &Arc<Self>, settings: SyncSettings) -> Result<SyncTicket> {
        self.check_paused(&settings).await?;
        let cancel = CancellationToken::new();
        let id = self.claim(cancel.clone())?;
        let engine = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let _guard = ActiveGuard {
                engine: &engine,
                id,
            };
            engine.execute(id, cancel, settings).await
        });

        Ok(SyncTicket { id, handle })
    }

    /// Run a sync on the current task.
    pub async fn run_sync(&self, settings: SyncSettings) -> Result<SyncReport> {
        self.run_with_token(settings, CancellationToken::new()).await
    }

    /// Run a sync on the current task, cancelled through `cancel` or [`Self::cancel_sync`].
    pub async fn run_with_token(
        &self,
        settings: SyncSettings,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        self.check_paused(&settings).await?;
        let id = self.claim(cancel.clone())?;
        let _guard = ActiveGuard { engine: self, id };
        Ok(self.execute(id, cancel, settings).await)
    }

    async fn check_paused(&self, settings: &SyncSettings) -> Result<()> {
        if !settings.manual && self.repo.load_sync_state().await?.meta.paused {
            return Err(AppError::Paused);
        }
        Ok(())
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveSync>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, cancel: CancellationToken) -> Result<Uuid> {
        let mut active = self.active();
        if active.is_some() {
            return Err(AppError::AlreadyRunning);
        }
        let id = Uuid::new_v4();
        *active = Some(ActiveSync { id, cancel });
        Ok(id)
    }

    async fn execute(&self, id: Uuid, cancel: CancellationToken, settings: SyncSettings) -> SyncReport {
        let reporter = ProgressReporter::new(self.progress_tx.clone(), id);
        let ctx = SyncContext {
            repo: self.repo.as_ref(),
            remote: self.remote.as_ref(),
            cancel: &cancel,
            progress: &reporter,
            yield_every: settings.yield_every,
        };
        let mut report = SyncReport::new(id);

        tracing::info!("Sync {} started", id);

        if let Err(failure) = self.reconcile(&ctx, &settings, &mut report).await {
            self.record_failure(&mut report, &settings, failure).await;
            reporter.emit(SyncPhase::Complete, report.processed_count as u64, None);
            return report;
        }

        // Everything below is best-effort: the watermark is already committed
        match sync_assets(&ctx, settings.cache_assets).await {
            Ok(assets) => report.assets = assets,
            Err(e) => tracing::error!("Asset sync failed: {}", e),
        }

        if settings.push_read_status && !cancel.is_cancelled() {
            match push_read_status(&ctx).await {
                Ok(read_status) => report.read_status = read_status,
                Err(e) => tracing::error!("Read-status sync failed: {}", e),
            }
        }

        if cancel.is_cancelled() {
            report.status = SyncStatus::Cancelled;
            tracing::info!("Sync {} cancelled after committing its watermark", id);
        } else {
            tracing::info!(
                "Sync {} completed: {} bookmarks updated, {} removed",
                id,
                report.processed_count,
                report.reaped.deleted
            );
        }
        reporter.emit(SyncPhase::Complete, report.processed_count as u64, None);
        report
    }

    /// Both collection phases, the reaper and the watermark commit. Any error aborts the sync.
    async fn reconcile(
        &self,
        ctx: &SyncContext<'_>,
        settings: &SyncSettings,
        report: &mut SyncReport,
    ) -> std::result::Result<(), PhaseFailure> {
        settings.validate()?;
        let started_at = Utc::now();

        if settings.manual {
            self.repo.reset_retry_count().await?;
        }
        if settings.force_full {
            tracing::info!("Abandoning watermark for a fresh full pass");
            self.repo.abandon_for_full_pass().await?;
        }

        let mut state = self.repo.load_sync_state().await?;
        let mode = state.pass_mode();
        report.mode = Some(mode);

        match mode {
            PassMode::Full => {
                self.repo.begin_full_pass(started_at).await?;
                state = self.repo.load_sync_state().await?;
            }
            PassMode::ResumedFull => {
                tracing::info!(
                    "Resuming full pass at offsets {}/{} with {} identifiers observed",
                    state.unarchived.offset,
                    state.archived.offset,
                    state.observed_union().len()
                );
            }
            PassMode::Incremental => {
                self.repo.reset_offsets().await?;
                for collection in Collection::ALL {
                    state.progress_mut(collection).offset = 0;
                }
            }
        }

        let since = match mode {
            PassMode::Incremental => state.meta.last_sync_timestamp,
            PassMode::Full | PassMode::ResumedFull => None,
        };
        // Pages fetched before an interruption are not fetched again, so a
        // full pass commits the time it began rather than when it finished
        let pass_started_at = match mode {
            PassMode::Incremental => started_at,
            PassMode::Full | PassMode::ResumedFull => {
                state.meta.pass_started_at.unwrap_or_else(|| {
                    tracing::warn!(
                        "Full pass has no recorded start, using {}",
                        started_at.to_rfc3339()
                    );
                    started_at
                })
            }
        };
        let margin = chrono::Duration::from_std(settings.watermark_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let watermark = pass_started_at - margin;

        for collection in Collection::ALL {
            let progress = state.progress(collection).clone();
            let outcome = reconcile_collection(ctx, progress, mode, since, settings.page_size)
                .await
                .map_err(|error| PhaseFailure {
                    collection: Some(collection),
                    error,
                })?;
            report.processed_count += outcome.processed;
            *state.progress_mut(collection) = outcome.progress;
        }

        if mode.is_full() {
            report.reaped = reap_orphans(ctx, &state.observed_union()).await?;
        }

        ctx.check_cancelled()?;
        self.repo.commit_watermark(watermark).await?;
        report.watermark = Some(watermark);
        tracing::info!("Committed watermark {}", watermark.to_rfc3339());

        Ok(())
    }

    async fn record_failure(
        &self,
        report: &mut SyncReport,
        settings: &SyncSettings,
        failure: PhaseFailure,
    ) {
        let kind = failure.error.kind();
        report.error_kind = Some(kind);

        if kind == ErrorKind::Cancelled {
            report.status = SyncStatus::Cancelled;
            tracing::info!("Sync {} cancelled; progress kept for the next run", report.sync_id);
            return;
        }

        report.status = SyncStatus::Failed;
        let message = failure.error.to_string();
        report.error = Some(message.clone());
        tracing::error!("Sync {} failed: {}", report.sync_id, message);

        let connectivity = if failure.error.is_offline() {
            Connectivity::Offline
        } else {
            Connectivity::Unknown
        };

        match self
            .repo
            .record_failure(failure.collection, message, kind == ErrorKind::Transient)
            .await
        {
            Ok(retry_count) => {
                report.retry = Some(settings.retry_schedule.decide(kind, retry_count, connectivity));
            }
            Err(e) => {
                tracing::error!("Could not persist sync failure: {}", e);
                report.retry = Some(RetryDecision::NotRetryable);
            }
        }
    }
}
