use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use linkmirror::config::Config;
use linkmirror::db::Repository;
use linkmirror::error::{AppError, Result};
use linkmirror::models::ReadingMode;
use linkmirror::services::LinkdingClient;
use linkmirror::sync::{
    RetryDecision, SyncEngine, SyncPhase, SyncProgress, SyncReport, SyncSettings, SyncStatus,
};

pub struct App {
    config: Config,
    pub repository: Arc<Repository>,
    // None until server_url and api_token are configured
    engine: Option<Arc<SyncEngine>>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);

        let engine = match config.credentials() {
            Ok((url, token)) => {
                let client = LinkdingClient::new(url, token.to_string())?;
                Some(Arc::new(SyncEngine::new(
                    Arc::clone(&repository),
                    Arc::new(client),
                )))
            }
            Err(e) => {
                tracing::debug!("Sync unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            repository,
            engine,
        })
    }

    fn engine(&self) -> Result<&Arc<SyncEngine>> {
        match &self.engine {
            Some(engine) => Ok(engine),
            None => {
                // Surface exactly which setting is missing
                self.config.credentials()?;
                Err(AppError::Config("sync is not configured".to_string()))
            }
        }
    }

    /// Run one sync in the foreground. Ctrl-C cancels it.
    pub async fn sync_once(&self, force_full: bool) -> Result<()> {
        let engine = self.engine()?;
        let mut settings = SyncSettings::from_config(&self.config);
        settings.force_full = force_full;

        let printer = tokio::spawn(print_progress(engine.subscribe()));
        let ticket = engine.start_sync(settings).await?;

        let wait = ticket.wait();
        tokio::pin!(wait);
        let report = tokio::select! {
            report = &mut wait => report?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCancelling sync...");
                engine.cancel_sync();
                wait.await?
            }
        };
        printer.abort();
        eprintln!();

        print_report(&report);
        match report.status {
            SyncStatus::Failed => Err(anyhow::anyhow!(
                "sync failed: {}",
                report.error.unwrap_or_default()
            )
            .into()),
            SyncStatus::Completed | SyncStatus::Cancelled => Ok(()),
        }
    }

    /// Sync on an interval until Ctrl-C, following the retry schedule after failures.
    pub async fn watch(&self) -> Result<()> {
        let engine = self.engine()?;
        let interval = Duration::from_secs(u64::from(self.config.sync_interval_minutes.max(1)) * 60);
        let mut manual = true;

        loop {
            let mut settings = SyncSettings::from_config(&self.config);
            settings.manual = manual;
            manual = false;

            let cancel = CancellationToken::new();
            let run = engine.run_with_token(settings, cancel.clone());
            tokio::pin!(run);
            let mut stopping = false;
            let result = tokio::select! {
                result = &mut run => result,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    stopping = true;
                    run.await
                }
            };

            let wait = match result {
                Ok(report) => {
                    print_report(&report);
                    match report.retry {
                        Some(RetryDecision::RetryAfter(delay)) => {
                            tracing::warn!("Retrying in {}s", delay.as_secs());
                            delay
                        }
                        Some(RetryDecision::Exhausted) => {
                            return Err(anyhow::anyhow!(
                                "automatic retries exhausted; run `linkmirror sync` to try again"
                            )
                            .into());
                        }
                        Some(RetryDecision::NotRetryable) if report.status == SyncStatus::Failed => {
                            return Err(anyhow::anyhow!(
                                "sync failed and will not be retried: {}",
                                report.error.unwrap_or_default()
                            )
                            .into());
                        }
                        Some(RetryDecision::Offline) => {
                            tracing::warn!("Server unreachable, waiting for the next interval");
                            interval
                        }
                        _ => interval,
                    }
                }
                Err(AppError::Paused) => {
                    tracing::info!("Sync is paused");
                    interval
                }
                Err(e) => return Err(e),
            };

            if stopping {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }

    pub async fn print_status(&self) -> Result<()> {
        let state = self.repository.load_sync_state().await?;
        let counts = self.repository.pending_counts().await?;

        println!(
            "Server:       {}",
            self.config.server_url.as_deref().unwrap_or("(not configured)")
        );
        match state.meta.last_sync_timestamp {
            Some(ts) => println!("Last sync:    {}", ts.to_rfc3339()),
            None => println!("Last sync:    never"),
        }
        println!(
            "Next pass:    {} ({})",
            state.pass_mode().as_str(),
            state.meta.pass.as_str()
        );
        if let Some(started) = state.meta.pass_started_at {
            println!("Pass started: {}", started.to_rfc3339());
        }
        println!("Paused:       {}", if state.meta.paused { "yes" } else { "no" });
        for progress in [&state.unarchived, &state.archived] {
            println!(
                "  {:<11} offset {}, {} observed",
                progress.collection.as_str(),
                progress.offset,
                progress.observed_ids.len()
            );
        }
        println!(
            "Bookmarks:    {} ({} archived), {} cached assets",
            counts.bookmarks, counts.archived, counts.cached_assets
        );
        println!(
            "Pending:      {} asset syncs, {} read pushes",
            counts.needs_asset_sync, counts.needs_read_sync
        );
        if let Some(error) = &state.meta.last_error {
            let at = state
                .meta
                .last_error_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("Last sync failed: {} {}", error, at);
            println!("Retries used: {}", state.meta.retry_count);
        }
        Ok(())
    }

    pub async fn list(&self, archived: bool) -> Result<()> {
        let bookmarks = self.repository.list_bookmarks(Some(archived)).await?;
        for b in bookmarks {
            let marker = if b.unread { "*" } else { " " };
            println!("{:>6} {} {}  {}", b.id, marker, b.title, b.url);
        }
        Ok(())
    }

    pub async fn mark_read(&self, id: i64) -> Result<()> {
        self.repository.mark_read_locally(id, Utc::now()).await?;
        println!("Marked {} read; it will be pushed on the next sync", id);
        Ok(())
    }

    pub async fn set_progress(&self, id: i64, fraction: f64, mode: Option<ReadingMode>) -> Result<()> {
        self.repository.update_reading_progress(id, fraction, mode).await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        self.repository.set_paused(paused).await?;
        println!("Sync {}", if paused { "paused" } else { "resumed" });
        Ok(())
    }
}

async fn print_progress(mut rx: broadcast::Receiver<SyncProgress>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if event.phase == SyncPhase::Complete {
                    return;
                }
                match event.total {
                    Some(total) => eprint!("\r{:<20} {}/{}   ", event.phase, event.current, total),
                    None => eprint!("\r{:<20} {}   ", event.phase, event.current),
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn print_report(report: &SyncReport) {
    let mode = report.mode.map(|m| m.as_str()).unwrap_or("-");
    match report.status {
        SyncStatus::Completed => println!(
            "Sync complete ({} pass): {} updated, {} removed, {} asset syncs ({} failed), {} reads pushed ({} failed)",
            mode,
            report.processed_count,
            report.reaped.deleted,
            report.assets.synced,
            report.assets.failed,
            report.read_status.pushed,
            report.read_status.failed,
        ),
        SyncStatus::Cancelled => println!(
            "Sync cancelled ({} pass) after {} updates; it will resume next time",
            mode, report.processed_count
        ),
        SyncStatus::Failed => println!(
            "Sync failed ({} pass): {}",
            mode,
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
