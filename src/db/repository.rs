use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    Asset, AssetStatus, Bookmark, Collection, PassState, ReadingMode, SyncMeta, SyncState,
};

use super::schema::SCHEMA;

const BOOKMARK_COLUMNS: &str = "id, url, title, description, notes, tags, is_archived, unread, \
     date_added, date_modified, last_read_at, read_progress, reading_mode, \
     needs_asset_sync, needs_read_sync";

const ASSET_COLUMNS: &str = "id, bookmark_id, asset_type, content_type, display_name, file_size, \
     status, date_created, content, cached_at";

/// Counters shown by `linkmirror status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub bookmarks: i64,
    pub archived: i64,
    pub needs_asset_sync: i64,
    pub needs_read_sync: i64,
    pub cached_assets: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            // Databases created before full passes recorded their start time
            let has_pass_start: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('sync_meta') WHERE name = 'pass_started_at'",
                [],
                |row| row.get(0),
            )?;
            if !has_pass_start {
                conn.execute("ALTER TABLE sync_meta ADD COLUMN pass_started_at TEXT", [])?;
            }
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Bookmark operations

    pub async fn get_bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        let bookmark = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE id = ?1"
                ))?;
                let bookmark = stmt
                    .query_row(params![id], bookmark_from_row)
                    .optional()?;
                Ok(bookmark)
            })
            .await?;
        Ok(bookmark)
    }

    /// Insert or fully overwrite a bookmark row.
    pub async fn put_bookmark(&self, bookmark: Bookmark) -> Result<()> {
        let tags_json = serde_json::to_string(&bookmark.tags)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO bookmarks (id, url, title, description, notes, tags, is_archived, unread,
                                              date_added, date_modified, last_read_at, read_progress,
                                              reading_mode, needs_asset_sync, needs_read_sync)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                       ON CONFLICT(id) DO UPDATE SET
                           url = excluded.url,
                           title = excluded.title,
                           description = excluded.description,
                           notes = excluded.notes,
                           tags = excluded.tags,
                           is_archived = excluded.is_archived,
                           unread = excluded.unread,
                           date_added = excluded.date_added,
                           date_modified = excluded.date_modified,
                           last_read_at = excluded.last_read_at,
                           read_progress = excluded.read_progress,
                           reading_mode = excluded.reading_mode,
                           needs_asset_sync = excluded.needs_asset_sync,
                           needs_read_sync = excluded.needs_read_sync"#,
                    params![
                        bookmark.id,
                        bookmark.url,
                        bookmark.title,
                        bookmark.description,
                        bookmark.notes,
                        tags_json,
                        bookmark.is_archived,
                        bookmark.unread,
                        bookmark.date_added.to_rfc3339(),
                        bookmark.date_modified.to_rfc3339(),
                        bookmark.last_read_at.map(|dt| dt.to_rfc3339()),
                        bookmark.read_progress,
                        bookmark.reading_mode.map(|m| m.as_str()),
                        bookmark.needs_asset_sync,
                        bookmark.needs_read_sync,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete a bookmark and its assets. Returns false if it did not exist.
    pub async fn delete_bookmark(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM assets WHERE bookmark_id = ?1", params![id])?;
                let n = tx.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(n > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn all_bookmark_ids(&self) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM bookmarks ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Bookmarks newest-modified first, optionally filtered by archived flag.
    pub async fn list_bookmarks(&self, archived: Option<bool>) -> Result<Vec<Bookmark>> {
        let bookmarks = self
            .conn
            .call(move |conn| {
                let bookmarks = match archived {
                    Some(flag) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE is_archived = ?1 ORDER BY date_modified DESC"
                        ))?;
                        let rows = stmt
                            .query_map(params![flag], bookmark_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {BOOKMARK_COLUMNS} FROM bookmarks ORDER BY date_modified DESC"
                        ))?;
                        let rows = stmt
                            .query_map([], bookmark_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                };
                Ok(bookmarks)
            })
            .await?;
        Ok(bookmarks)
    }

    pub async fn bookmarks_needing_asset_sync(&self) -> Result<Vec<Bookmark>> {
        self.bookmarks_flagged("needs_asset_sync").await
    }

    pub async fn bookmarks_needing_read_sync(&self) -> Result<Vec<Bookmark>> {
        self.bookmarks_flagged("needs_read_sync").await
    }

    async fn bookmarks_flagged(&self, flag: &'static str) -> Result<Vec<Bookmark>> {
        let bookmarks = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE {flag} = 1 ORDER BY id"
                ))?;
                let bookmarks = stmt
                    .query_map([], bookmark_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bookmarks)
            })
            .await?;
        Ok(bookmarks)
    }

    pub async fn clear_needs_asset_sync(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bookmarks SET needs_asset_sync = 0 WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Record that the server acknowledged a read. Only called after the push succeeded.
    pub async fn confirm_read_synced(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE bookmarks SET needs_read_sync = 0, unread = 0 WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Mark a bookmark read on this device and queue the push to the server.
    pub async fn mark_read_locally(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE bookmarks SET unread = 0, last_read_at = ?1, needs_read_sync = 1 WHERE id = ?2",
                    params![at.to_rfc3339(), id],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            return Err(AppError::BookmarkNotFound(id));
        }
        Ok(())
    }

    pub async fn update_reading_progress(
        &self,
        id: i64,
        progress: f64,
        mode: Option<ReadingMode>,
    ) -> Result<()> {
        let progress = progress.clamp(0.0, 1.0);
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE bookmarks SET read_progress = ?1, reading_mode = COALESCE(?2, reading_mode) WHERE id = ?3",
                    params![progress, mode.map(|m| m.as_str()), id],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            return Err(AppError::BookmarkNotFound(id));
        }
        Ok(())
    }

    pub async fn pending_counts(&self) -> Result<PendingCounts> {
        let counts = self
            .conn
            .call(|conn| {
                let counts = conn.query_row(
                    r#"SELECT COUNT(*),
                              COALESCE(SUM(is_archived), 0),
                              COALESCE(SUM(needs_asset_sync), 0),
                              COALESCE(SUM(needs_read_sync), 0),
                              (SELECT COUNT(*) FROM assets WHERE content IS NOT NULL)
                       FROM bookmarks"#,
                    [],
                    |row| {
                        Ok(PendingCounts {
                            bookmarks: row.get(0)?,
                            archived: row.get(1)?,
                            needs_asset_sync: row.get(2)?,
                            needs_read_sync: row.get(3)?,
                            cached_assets: row.get(4)?,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    // Asset operations

    pub async fn get_assets(&self, bookmark_id: i64) -> Result<Vec<Asset>> {
        let assets = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ASSET_COLUMNS} FROM assets WHERE bookmark_id = ?1 ORDER BY id"
                ))?;
                let assets = stmt
                    .query_map(params![bookmark_id], asset_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(assets)
            })
            .await?;
        Ok(assets)
    }

    /// Assets of a bookmark that already have content cached.
    pub async fn cached_asset_ids(&self, bookmark_id: i64) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM assets WHERE bookmark_id = ?1 AND content IS NOT NULL ORDER BY id",
                )?;
                let ids = stmt
                    .query_map(params![bookmark_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Write asset metadata, leaving any cached content in place.
    pub async fn upsert_asset_metadata(&self, asset: Asset) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO assets (id, bookmark_id, asset_type, content_type, display_name,
                                           file_size, status, date_created)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT(id) DO UPDATE SET
                           bookmark_id = excluded.bookmark_id,
                           asset_type = excluded.asset_type,
                           content_type = excluded.content_type,
                           display_name = excluded.display_name,
                           file_size = excluded.file_size,
                           status = excluded.status,
                           date_created = excluded.date_created"#,
                    params![
                        asset.id,
                        asset.bookmark_id,
                        asset.asset_type,
                        asset.content_type,
                        asset.display_name,
                        asset.file_size,
                        asset.status.as_str(),
                        asset.date_created.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn store_asset_content(
        &self,
        asset_id: i64,
        content: Vec<u8>,
        cached_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE assets SET content = ?1, cached_at = ?2 WHERE id = ?3",
                    params![content, cached_at.to_rfc3339(), asset_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Drop cached content for every asset of a bookmark. Returns how many assets lost content.
    pub async fn purge_cached_content(&self, bookmark_id: i64) -> Result<usize> {
        let purged = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE assets SET content = NULL, cached_at = NULL WHERE bookmark_id = ?1 AND content IS NOT NULL",
                    params![bookmark_id],
                )?;
                Ok(n)
            })
            .await?;
        Ok(purged)
    }

    /// Remove local assets of a bookmark that the server no longer lists.
    pub async fn delete_assets_except(&self, bookmark_id: i64, keep: Vec<i64>) -> Result<usize> {
        let keep: HashSet<i64> = keep.into_iter().collect();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let stale: Vec<i64> = {
                    let mut stmt = tx.prepare("SELECT id FROM assets WHERE bookmark_id = ?1")?;
                    let ids = stmt
                        .query_map(params![bookmark_id], |row| row.get(0))?
                        .collect::<std::result::Result<Vec<i64>, _>>()?;
                    ids.into_iter().filter(|id| !keep.contains(id)).collect()
                };
                for id in &stale {
                    tx.execute("DELETE FROM assets WHERE id = ?1", params![id])?;
                }
                tx.commit()?;
                Ok(stale.len())
            })
            .await?;
        Ok(removed)
    }

    // Sync state

    pub async fn load_sync_state(&self) -> Result<SyncState> {
        let state = self
            .conn
            .call(|conn| {
                let meta = conn.query_row(
                    "SELECT last_sync_timestamp, pass_state, paused, retry_count, last_error, last_error_at, pass_started_at FROM sync_meta WHERE id = 1",
                    [],
                    meta_from_row,
                )?;

                let mut state = SyncState {
                    meta,
                    ..SyncState::default()
                };

                let mut stmt = conn.prepare(
                    "SELECT collection, next_offset, retry_count, last_error FROM sync_collections",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                for (name, offset, retry_count, last_error) in rows {
                    let Some(collection) = Collection::parse(&name) else {
                        continue;
                    };
                    let progress = state.progress_mut(collection);
                    progress.offset = offset.max(0) as u64;
                    progress.retry_count = retry_count.max(0) as u32;
                    progress.last_error = last_error;
                }

                let mut stmt = conn.prepare("SELECT collection, bookmark_id FROM sync_observed")?;
                let observed = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                for (name, id) in observed {
                    if let Some(collection) = Collection::parse(&name) {
                        state.progress_mut(collection).observed_ids.insert(id);
                    }
                }

                Ok(state)
            })
            .await?;
        Ok(state)
    }

    /// Persist the offset reached after a page together with the page's identifiers.
    pub async fn save_page_progress(
        &self,
        collection: Collection,
        next_offset: u64,
        observed: Vec<i64>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "UPDATE sync_collections SET next_offset = ?1 WHERE collection = ?2",
                    params![next_offset as i64, collection.as_str()],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO sync_observed (collection, bookmark_id) VALUES (?1, ?2)",
                    )?;
                    for id in &observed {
                        stmt.execute(params![collection.as_str(), id])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Start a fresh full pass from offset 0 with no observed identifiers.
    ///
    /// `started_at` is kept until the pass completes, even across interruptions.
    pub async fn begin_full_pass(&self, started_at: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM sync_observed", [])?;
                tx.execute("UPDATE sync_collections SET next_offset = 0", [])?;
                tx.execute(
                    "UPDATE sync_meta SET pass_state = ?1, pass_started_at = ?2 WHERE id = 1",
                    params![PassState::FullInProgress.as_str(), started_at.to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Forget the watermark and any pass underway so the next sync is a fresh full pass.
    pub async fn abandon_for_full_pass(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM sync_observed", [])?;
                tx.execute("UPDATE sync_collections SET next_offset = 0", [])?;
                tx.execute(
                    "UPDATE sync_meta SET last_sync_timestamp = NULL, pass_state = ?1, pass_started_at = NULL WHERE id = 1",
                    params![PassState::Idle.as_str()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Incremental passes always page from the start.
    pub async fn reset_offsets(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute("UPDATE sync_collections SET next_offset = 0", [])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Advance the watermark and close out the pass in one transaction.
    pub async fn commit_watermark(&self, timestamp: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM sync_observed", [])?;
                tx.execute(
                    "UPDATE sync_collections SET next_offset = 0, retry_count = 0, last_error = NULL",
                    [],
                )?;
                tx.execute(
                    r#"UPDATE sync_meta SET last_sync_timestamp = ?1, pass_state = ?2,
                                            pass_started_at = NULL, retry_count = 0, last_error = NULL, last_error_at = NULL
                       WHERE id = 1"#,
                    params![timestamp.to_rfc3339(), PassState::Idle.as_str()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Persist a failed sync. Returns the global retry count after the update.
    pub async fn record_failure(
        &self,
        collection: Option<Collection>,
        message: String,
        count_retry: bool,
    ) -> Result<u32> {
        let increment: i64 = if count_retry { 1 } else { 0 };
        let now = Utc::now().to_rfc3339();
        let retry_count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(collection) = collection {
                    tx.execute(
                        "UPDATE sync_collections SET retry_count = retry_count + ?1, last_error = ?2 WHERE collection = ?3",
                        params![increment, message, collection.as_str()],
                    )?;
                }
                tx.execute(
                    "UPDATE sync_meta SET retry_count = retry_count + ?1, last_error = ?2, last_error_at = ?3 WHERE id = 1",
                    params![increment, message, now],
                )?;
                let count: i64 = tx.query_row(
                    "SELECT retry_count FROM sync_meta WHERE id = 1",
                    [],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(count)
            })
            .await?;
        Ok(retry_count.max(0) as u32)
    }

    /// A manual trigger restores the automatic retry budget.
    pub async fn reset_retry_count(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("UPDATE sync_meta SET retry_count = 0 WHERE id = 1", [])?;
                tx.execute("UPDATE sync_collections SET retry_count = 0", [])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sync_meta SET paused = ?1 WHERE id = 1",
                    params![paused],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
impl Repository {
    /// Run raw SQL against the database, e.g. to install failure triggers.
    pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| invalid_column(idx, format!("invalid timestamp: {raw}")))
}

fn optional_datetime_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| invalid_column(idx, format!("invalid timestamp: {raw}"))),
        None => Ok(None),
    }
}

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn bookmark_from_row(row: &Row) -> rusqlite::Result<Bookmark> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Bookmark {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        tags,
        is_archived: row.get(6)?,
        unread: row.get(7)?,
        date_added: datetime_column(row, 8)?,
        date_modified: datetime_column(row, 9)?,
        last_read_at: optional_datetime_column(row, 10)?,
        read_progress: row.get(11)?,
        reading_mode: row
            .get::<_, Option<String>>(12)?
            .and_then(|s| ReadingMode::parse(&s)),
        needs_asset_sync: row.get(13)?,
        needs_read_sync: row.get(14)?,
    })
}

fn asset_from_row(row: &Row) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        bookmark_id: row.get(1)?,
        asset_type: row.get(2)?,
        content_type: row.get(3)?,
        display_name: row.get(4)?,
        file_size: row.get(5)?,
        status: AssetStatus::parse(&row.get::<_, String>(6)?),
        date_created: datetime_column(row, 7)?,
        content: row.get(8)?,
        cached_at: optional_datetime_column(row, 9)?,
    })
}

fn meta_from_row(row: &Row) -> rusqlite::Result<SyncMeta> {
    Ok(SyncMeta {
        last_sync_timestamp: optional_datetime_column(row, 0)?,
        pass: PassState::parse(&row.get::<_, String>(1)?),
        paused: row.get(2)?,
        retry_count: row.get::<_, i64>(3)?.max(0) as u32,
        last_error: row.get(4)?,
        last_error_at: optional_datetime_column(row, 5)?,
        pass_started_at: optional_datetime_column(row, 6)?,
    })
}
