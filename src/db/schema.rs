pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- bookmarks table (remote identity, local reading state)
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    is_archived INTEGER NOT NULL DEFAULT 0,
    unread INTEGER NOT NULL DEFAULT 0,
    date_added TEXT NOT NULL,
    date_modified TEXT NOT NULL,
    last_read_at TEXT,
    read_progress REAL NOT NULL DEFAULT 0,
    reading_mode TEXT,
    needs_asset_sync INTEGER NOT NULL DEFAULT 0,
    needs_read_sync INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_is_archived ON bookmarks(is_archived);
CREATE INDEX IF NOT EXISTS idx_bookmarks_date_modified ON bookmarks(date_modified DESC);
CREATE INDEX IF NOT EXISTS idx_bookmarks_needs_asset_sync ON bookmarks(needs_asset_sync);
CREATE INDEX IF NOT EXISTS idx_bookmarks_needs_read_sync ON bookmarks(needs_read_sync);

-- assets table (content is only kept for unarchived bookmarks)
CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY,
    bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
    asset_type TEXT NOT NULL,
    content_type TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    file_size INTEGER,
    status TEXT NOT NULL,
    date_created TEXT NOT NULL,
    content BLOB,
    cached_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_assets_bookmark_id ON assets(bookmark_id);

-- per-collection paging progress
CREATE TABLE IF NOT EXISTS sync_collections (
    collection TEXT PRIMARY KEY,
    next_offset INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT
);

-- identifiers observed during the current full pass
CREATE TABLE IF NOT EXISTS sync_observed (
    collection TEXT NOT NULL,
    bookmark_id INTEGER NOT NULL,
    PRIMARY KEY (collection, bookmark_id)
);

-- single-row global sync state
CREATE TABLE IF NOT EXISTS sync_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_timestamp TEXT,
    pass_state TEXT NOT NULL DEFAULT 'idle',
    pass_started_at TEXT,
    paused INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    last_error_at TEXT
);

INSERT OR IGNORE INTO sync_meta (id) VALUES (1);
INSERT OR IGNORE INTO sync_collections (collection) VALUES ('unarchived');
INSERT OR IGNORE INTO sync_collections (collection) VALUES ('archived');
"#;
