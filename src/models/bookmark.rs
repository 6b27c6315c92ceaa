use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookmark as the Linkding API returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBookmark {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub website_title: Option<String>,
    #[serde(default)]
    pub tag_names: Vec<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub unread: bool,
    pub date_added: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl RemoteBookmark {
    /// Title to show locally: the user's title, or the scraped page title.
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            self.website_title.clone().unwrap_or_default()
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    #[default]
    Readable,
    Original,
}

impl ReadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingMode::Readable => "readable",
            ReadingMode::Original => "original",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "readable" => Some(ReadingMode::Readable),
            "original" => Some(ReadingMode::Original),
            _ => None,
        }
    }
}

/// A bookmark in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub unread: bool,
    pub date_added: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,

    // Local reading state, never sent back except through read-status sync
    pub last_read_at: Option<DateTime<Utc>>,
    pub read_progress: f64,
    pub reading_mode: Option<ReadingMode>,
    pub needs_asset_sync: bool,
    pub needs_read_sync: bool,
}

impl Bookmark {
    pub fn from_remote(remote: &RemoteBookmark) -> Self {
        Self {
            id: remote.id,
            url: remote.url.clone(),
            title: remote.display_title(),
            description: remote.description.clone(),
            notes: remote.notes.clone(),
            tags: remote.tag_names.clone(),
            is_archived: remote.is_archived,
            unread: remote.unread,
            date_added: remote.date_added,
            date_modified: remote.date_modified,
            last_read_at: None,
            read_progress: 0.0,
            reading_mode: None,
            needs_asset_sync: false,
            needs_read_sync: false,
        }
    }
}
