use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Pending,
    Complete,
    Failure,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Complete => "complete",
            AssetStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => AssetStatus::Complete,
            "failure" => AssetStatus::Failure,
            _ => AssetStatus::Pending,
        }
    }
}

/// Asset metadata as listed by `/api/bookmarks/{id}/assets/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAsset {
    pub id: i64,
    #[serde(rename = "bookmark")]
    pub bookmark_id: i64,
    pub asset_type: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    pub status: AssetStatus,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: i64,
    pub bookmark_id: i64,
    pub asset_type: String,
    pub content_type: String,
    pub display_name: String,
    pub file_size: Option<i64>,
    pub status: AssetStatus,
    pub date_created: DateTime<Utc>,
    pub content: Option<Vec<u8>>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn is_cached(&self) -> bool {
        self.content.is_some()
    }
}

impl From<&RemoteAsset> for Asset {
    fn from(remote: &RemoteAsset) -> Self {
        Self {
            id: remote.id,
            bookmark_id: remote.bookmark_id,
            asset_type: remote.asset_type.clone(),
            content_type: remote.content_type.clone(),
            display_name: remote.display_name.clone(),
            file_size: remote.file_size,
            status: remote.status,
            date_created: remote.date_created,
            content: None,
            cached_at: None,
        }
    }
}
