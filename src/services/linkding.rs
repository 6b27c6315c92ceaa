use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Collection, RemoteAsset, RemoteBookmark};

use super::remote::{BookmarkPage, RemoteApi};

const USER_AGENT: &str = concat!("linkmirror/", env!("CARGO_PKG_VERSION"));
const ASSET_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Debug, Serialize)]
struct MarkReadRequest {
    unread: bool,
}

pub struct LinkdingClient {
    client: Client,
    base_url: Url,
    api_token: String,
}

impl LinkdingClient {
    pub fn new(server_url: &str, api_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        // Url::join drops the last path segment unless the base ends with a slash
        let mut base = server_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn collection_path(collection: Collection) -> &'static str {
        match collection {
            Collection::Unarchived => "api/bookmarks/",
            Collection::Archived => "api/bookmarks/archived/",
        }
    }

    async fn get(&self, url: Url) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Token {}", self.api_token))
            .send()
            .await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get(url).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(AppError::api(status, error_text))
}

#[async_trait]
impl RemoteApi for LinkdingClient {
    async fn list_bookmarks(
        &self,
        collection: Collection,
        limit: u32,
        offset: u64,
        since: Option<DateTime<Utc>>,
    ) -> Result<BookmarkPage> {
        let mut url = self.endpoint(Self::collection_path(collection))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            query.append_pair("offset", &offset.to_string());
            if let Some(since) = since {
                query.append_pair(
                    "modified_since",
                    &since.to_rfc3339_opts(SecondsFormat::Secs, true),
                );
            }
        }

        let page: Paginated<RemoteBookmark> = self.get_json(url).await?;
        tracing::debug!(
            "Fetched {} {} bookmarks at offset {}",
            page.results.len(),
            collection.as_str(),
            offset
        );

        Ok(BookmarkPage {
            has_next: page.next.is_some(),
            count: page.count,
            items: page.results,
        })
    }

    async fn list_assets(&self, bookmark_id: i64) -> Result<Vec<RemoteAsset>> {
        let mut url = self.endpoint(&format!("api/bookmarks/{}/assets/", bookmark_id))?;
        url.query_pairs_mut()
            .append_pair("limit", &ASSET_PAGE_SIZE.to_string());

        let mut assets = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let page: Paginated<RemoteAsset> = self.get_json(url).await?;
            assets.extend(page.results);
            next = match page.next {
                Some(link) => Some(Url::parse(&link)?),
                None => None,
            };
        }
        Ok(assets)
    }

    async fn download_asset(&self, bookmark_id: i64, asset_id: i64) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!(
            "api/bookmarks/{}/assets/{}/download/",
            bookmark_id, asset_id
        ))?;
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn mark_read(&self, bookmark_id: i64) -> Result<()> {
        let url = self.endpoint(&format!("api/bookmarks/{}/", bookmark_id))?;
        let response = self
            .client
            .patch(url)
            .header("Authorization", format!("Token {}", self.api_token))
            .json(&MarkReadRequest { unread: false })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
