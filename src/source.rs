//! Source API: lists recent item ids and fetches per-item detail.

use crate::config;
use crate::model::{ContentClass, ItemDetail, MediaKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Most-recent item ids for a content class, newest first, at most
    /// `limit` entries.
    async fn list_recent_ids(&self, class: ContentClass, limit: usize) -> Result<Vec<String>>;

    /// Per-item detail. Fails if the item has no media URL.
    async fn fetch_detail(&self, id: &str) -> Result<ItemDetail>;
}

#[derive(Debug, Deserialize)]
struct ListResp {
    #[serde(default)]
    data: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DetailResp {
    id: String,
    #[serde(default)]
    media_url: String,
    #[serde(default)]
    caption: String,
    media_type: String,
    #[serde(default)]
    permalink: String,
}

/// Instagram Graph API client.
pub struct InstagramClient {
    http: Client,
    api: String,
    account_id: String,
    token: String,
}

impl InstagramClient {
    pub fn from_config(http: Client, cfg: &config::Instagram) -> Self {
        Self {
            http,
            api: cfg.api.trim_end_matches('/').to_string(),
            account_id: cfg.account_id.clone(),
            token: cfg.access_token.clone(),
        }
    }
}

#[async_trait]
impl SourceApi for InstagramClient {
    async fn list_recent_ids(&self, class: ContentClass, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}/{}?access_token={}",
            self.api,
            self.account_id,
            class.api_field(),
            self.token
        );
        let resp: ListResp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to list {} ids", class.api_field()))?
            .error_for_status()
            .with_context(|| format!("source rejected {} listing", class.api_field()))?
            .json()
            .await
            .context("failed to decode listing response")?;

        Ok(resp
            .data
            .into_iter()
            .take(limit)
            .map(|e| e.id)
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<ItemDetail> {
        let url = format!(
            "{}/{}?fields=media_url,caption,id,media_type,permalink&access_token={}",
            self.api, id, self.token
        );
        let resp: DetailResp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch detail for id {id}"))?
            .error_for_status()
            .with_context(|| format!("source rejected detail fetch for id {id}"))?
            .json()
            .await
            .with_context(|| format!("failed to decode detail for id {id}"))?;

        if resp.media_url.is_empty() {
            return Err(anyhow!("no media url for id {id}"));
        }
        let kind = MediaKind::parse(&resp.media_type)
            .with_context(|| format!("detail for id {id} has unrecognized media type"))?;

        Ok(ItemDetail {
            id: resp.id,
            media_url: resp.media_url,
            caption: resp.caption,
            kind,
            permalink: resp.permalink,
        })
    }
}
