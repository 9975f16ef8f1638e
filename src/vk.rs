//! VK publishing client.
//!
//! Every operation is a thin two-phase VK flow: ask the API for an upload
//! server, then POST the bytes there (and save where the method requires a
//! separate save call). All four operations are safe to repeat — a re-run
//! after a failed ledger commit produces a duplicate post at worst, never a
//! broken one.

use crate::config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;

const VK_API_BASE: &str = "https://api.vk.com/method";
const VK_API_VERSION: &str = "5.131";

#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish_post_image(&self, name: &str, caption: &str, body: Bytes) -> Result<()>;
    async fn publish_post_video(&self, name: &str, caption: &str, body: Bytes) -> Result<()>;
    async fn publish_story_image(&self, body: Bytes) -> Result<()>;
    async fn publish_story_video(&self, body: Bytes) -> Result<()>;
}

pub struct VkClient {
    http: Client,
    base_url: String,
    token: String,
    owner_id: i64,
}

impl VkClient {
    pub fn from_config(http: Client, cfg: &config::Vk) -> Self {
        Self {
            http,
            base_url: VK_API_BASE.to_string(),
            token: cfg.access_token.clone(),
            owner_id: cfg.owner_id,
        }
    }

    /// Test hook: point API calls at a local server.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Invoke an API method and unwrap VK's `response`/`error` envelope.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let mut query: Vec<(&str, String)> = vec![
            ("access_token", self.token.clone()),
            ("v", VK_API_VERSION.to_string()),
        ];
        query.extend(params.iter().cloned());

        let body: Value = self
            .http
            .post(&url)
            .form(&query)
            .send()
            .await
            .with_context(|| format!("vk call {method} failed"))?
            .error_for_status()
            .with_context(|| format!("vk rejected {method}"))?
            .json()
            .await
            .with_context(|| format!("failed to decode vk {method} response"))?;

        if let Some(err) = body.get("error") {
            let code = err.get("error_code").and_then(Value::as_i64).unwrap_or(0);
            let msg = err
                .get("error_msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(anyhow!("vk {method} error {code}: {msg}"));
        }
        body.get("response")
            .cloned()
            .ok_or_else(|| anyhow!("vk {method} returned no response field"))
    }

    fn upload_url(response: &Value, method: &str) -> Result<String> {
        response
            .get("upload_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("vk {method} returned no upload_url"))
    }

    /// POST bytes to an upload server as a multipart file field.
    async fn upload(&self, upload_url: &str, field: &'static str, filename: &str, body: Bytes) -> Result<Value> {
        let part = Part::stream(body).file_name(filename.to_string());
        let form = Form::new().part(field, part);
        let resp: Value = self
            .http
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .context("vk upload failed")?
            .error_for_status()
            .context("vk upload server rejected the file")?
            .json()
            .await
            .context("failed to decode vk upload response")?;
        if let Some(err) = resp.get("error") {
            return Err(anyhow!("vk upload error: {err}"));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Publish for VkClient {
    async fn publish_post_image(&self, name: &str, caption: &str, body: Bytes) -> Result<()> {
        let server = self
            .call(
                "photos.getWallUploadServer",
                &[("group_id", self.owner_id.unsigned_abs().to_string())],
            )
            .await?;
        let upload_url = Self::upload_url(&server, "photos.getWallUploadServer")?;
        let uploaded = self
            .upload(&upload_url, "photo", &format!("{name}.jpg"), body)
            .await?;

        let server_id = uploaded.get("server").cloned().unwrap_or(Value::Null);
        let photo = uploaded
            .get("photo")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let hash = uploaded
            .get("hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.call(
            "photos.saveWallPhoto",
            &[
                ("group_id", self.owner_id.unsigned_abs().to_string()),
                ("server", server_id.to_string()),
                ("photo", photo),
                ("hash", hash),
                ("caption", caption.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn publish_post_video(&self, name: &str, caption: &str, body: Bytes) -> Result<()> {
        let server = self
            .call(
                "video.save",
                &[
                    ("name", name.to_string()),
                    ("description", caption.to_string()),
                    ("repeat", "1".to_string()),
                    ("wallpost", "1".to_string()),
                    ("compression", "1".to_string()),
                ],
            )
            .await?;
        let upload_url = Self::upload_url(&server, "video.save")?;
        self.upload(&upload_url, "video_file", &format!("{name}.mp4"), body)
            .await?;
        Ok(())
    }

    async fn publish_story_image(&self, body: Bytes) -> Result<()> {
        let server = self
            .call(
                "stories.getPhotoUploadServer",
                &[("add_to_news", "1".to_string())],
            )
            .await?;
        let upload_url = Self::upload_url(&server, "stories.getPhotoUploadServer")?;
        let uploaded = self.upload(&upload_url, "file", "story.jpg", body).await?;
        self.save_story(uploaded).await
    }

    async fn publish_story_video(&self, body: Bytes) -> Result<()> {
        let server = self
            .call(
                "stories.getVideoUploadServer",
                &[("add_to_news", "1".to_string())],
            )
            .await?;
        let upload_url = Self::upload_url(&server, "stories.getVideoUploadServer")?;
        let uploaded = self.upload(&upload_url, "video_file", "story.mp4", body).await?;
        self.save_story(uploaded).await
    }
}

impl VkClient {
    async fn save_story(&self, uploaded: Value) -> Result<()> {
        // Newer upload servers save the story themselves and return no
        // upload_result; only call stories.save when one is present.
        let upload_result = uploaded
            .get("response")
            .and_then(|r| r.get("upload_result"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(upload_result) = upload_result {
            self.call("stories.save", &[("upload_results", upload_result)])
                .await?;
        }
        Ok(())
    }
}
