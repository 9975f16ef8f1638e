//! Durable staging store. Items are relayed through a public bucket so the
//! destination uploads from a stable URL rather than the source CDN.

use crate::config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `body` under `{directory}/{name}`. Overwrites any existing
    /// object; item ids are unique so a rewrite is always the same content.
    async fn put(&self, directory: &str, name: &str, body: Bytes) -> Result<()>;

    /// Public download URL for an object previously written by `put`.
    fn public_url(&self, directory: &str, name: &str) -> String;
}

const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const GCS_PUBLIC_BASE: &str = "https://storage.googleapis.com";

/// Google Cloud Storage client using the JSON API's simple upload.
pub struct GcsStore {
    http: Client,
    bucket: String,
    token: String,
    upload_base: String,
    public_base: String,
}

impl GcsStore {
    pub fn from_config(http: Client, cfg: &config::Gcs) -> Self {
        Self {
            http,
            bucket: cfg.bucket_name.clone(),
            token: cfg.access_token.clone(),
            upload_base: GCS_UPLOAD_BASE.to_string(),
            public_base: GCS_PUBLIC_BASE.to_string(),
        }
    }

    /// Test hook: point uploads and public URLs at a local server.
    pub fn with_bases(mut self, upload_base: String, public_base: String) -> Self {
        self.upload_base = upload_base;
        self.public_base = public_base;
        self
    }
}

#[async_trait]
impl BlobStore for GcsStore {
    async fn put(&self, directory: &str, name: &str, body: Bytes) -> Result<()> {
        let url = format!(
            "{}/{}/o?uploadType=media&name={}/{}",
            self.upload_base, self.bucket, directory, name
        );
        self.http
            .post(&url)
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed to stage {directory}/{name}"))?
            .error_for_status()
            .with_context(|| format!("staging store rejected {directory}/{name}"))?;
        Ok(())
    }

    fn public_url(&self, directory: &str, name: &str) -> String {
        format!("{}/{}/{}/{}", self.public_base, self.bucket, directory, name)
    }
}
