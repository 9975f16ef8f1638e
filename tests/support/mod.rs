//! Recording fakes shared by the integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use ig2vk::model::{ContentClass, ItemDetail};
use ig2vk::source::SourceApi;
use ig2vk::storage::BlobStore;
use ig2vk::transfer::Fetch;
use ig2vk::vk::Publish;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub async fn setup_pool() -> sqlx::SqlitePool {
    // A single connection: every in-memory SQLite connection is its own
    // database, so a wider pool would hand out unmigrated databases.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// Scripted source: fixed listings per class, fixed details per id.
#[derive(Default)]
pub struct FakeSource {
    pub listings: Mutex<HashMap<&'static str, Vec<String>>>,
    pub details: Mutex<HashMap<String, ItemDetail>>,
    pub detail_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_listing(self, class: ContentClass, ids: &[&str]) -> Self {
        self.listings
            .lock()
            .unwrap()
            .insert(class.api_field(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_detail(self, detail: ItemDetail) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(detail.id.clone(), detail);
        self
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn list_recent_ids(&self, class: ContentClass, limit: usize) -> Result<Vec<String>> {
        let listings = self.listings.lock().unwrap();
        let ids = listings.get(class.api_field()).cloned().unwrap_or_default();
        Ok(ids.into_iter().take(limit).collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<ItemDetail> {
        self.detail_calls.lock().unwrap().push(id.to_string());
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no media url for id {id}"))
    }
}

/// In-memory URL space serving both the fake CDN and the fake bucket.
/// `fail_first` injects that many transient failures for a URL before it
/// starts serving.
#[derive(Default)]
pub struct FakeNet {
    pub objects: Mutex<HashMap<String, Bytes>>,
    pub fail_first: Mutex<HashMap<String, u32>>,
    pub fetch_log: Mutex<Vec<String>>,
}

impl FakeNet {
    pub fn serve(&self, url: &str, body: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(url.to_string(), Bytes::from_static(body));
    }

    pub fn fail_first(&self, url: &str, times: u32) {
        self.fail_first
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
    }

    pub fn fetches_of(&self, url: &str) -> usize {
        self.fetch_log
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetch for FakeNet {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.fetch_log.lock().unwrap().push(url.to_string());
        {
            let mut failures = self.fail_first.lock().unwrap();
            if let Some(left) = failures.get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    return Err(anyhow!("connection reset: {url}"));
                }
            }
        }
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404: {url}"))
    }
}

/// Blob store backed by the same URL space, so staged objects become
/// fetchable at their public URL exactly like the real bucket.
pub struct MemStore {
    pub net: Arc<FakeNet>,
    pub put_calls: Mutex<Vec<String>>,
}

impl MemStore {
    pub fn new(net: Arc<FakeNet>) -> Self {
        Self {
            net,
            put_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BlobStore for MemStore {
    async fn put(&self, directory: &str, name: &str, body: Bytes) -> Result<()> {
        let url = self.public_url(directory, name);
        self.put_calls.lock().unwrap().push(url.clone());
        self.net.objects.lock().unwrap().insert(url, body);
        Ok(())
    }

    fn public_url(&self, directory: &str, name: &str) -> String {
        format!("mem://bucket/{directory}/{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishCall {
    PostImage { name: String, caption: String },
    PostVideo { name: String, caption: String },
    StoryImage,
    StoryVideo,
}

/// Publisher that records calls and optionally fails everything.
#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<PublishCall>>,
    pub fail: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PublishCall) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("destination unavailable"));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl Publish for RecordingPublisher {
    async fn publish_post_image(&self, name: &str, caption: &str, _body: Bytes) -> Result<()> {
        self.record(PublishCall::PostImage {
            name: name.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn publish_post_video(&self, name: &str, caption: &str, _body: Bytes) -> Result<()> {
        self.record(PublishCall::PostVideo {
            name: name.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn publish_story_image(&self, _body: Bytes) -> Result<()> {
        self.record(PublishCall::StoryImage)
    }

    async fn publish_story_video(&self, _body: Bytes) -> Result<()> {
        self.record(PublishCall::StoryVideo)
    }
}
