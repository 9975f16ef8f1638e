//! Per-item synchronization pipeline.
//!
//! One item moves through gate check → detail fetch → transfer → staging →
//! fetch-back → publish → ledger commit, strictly in that order. Any failure
//! is terminal for this run only; the next polling cycle re-discovers the id
//! and starts over from the gate.

use crate::db;
use crate::model::{ContentClass, Destination, MediaKind, SyncOutcome, WorkerRole};
use crate::source::SourceApi;
use crate::storage::BlobStore;
use crate::transfer::{DownloadError, Downloader, Fetch};
use crate::vk::Publish;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("gate check failed: {0}")]
    Gate(#[source] anyhow::Error),
    #[error("detail fetch failed: {0}")]
    Detail(#[source] anyhow::Error),
    #[error("transfer failed: {0}")]
    Transfer(#[from] DownloadError),
    #[error("staging failed: {0}")]
    Stage(#[source] anyhow::Error),
    #[error("staged object not reachable: {0}")]
    FetchBack(#[source] anyhow::Error),
    #[error("publish failed: {0}")]
    Publish(#[source] anyhow::Error),
    #[error("ledger commit failed after successful publish: {0}")]
    Commit(#[source] anyhow::Error),
}

impl SyncError {
    /// Stage label for log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::Gate(_) => "gate",
            SyncError::Detail(_) => "detail",
            SyncError::Transfer(_) => "transfer",
            SyncError::Stage(_) => "stage",
            SyncError::FetchBack(_) => "fetch-back",
            SyncError::Publish(_) => "publish",
            SyncError::Commit(_) => "commit",
        }
    }

    /// A commit failure means the item was delivered but the ledger does not
    /// say so; the next cycle will redo the whole pipeline. Callers log this
    /// louder than ordinary item failures.
    pub fn is_reconciliation_risk(&self) -> bool {
        matches!(self, SyncError::Commit(_))
    }
}

/// Capability bundle the pipeline runs against. Production wires HTTP
/// clients; tests wire recording fakes.
pub struct Pipeline {
    pub pool: db::Pool,
    pub source: Arc<dyn SourceApi>,
    pub downloader: Downloader,
    pub fetcher: Arc<dyn Fetch>,
    pub store: Arc<dyn BlobStore>,
    pub publisher: Arc<dyn Publish>,
}

impl Pipeline {
    /// Run one item end to end for the given (class, role, destination).
    pub async fn sync_item(
        &self,
        class: ContentClass,
        role: WorkerRole,
        dest: Destination,
        id: &str,
        shutdown: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError> {
        let synced = db::check_and_register(&self.pool, class, dest, id)
            .await
            .map_err(SyncError::Gate)?;
        if synced {
            info!(id, class = class.table(), dest = dest.as_str(), "already synced, skipping");
            return Ok(SyncOutcome::Skipped);
        }

        let detail = self
            .source
            .fetch_detail(id)
            .await
            .map_err(SyncError::Detail)?;

        let body = self.downloader.fetch(&detail.media_url, shutdown).await?;

        let dir = class.storage_dir();
        self.store
            .put(dir, id, body)
            .await
            .map_err(SyncError::Stage)?;

        // Publish from the staged copy, proving it is publicly reachable
        // before the destination ever sees the URL's content.
        let staged_url = self.store.public_url(dir, id);
        let staged = self
            .fetcher
            .fetch(&staged_url)
            .await
            .map_err(SyncError::FetchBack)?;

        match (role, detail.kind) {
            (WorkerRole::Post, MediaKind::Image) => self
                .publisher
                .publish_post_image(&detail.caption, &detail.caption, staged)
                .await
                .map_err(SyncError::Publish)?,
            (WorkerRole::Post, MediaKind::Video) => self
                .publisher
                .publish_post_video(&detail.caption, &detail.caption, staged)
                .await
                .map_err(SyncError::Publish)?,
            (WorkerRole::Story, MediaKind::Image) => self
                .publisher
                .publish_story_image(staged)
                .await
                .map_err(SyncError::Publish)?,
            (WorkerRole::Story, MediaKind::Video) => self
                .publisher
                .publish_story_video(staged)
                .await
                .map_err(SyncError::Publish)?,
        }

        db::mark_synced(&self.pool, class, dest, id)
            .await
            .map_err(SyncError::Commit)?;

        info!(
            id,
            class = class.table(),
            dest = dest.as_str(),
            kind = detail.kind.as_str(),
            "transferred and synced"
        );
        Ok(SyncOutcome::Published)
    }
}
