//! Periodic worker loops, one per enabled (content-class, destination) pair.
//!
//! Each loop lists recent ids, dispatches them through the pipeline oldest
//! first, then sleeps. Loops are independent: a failing destination stalls
//! only its own loop, and every sleep observes the shared cancellation token.

use crate::config::Config;
use crate::model::{ContentClass, Destination, SyncOutcome, WorkerRole};
use crate::pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Worker {
    class: ContentClass,
    role: WorkerRole,
    dest: Destination,
    limit: usize,
    sleep_interval: Duration,
    pipeline: Arc<Pipeline>,
}

impl Worker {
    pub fn new(
        class: ContentClass,
        role: WorkerRole,
        dest: Destination,
        limit: usize,
        sleep_interval: Duration,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        let limit = if limit == 0 {
            class.default_limit()
        } else {
            limit
        };
        Self {
            class,
            role,
            dest,
            limit,
            sleep_interval,
            pipeline,
        }
    }

    /// Logging name, e.g. `vk:worker:post`.
    pub fn full_name(&self) -> String {
        format!("{}:worker:{}", self.dest.as_str(), self.role.as_str())
    }

    /// One polling cycle: list, reorder oldest-first, dispatch sequentially.
    pub async fn cycle(&self, shutdown: &CancellationToken) {
        let ids = match self
            .pipeline
            .source
            .list_recent_ids(self.class, self.limit)
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                warn!(worker = %self.full_name(), error = %err, "failed to list ids");
                return;
            }
        };

        // The source lists newest first; process the backlog in
        // chronological order instead.
        for id in ids.iter().rev() {
            if shutdown.is_cancelled() {
                return;
            }
            match self
                .pipeline
                .sync_item(self.class, self.role, self.dest, id, shutdown)
                .await
            {
                Ok(SyncOutcome::Published) | Ok(SyncOutcome::Skipped) => {}
                Err(err) if err.is_reconciliation_risk() => {
                    error!(
                        worker = %self.full_name(),
                        id,
                        class = self.class.table(),
                        dest = self.dest.as_str(),
                        error = %err,
                        "item delivered but not committed; it will be reprocessed next cycle"
                    );
                }
                Err(err) => {
                    warn!(
                        worker = %self.full_name(),
                        id,
                        class = self.class.table(),
                        dest = self.dest.as_str(),
                        stage = err.stage(),
                        error = %err,
                        "item failed"
                    );
                }
            }
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(worker = %self.full_name(), "run");
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            self.cycle(&shutdown).await;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.sleep_interval) => {}
            }
        }
    }
}

/// Build the workers the config enables, logging the ones it does not.
pub fn build_workers(cfg: &Config, pipeline: Arc<Pipeline>) -> Vec<Worker> {
    let interval = Duration::from_secs(cfg.sleep_interval);
    let mut workers = Vec::new();

    let pairs = [
        (
            ContentClass::Media,
            WorkerRole::Post,
            Destination::Vk,
            cfg.instagram.last_posts_count,
            cfg.workers.vk.post.enabled,
        ),
        (
            ContentClass::Story,
            WorkerRole::Story,
            Destination::Vk,
            cfg.instagram.last_stories_count,
            cfg.workers.vk.story.enabled,
        ),
    ];

    for (class, role, dest, limit, enabled) in pairs {
        let worker = Worker::new(class, role, dest, limit, interval, pipeline.clone());
        if enabled {
            workers.push(worker);
        } else {
            info!(worker = %worker.full_name(), "is disabled");
        }
    }
    workers
}

/// Spawn every worker onto a `JoinSet` and return it immediately. The caller
/// cancels the token and drains the set for a clean shutdown; a panicking
/// worker surfaces as a join error instead of disappearing.
pub fn start_all(workers: Vec<Worker>, shutdown: &CancellationToken) -> JoinSet<()> {
    let mut set = JoinSet::new();
    for worker in workers {
        let token = shutdown.clone();
        set.spawn(worker.run(token));
    }
    set
}
