mod support;

use ig2vk::config;
use ig2vk::model::{ContentClass, Destination, ItemDetail, MediaKind, WorkerRole};
use ig2vk::pipeline::Pipeline;
use ig2vk::transfer::Downloader;
use ig2vk::worker::{build_workers, start_all, Worker};
use std::sync::Arc;
use std::time::Duration;
use support::{FakeNet, FakeSource, MemStore, PublishCall, RecordingPublisher};
use tokio_util::sync::CancellationToken;

fn image_detail(id: &str) -> ItemDetail {
    ItemDetail {
        id: id.to_string(),
        media_url: format!("https://cdn/{id}.jpg"),
        caption: id.to_string(),
        kind: MediaKind::Image,
        permalink: String::new(),
    }
}

fn make_pipeline(
    pool: sqlx::SqlitePool,
    source: Arc<FakeSource>,
    net: Arc<FakeNet>,
    publisher: Arc<RecordingPublisher>,
) -> Arc<Pipeline> {
    Arc::new(Pipeline {
        pool,
        source,
        downloader: Downloader::with_policy(net.clone(), 3, Duration::from_millis(1)),
        fetcher: net.clone(),
        store: Arc::new(MemStore::new(net)),
        publisher,
    })
}

#[tokio::test]
async fn reverse_chronological_listing_is_dispatched_oldest_first() {
    let pool = support::setup_pool().await;
    let source = Arc::new(
        FakeSource::default()
            .with_listing(ContentClass::Media, &["c", "b", "a"])
            .with_detail(image_detail("a"))
            .with_detail(image_detail("b"))
            .with_detail(image_detail("c")),
    );
    let net = Arc::new(FakeNet::default());
    for id in ["a", "b", "c"] {
        net.objects.lock().unwrap().insert(
            format!("https://cdn/{id}.jpg"),
            bytes::Bytes::from_static(b"x"),
        );
    }
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = make_pipeline(pool, source, net, publisher.clone());

    let worker = Worker::new(
        ContentClass::Media,
        WorkerRole::Post,
        Destination::Vk,
        3,
        Duration::from_secs(300),
        pipeline,
    );
    worker.cycle(&CancellationToken::new()).await;

    let names: Vec<String> = publisher
        .calls()
        .into_iter()
        .map(|c| match c {
            PublishCall::PostImage { name, .. } => name,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn listing_limit_is_respected() {
    let pool = support::setup_pool().await;
    let source = Arc::new(
        FakeSource::default()
            .with_listing(ContentClass::Media, &["e", "d", "c", "b", "a"])
            .with_detail(image_detail("d"))
            .with_detail(image_detail("e")),
    );
    let net = Arc::new(FakeNet::default());
    for id in ["d", "e"] {
        net.objects.lock().unwrap().insert(
            format!("https://cdn/{id}.jpg"),
            bytes::Bytes::from_static(b"x"),
        );
    }
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = make_pipeline(pool, source, net, publisher.clone());

    let worker = Worker::new(
        ContentClass::Media,
        WorkerRole::Post,
        Destination::Vk,
        2,
        Duration::from_secs(300),
        pipeline,
    );
    worker.cycle(&CancellationToken::new()).await;

    // Only the two newest listed ids were considered, oldest of those first.
    let names: Vec<String> = publisher
        .calls()
        .into_iter()
        .map(|c| match c {
            PublishCall::PostImage { name, .. } => name,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["d", "e"]);
}

#[tokio::test]
async fn cancellation_interrupts_the_inter_cycle_sleep() {
    let pool = support::setup_pool().await;
    let source = Arc::new(FakeSource::default().with_listing(ContentClass::Media, &[]));
    let net = Arc::new(FakeNet::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = make_pipeline(pool, source, net, publisher);

    // An hour-long sleep: the test only passes if cancellation cuts it short.
    let worker = Worker::new(
        ContentClass::Media,
        WorkerRole::Post,
        Destination::Vk,
        3,
        Duration::from_secs(3600),
        pipeline,
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop promptly")
        .unwrap();
}

#[tokio::test]
async fn disabled_pairs_are_never_started() {
    let mut cfg: config::Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.workers.vk.story.enabled = false;

    let pool = support::setup_pool().await;
    let pipeline = make_pipeline(
        pool,
        Arc::new(FakeSource::default()),
        Arc::new(FakeNet::default()),
        Arc::new(RecordingPublisher::default()),
    );

    let workers = build_workers(&cfg, pipeline);
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].full_name(), "vk:worker:post");
}

#[tokio::test]
async fn start_all_spawns_and_joins_cleanly() {
    let cfg: config::Config = serde_yaml::from_str(config::example()).unwrap();
    let pool = support::setup_pool().await;
    let pipeline = make_pipeline(
        pool,
        Arc::new(FakeSource::default()),
        Arc::new(FakeNet::default()),
        Arc::new(RecordingPublisher::default()),
    );

    let shutdown = CancellationToken::new();
    let mut set = start_all(build_workers(&cfg, pipeline), &shutdown);
    assert_eq!(set.len(), 2);

    shutdown.cancel();
    while let Some(res) = tokio::time::timeout(Duration::from_secs(5), set.join_next())
        .await
        .expect("join timed out")
    {
        res.unwrap();
    }
}
