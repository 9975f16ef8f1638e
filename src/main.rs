use anyhow::Result;
use clap::Parser;
use ig2vk::pipeline::Pipeline;
use ig2vk::source::InstagramClient;
use ig2vk::storage::GcsStore;
use ig2vk::transfer::{Downloader, HttpFetcher};
use ig2vk::vk::VkClient;
use ig2vk::{config, db, worker};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.database.url).await?;
    db::run_migrations(&pool).await?;

    let http = reqwest::Client::builder()
        .user_agent("ig2vk/0.1")
        .build()
        .expect("reqwest client");

    let fetcher = Arc::new(HttpFetcher::new(http.clone()));
    let pipeline = Arc::new(Pipeline {
        pool: pool.clone(),
        source: Arc::new(InstagramClient::from_config(http.clone(), &cfg.instagram)),
        downloader: Downloader::new(fetcher.clone()),
        fetcher,
        store: Arc::new(GcsStore::from_config(http.clone(), &cfg.gcs)),
        publisher: Arc::new(VkClient::from_config(http, &cfg.vk)),
    });

    let shutdown = CancellationToken::new();
    let workers = worker::build_workers(&cfg, pipeline);
    let mut tasks = worker::start_all(workers, &shutdown);

    info!("workers started; waiting for interrupt");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    while let Some(res) = tasks.join_next().await {
        if let Err(err) = res {
            error!(?err, "worker task aborted");
        }
    }
    pool.close().await;
    Ok(())
}
