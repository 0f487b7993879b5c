use anyhow::Context;
use clap::Parser;
use stakewatch_api::ApiState;
use stakewatch_bot::{logging, BotConfig, Core};
use stakewatch_notifier::Notifier;
use stakewatch_storage::KeyValueStorage;
use stakewatch_watcher::{Fetcher, GraphqlFetcher, NodeFetcher, SfcSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stakewatch", version, about = "Watches staking-contract events and announces them to chat groups")]
struct Cli {
    /// JSON config file; the environment is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[cfg(feature = "rocksdb")]
fn open_storage(config: &BotConfig) -> anyhow::Result<Arc<dyn KeyValueStorage>> {
    let storage = stakewatch_storage::RocksDBStorage::open(&config.storage_path)
        .with_context(|| format!("cannot open storage at {}", config.storage_path.display()))?;
    info!(path = %config.storage_path.display(), "storage opened");
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "rocksdb"))]
fn open_storage(_config: &BotConfig) -> anyhow::Result<Arc<dyn KeyValueStorage>> {
    warn!("built without rocksdb, registered channels will not survive a restart");
    Ok(Arc::new(stakewatch_storage::InMemoryStorage::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BotConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => BotConfig::from_env().context("loading configuration from environment")?,
    };

    let _guard = logging::init(config.log_format)?;
    config.validate().context("invalid configuration")?;

    let storage = open_storage(&config)?;
    let notifier = Arc::new(
        Notifier::load(storage.as_ref(), config.telegram_api_url.clone(), config.fallback_channel())
            .context("cannot restore chat channels")?,
    );
    if notifier.is_empty() {
        warn!("no chat channel registered, notifications will be dropped");
    }

    let source = Arc::new(SfcSource::new(&config.chain).context("cannot build chain client")?);
    let mut fetchers: Vec<Arc<dyn Fetcher>> = Vec::new();
    if let Some(url) = &config.chain.graphql_url {
        fetchers.push(Arc::new(GraphqlFetcher::new(url.clone())?));
    }
    fetchers.push(Arc::new(NodeFetcher::new(source.clone(), config.chain.sfc_deploy_block)));

    let core = Core::new(config.watch_settings(), source, fetchers, notifier.clone());

    let api = config.http_port.map(|port| {
        let state = Arc::new(ApiState::new(notifier, storage));
        tokio::spawn(stakewatch_api::serve(state, port, core.cancellation()))
    });

    core.start().await?;

    if let Some(api) = api {
        api.await.context("registration api task")??;
    }
    Ok(())
}
