use anyhow::bail;
use stakewatch_notifier::{MessageFormatter, Notify, STARTUP_MESSAGE};
use stakewatch_state::Keepers;
use stakewatch_types::{DelegateInfo, LockedStake, RewardClaimInfo, UndelegateInfo, UnlockedStake, Validator};
use stakewatch_watcher::{ChainSource, Fetcher, Pipeline, Supervisor};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WatchSettings;
use crate::pipelines::{EventPipeline, TransferPipeline, WatchedEvent};

/// Owns the keepers and runs one supervisor per watched category.
pub struct Core {
    settings: WatchSettings,
    source: Arc<dyn ChainSource>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    keepers: Arc<Keepers>,
    formatter: MessageFormatter,
    notifier: Arc<dyn Notify>,
    cancel: CancellationToken,
}

impl Core {
    /// `fetchers` are tried in order, both for the initial validator sync and for transfer sweeps.
    pub fn new(
        settings: WatchSettings,
        source: Arc<dyn ChainSource>,
        fetchers: Vec<Arc<dyn Fetcher>>,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        let keepers = Arc::new(Keepers::new());
        let formatter = MessageFormatter::new(settings.explorer_url.clone(), keepers.validators.clone());
        Self {
            settings,
            source,
            fetchers,
            keepers,
            formatter,
            notifier,
            cancel: CancellationToken::new(),
        }
    }

    pub fn keepers(&self) -> &Arc<Keepers> {
        &self.keepers
    }

    /// Cancelled once shutdown begins.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Populates the validator registry from the first fetcher with a non-empty answer.
    pub async fn initial_sync(&self) -> anyhow::Result<usize> {
        for fetcher in &self.fetchers {
            match fetcher.list_validators().await {
                Ok(validators) if !validators.is_empty() => {
                    let count = validators.len();
                    let last_id = validators.last().map(|v| v.id).unwrap_or_default();
                    self.keepers.validators.add_batch(validators);
                    info!(fetcher = fetcher.name(), count, last_id, "init fetch validators");
                    return Ok(count);
                }
                Ok(_) => warn!(fetcher = fetcher.name(), "fetcher returned no validators"),
                Err(e) => warn!(fetcher = fetcher.name(), error = %e, "fetcher failed to list validators"),
            }
        }
        bail!("cannot fetch validators from any fetcher")
    }

    /// Syncs, starts every watcher, announces itself, then waits for `shutdown`.
    /// Returns once every watcher has stopped.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.initial_sync().await?;

        let thresholds = &self.settings.thresholds;
        info!(
            min_staking_amount = thresholds.min_staking_amount,
            min_claim_amount = thresholds.min_claim_amount,
            min_transfer_amount = thresholds.min_transfer_amount,
            "staking watch start"
        );
        let handles = self.spawn_watchers();

        if let Err(e) = self.notifier.broadcast(STARTUP_MESSAGE).await {
            warn!(error = %e, "startup message not delivered");
        }

        shutdown.await;
        info!("shutting down");
        self.cancel.cancel();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "watch task ended abnormally");
            }
        }
        info!("staking watch stopped");
        Ok(())
    }

    /// [`Core::run_until`] an interrupt, terminate or quit signal.
    pub async fn start(&self) -> anyhow::Result<()> {
        let signals = ShutdownSignals::install()?;
        self.run_until(signals.recv()).await
    }

    fn spawn_watchers(&self) -> Vec<JoinHandle<()>> {
        let supervisor = Supervisor::new(self.source.clone(), self.settings.backoff, self.cancel.clone());

        let transfers = TransferPipeline::new(
            self.settings.shift_blocks,
            &self.settings.thresholds,
            self.fetchers.clone(),
            self.formatter.clone(),
            self.notifier.clone(),
        );

        vec![
            spawn(&supervisor, self.event_pipeline::<Validator>()),
            spawn(&supervisor, self.event_pipeline::<DelegateInfo>()),
            spawn(&supervisor, self.event_pipeline::<UndelegateInfo>()),
            spawn(&supervisor, self.event_pipeline::<LockedStake>()),
            spawn(&supervisor, self.event_pipeline::<UnlockedStake>()),
            spawn(&supervisor, self.event_pipeline::<RewardClaimInfo>()),
            spawn(&supervisor, transfers),
        ]
    }

    fn event_pipeline<E: WatchedEvent>(&self) -> EventPipeline<E> {
        EventPipeline::new(
            &self.settings.thresholds,
            self.keepers.clone(),
            self.formatter.clone(),
            self.notifier.clone(),
        )
    }
}

fn spawn<P: Pipeline>(supervisor: &Supervisor, pipeline: P) -> JoinHandle<()> {
    let supervisor = supervisor.clone();
    tokio::spawn(async move { supervisor.run(pipeline).await })
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(mut self) {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        };
        info!(signal = name, "received termination signal");
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
        }
    }
}
