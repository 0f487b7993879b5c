//! Per-category subscription supervisor.
//!
//! ```text
//! SUBSCRIBING --ok--> LISTENING --error/closed--> BACKOFF --interval--> SUBSCRIBING
//!      |                  |                          |
//!      +---- failure -----|------------------------->+
//!   cancel from any state ends in STOPPED
//! ```
//!
//! Delivery is at-least-once across resubscribes: nothing is replayed from a
//! stored offset and nothing is deduplicated.

use async_trait::async_trait;
use serde_json::Value;
use stakewatch_types::EventCategory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DecodeError;
use crate::source::{ChainSource, Subscription};

/// What a supervisor does with each delivered record of its category.
#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    type Item: Send;

    fn category(&self) -> EventCategory;

    fn decode(&self, raw: &Value) -> Result<Self::Item, DecodeError>;

    /// Filter, record and notify. Failures are handled here, never surfaced.
    async fn process(&self, item: Self::Item);
}

enum WatchState {
    Subscribing,
    Listening(Subscription),
    Backoff,
    Stopped,
}

#[derive(Clone)]
pub struct Supervisor {
    source: Arc<dyn ChainSource>,
    backoff: Duration,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(source: Arc<dyn ChainSource>, backoff: Duration, cancel: CancellationToken) -> Self {
        Self {
            source,
            backoff,
            cancel,
        }
    }

    /// Runs until cancelled. Subscription failures are retried forever.
    pub async fn run<P: Pipeline>(&self, pipeline: P) {
        let category = pipeline.category();
        info!(category = %category, "watch started");

        let mut state = WatchState::Subscribing;
        loop {
            state = match state {
                WatchState::Subscribing => self.subscribe(category).await,
                WatchState::Listening(mut subscription) => self.listen(&pipeline, &mut subscription).await,
                WatchState::Backoff => {
                    debug!(category = %category, backoff_ms = self.backoff.as_millis() as u64, "backoff");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => WatchState::Stopped,
                        _ = tokio::time::sleep(self.backoff) => WatchState::Subscribing,
                    }
                }
                WatchState::Stopped => {
                    info!(category = %category, "watch stopped");
                    return;
                }
            };
        }
    }

    async fn subscribe(&self, category: EventCategory) -> WatchState {
        debug!(category = %category, "subscribing");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => WatchState::Stopped,
            result = self.source.subscribe(category) => match result {
                Ok(subscription) => {
                    debug!(category = %category, "subscription established");
                    WatchState::Listening(subscription)
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "reset subscription");
                    WatchState::Backoff
                }
            },
        }
    }

    /// Buffered records are drained before a terminal error is acted on.
    async fn listen<P: Pipeline>(&self, pipeline: &P, subscription: &mut Subscription) -> WatchState {
        let category = pipeline.category();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WatchState::Stopped,
                event = subscription.events.recv() => match event {
                    Some(raw) => {
                        // A slow sweep must not hold up shutdown.
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return WatchState::Stopped,
                            _ = self.handle(pipeline, raw) => {}
                        }
                    }
                    None => {
                        let reason = match subscription.error.try_recv() {
                            Ok(e) => e.to_string(),
                            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => "stream closed".to_string(),
                        };
                        warn!(category = %category, error = %reason, "reset subscription");
                        return WatchState::Backoff;
                    }
                },
                error = &mut subscription.error => {
                    let reason = match error {
                        Ok(e) => e.to_string(),
                        Err(_) => "error channel closed".to_string(),
                    };
                    warn!(category = %category, error = %reason, "reset subscription");
                    return WatchState::Backoff;
                }
            }
        }
    }

    async fn handle<P: Pipeline>(&self, pipeline: &P, raw: Value) {
        match pipeline.decode(&raw) {
            Ok(item) => pipeline.process(item).await,
            Err(e) => warn!(category = %pipeline.category(), error = %e, "dropping undecodable event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::source::SubscriptionFeed;
    use serde_json::json;
    use stakewatch_types::BlockNumber;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    enum Script {
        Fail,
        ErrorAfter(Vec<Value>),
        Deliver(Vec<Value>),
    }

    /// Source that plays one script per `subscribe` call, then idles.
    struct ScriptedSource {
        scripts: Mutex<VecDeque<Script>>,
        subscribed_at: Mutex<Vec<Instant>>,
        live_feeds: Mutex<Vec<SubscriptionFeed>>,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                subscribed_at: Mutex::new(Vec::new()),
                live_feeds: Mutex::new(Vec::new()),
            })
        }

        fn subscribe_times(&self) -> Vec<Instant> {
            self.subscribed_at.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChainSource for ScriptedSource {
        async fn subscribe(&self, _category: EventCategory) -> Result<Subscription, WatchError> {
            self.subscribed_at.lock().unwrap().push(Instant::now());
            let script = self.scripts.lock().unwrap().pop_front();
            let (mut feed, subscription) = Subscription::channel();
            match script {
                Some(Script::Fail) => return Err(WatchError::Closed),
                Some(Script::ErrorAfter(events)) => {
                    for event in events {
                        feed.deliver(event).await?;
                    }
                    feed.fail(WatchError::Rpc {
                        code: -32000,
                        message: "node restarted".to_string(),
                    });
                }
                Some(Script::Deliver(events)) => {
                    for event in events {
                        feed.deliver(event).await?;
                    }
                    self.live_feeds.lock().unwrap().push(feed);
                }
                None => self.live_feeds.lock().unwrap().push(feed),
            }
            Ok(subscription)
        }

        async fn poll(
            &self,
            category: EventCategory,
            _from_block: BlockNumber,
            _to_block: Option<BlockNumber>,
        ) -> Result<Vec<Value>, WatchError> {
            Err(WatchError::Unsupported(format!("polling {}", category)))
        }

        async fn latest_block_number(&self) -> Result<BlockNumber, WatchError> {
            Ok(0)
        }
    }

    struct RecordingPipeline {
        seen: mpsc::UnboundedSender<(u64, Instant)>,
    }

    #[async_trait]
    impl Pipeline for RecordingPipeline {
        type Item = u64;

        fn category(&self) -> EventCategory {
            EventCategory::Delegate
        }

        fn decode(&self, raw: &Value) -> Result<u64, DecodeError> {
            raw.get("n").and_then(|v| v.as_u64()).ok_or(DecodeError::MissingField("n"))
        }

        async fn process(&self, item: u64) {
            let _ = self.seen.send((item, Instant::now()));
        }
    }

    fn start(
        source: Arc<ScriptedSource>,
    ) -> (
        CancellationToken,
        mpsc::UnboundedReceiver<(u64, Instant)>,
        tokio::task::JoinHandle<()>,
    ) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(source, Duration::from_secs(1), cancel.clone());
        let handle = tokio::spawn(async move { supervisor.run(RecordingPipeline { seen: tx }).await });
        (cancel, rx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_delivered_in_order() {
        let source = ScriptedSource::new(vec![Script::Deliver(vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})])]);
        let (cancel, mut seen, handle) = start(source.clone());

        for expected in 1..=3 {
            assert_eq!(seen.recv().await.unwrap().0, expected);
        }
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(source.subscribe_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_backoff_then_single_delivery() {
        let source = ScriptedSource::new(vec![
            Script::ErrorAfter(vec![]),
            Script::Deliver(vec![json!({"n": 7})]),
        ]);
        let started = Instant::now();
        let (cancel, mut seen, handle) = start(source.clone());

        let (item, at) = seen.recv().await.unwrap();
        assert_eq!(item, 7);
        assert!(at - started >= Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(seen.try_recv().is_err());

        let times = source.subscribe_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(1));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_events_not_redelivered_after_reset() {
        let source = ScriptedSource::new(vec![
            Script::ErrorAfter(vec![json!({"n": 1}), json!({"n": 2})]),
            Script::Deliver(vec![json!({"n": 3})]),
        ]);
        let (cancel, mut seen, handle) = start(source.clone());

        let mut items = Vec::new();
        for _ in 0..3 {
            items.push(seen.recv().await.unwrap().0);
        }
        assert_eq!(items, vec![1, 2, 3]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(seen.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscribe_retries_after_backoff() {
        let source = ScriptedSource::new(vec![Script::Fail, Script::Fail, Script::Deliver(vec![json!({"n": 1})])]);
        let (cancel, mut seen, handle) = start(source.clone());

        assert_eq!(seen.recv().await.unwrap().0, 1);
        let times = source.subscribe_times();
        assert_eq!(times.len(), 3);
        assert!(times[2] - times[0] >= Duration::from_secs(2));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_event_dropped_without_reset() {
        let source = ScriptedSource::new(vec![Script::Deliver(vec![json!({"bogus": true}), json!({"n": 9})])]);
        let (cancel, mut seen, handle) = start(source.clone());

        assert_eq!(seen.recv().await.unwrap().0, 9);
        assert_eq!(source.subscribe_times().len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    /// Pipeline whose processing outlives any reasonable shutdown.
    struct StalledPipeline {
        started: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Pipeline for StalledPipeline {
        type Item = u64;

        fn category(&self) -> EventCategory {
            EventCategory::Transfer
        }

        fn decode(&self, _raw: &Value) -> Result<u64, DecodeError> {
            Ok(0)
        }

        async fn process(&self, _item: u64) {
            let _ = self.started.send(());
            tokio::time::sleep(Duration::from_secs(120)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_processing() {
        let source = ScriptedSource::new(vec![Script::Deliver(vec![json!({"number": "0x10"})])]);
        let cancel = CancellationToken::new();
        let (tx, mut started) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(source, Duration::from_secs(1), cancel.clone());
        let handle = tokio::spawn(async move { supervisor.run(StalledPipeline { started: tx }).await });

        started.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let cancelled_at = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops() {
        let source = ScriptedSource::new(vec![Script::Fail]);
        let (cancel, _seen, handle) = start(source.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(source.subscribe_times().len(), 1);
    }
}
