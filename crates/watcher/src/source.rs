use async_trait::async_trait;
use serde_json::Value;
use stakewatch_types::{BlockNumber, EventCategory};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::WatchError;

/// Buffer between a subscription's connection task and its supervisor.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// A live push subscription.
///
/// `events` yields raw records in delivery order. `error` fires at most once, after
/// which the subscription is dead. Dropping the value releases the connection.
pub struct Subscription {
    pub events: mpsc::Receiver<Value>,
    pub error: oneshot::Receiver<WatchError>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<Value>, error: oneshot::Receiver<WatchError>) -> Self {
        Self {
            events,
            error,
            task: None,
        }
    }

    /// Ties the task that feeds this subscription to its lifetime.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Sender halves for a source that feeds the subscription itself.
    pub fn channel() -> (SubscriptionFeed, Self) {
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (error_tx, error_rx) = oneshot::channel();
        (
            SubscriptionFeed {
                events: event_tx,
                error: Some(error_tx),
            },
            Self::new(event_rx, error_rx),
        )
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Producer side of a [`Subscription`].
pub struct SubscriptionFeed {
    events: mpsc::Sender<Value>,
    error: Option<oneshot::Sender<WatchError>>,
}

impl SubscriptionFeed {
    /// Delivers one record; fails once the subscriber is gone.
    pub async fn deliver(&self, event: Value) -> Result<(), WatchError> {
        self.events.send(event).await.map_err(|_| WatchError::Closed)
    }

    /// Fires the terminal error signal. Later calls are ignored.
    pub fn fail(&mut self, error: WatchError) {
        if let Some(tx) = self.error.take() {
            let _ = tx.send(error);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Point-in-time and push access to the staking contract's events.
#[async_trait]
pub trait ChainSource: Send + Sync + 'static {
    /// Opens a push subscription for one category. Transfers subscribe to new heads.
    async fn subscribe(&self, category: EventCategory) -> Result<Subscription, WatchError>;

    /// Historical records in `[from_block, to_block]`, sorted ascending by block number.
    /// A missing `to_block` means the current head.
    async fn poll(
        &self,
        category: EventCategory,
        from_block: BlockNumber,
        to_block: Option<BlockNumber>,
    ) -> Result<Vec<Value>, WatchError>;

    async fn latest_block_number(&self) -> Result<BlockNumber, WatchError>;
}

/// Splits `[from, to]` into consecutive inclusive windows of at most `range` blocks.
pub fn block_windows(from: BlockNumber, to: BlockNumber, range: u64) -> Vec<(BlockNumber, BlockNumber)> {
    let range = range.max(1);
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(range - 1).min(to);
        windows.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    windows
}

/// Stable ascending sort of raw logs by their `blockNumber`; unparseable ones sort last.
pub fn sort_by_block_number(logs: &mut [Value]) {
    logs.sort_by_key(|log| {
        log.get("blockNumber")
            .and_then(|v| v.as_str())
            .and_then(|v| crate::decoder::parse_quantity("blockNumber", v).ok())
            .unwrap_or(u64::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_windows() {
        assert_eq!(block_windows(0, 9, 5), vec![(0, 4), (5, 9)]);
        assert_eq!(block_windows(0, 10, 5), vec![(0, 4), (5, 9), (10, 10)]);
        assert_eq!(block_windows(7, 7, 50_000), vec![(7, 7)]);
        assert!(block_windows(10, 9, 5).is_empty());
    }

    #[test]
    fn test_block_windows_cover_large_range() {
        let windows = block_windows(1, 120_000, 50_000);
        assert_eq!(windows, vec![(1, 50_000), (50_001, 100_000), (100_001, 120_000)]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut logs = vec![
            json!({"blockNumber": "0x5", "logIndex": "0x0"}),
            json!({"blockNumber": "0x2", "logIndex": "0x0"}),
            json!({"blockNumber": "0x5", "logIndex": "0x1"}),
            json!({"blockNumber": "0x2", "logIndex": "0x1"}),
        ];
        sort_by_block_number(&mut logs);

        let order: Vec<(&str, &str)> = logs
            .iter()
            .map(|l| (l["blockNumber"].as_str().unwrap(), l["logIndex"].as_str().unwrap()))
            .collect();
        assert_eq!(order, vec![("0x2", "0x0"), ("0x2", "0x1"), ("0x5", "0x0"), ("0x5", "0x1")]);
    }

    #[tokio::test]
    async fn test_feed_fails_once() {
        let (mut feed, mut subscription) = Subscription::channel();
        feed.deliver(json!({"n": 1})).await.unwrap();
        feed.fail(WatchError::Closed);
        feed.fail(WatchError::Unsupported("second".to_string()));

        assert_eq!(subscription.events.recv().await.unwrap(), json!({"n": 1}));
        assert!(matches!((&mut subscription.error).await, Ok(WatchError::Closed)));
    }
}
