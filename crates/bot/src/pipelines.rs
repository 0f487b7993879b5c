//! Filter-and-notify steps plugged into the generic watch supervisor.

use async_trait::async_trait;
use serde_json::Value;
use stakewatch_notifier::{MessageFormatter, Notify};
use stakewatch_state::Keepers;
use stakewatch_types::{
    BlockNumber, DelegateInfo, EventCategory, LockedStake, RewardClaimInfo, UndelegateInfo,
    UnlockedStake, Validator,
};
use stakewatch_watcher::decoder;
use stakewatch_watcher::{DecodeError, Fetcher, Pipeline};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Thresholds;

/// A staking-contract event with its decoding, threshold, bookkeeping and message.
pub trait WatchedEvent: Send + Sync + Sized + 'static {
    const CATEGORY: EventCategory;

    fn decode(raw: &Value) -> Result<Self, DecodeError>;

    /// Minimum the event's amount must exceed; `None` means always announced.
    fn threshold(thresholds: &Thresholds) -> Option<f64>;

    fn amount(&self) -> f64;

    /// Transaction hash, or the address for events that have none.
    fn reference(&self) -> &str;

    fn record(&self, keepers: &Keepers);

    fn message(&self, formatter: &MessageFormatter) -> String;
}

impl WatchedEvent for Validator {
    const CATEGORY: EventCategory = EventCategory::CreatedValidator;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_created_validator(raw)
    }

    fn threshold(_: &Thresholds) -> Option<f64> {
        None
    }

    fn amount(&self) -> f64 {
        0.0
    }

    fn reference(&self) -> &str {
        &self.address
    }

    fn record(&self, keepers: &Keepers) {
        keepers.validators.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.created_validator(self)
    }
}

impl WatchedEvent for DelegateInfo {
    const CATEGORY: EventCategory = EventCategory::Delegate;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_delegate(raw)
    }

    fn threshold(thresholds: &Thresholds) -> Option<f64> {
        Some(thresholds.min_staking_amount)
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn reference(&self) -> &str {
        &self.tx_hash
    }

    fn record(&self, keepers: &Keepers) {
        keepers.delegations.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.delegation(self)
    }
}

impl WatchedEvent for UndelegateInfo {
    const CATEGORY: EventCategory = EventCategory::Undelegate;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_undelegate(raw)
    }

    fn threshold(thresholds: &Thresholds) -> Option<f64> {
        Some(thresholds.min_staking_amount)
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn reference(&self) -> &str {
        &self.tx_hash
    }

    fn record(&self, keepers: &Keepers) {
        keepers.undelegations.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.undelegation(self)
    }
}

impl WatchedEvent for LockedStake {
    const CATEGORY: EventCategory = EventCategory::LockedStake;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_locked_stake(raw)
    }

    fn threshold(thresholds: &Thresholds) -> Option<f64> {
        Some(thresholds.min_staking_amount)
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn reference(&self) -> &str {
        &self.tx_hash
    }

    fn record(&self, keepers: &Keepers) {
        keepers.locked_stakes.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.locked_stake(self)
    }
}

impl WatchedEvent for UnlockedStake {
    const CATEGORY: EventCategory = EventCategory::UnlockedStake;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_unlocked_stake(raw)
    }

    fn threshold(thresholds: &Thresholds) -> Option<f64> {
        Some(thresholds.min_staking_amount)
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn reference(&self) -> &str {
        &self.tx_hash
    }

    fn record(&self, keepers: &Keepers) {
        keepers.unlocked_stakes.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.unlocked_stake(self)
    }
}

impl WatchedEvent for RewardClaimInfo {
    const CATEGORY: EventCategory = EventCategory::RewardClaim;

    fn decode(raw: &Value) -> Result<Self, DecodeError> {
        decoder::decode_reward_claim(raw)
    }

    fn threshold(thresholds: &Thresholds) -> Option<f64> {
        Some(thresholds.min_claim_amount)
    }

    fn amount(&self) -> f64 {
        self.unlocked_reward
    }

    fn reference(&self) -> &str {
        &self.tx_hash
    }

    fn record(&self, keepers: &Keepers) {
        keepers.rewards.add(self.clone());
    }

    fn message(&self, formatter: &MessageFormatter) -> String {
        formatter.reward_claim(self)
    }
}

/// Strictly greater than: an amount equal to the minimum is suppressed.
pub fn passes(amount: f64, minimum: Option<f64>) -> bool {
    match minimum {
        Some(minimum) => amount > minimum,
        None => true,
    }
}

async fn announce(notifier: &dyn Notify, category: EventCategory, message: &str) {
    if let Err(e) = notifier.broadcast(message).await {
        debug!(category = %category, error = %e, "bot send message error");
    }
}

pub struct EventPipeline<E> {
    minimum: Option<f64>,
    keepers: Arc<Keepers>,
    formatter: MessageFormatter,
    notifier: Arc<dyn Notify>,
    _event: PhantomData<fn() -> E>,
}

impl<E: WatchedEvent> EventPipeline<E> {
    pub fn new(
        thresholds: &Thresholds,
        keepers: Arc<Keepers>,
        formatter: MessageFormatter,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        Self {
            minimum: E::threshold(thresholds),
            keepers,
            formatter,
            notifier,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E: WatchedEvent> Pipeline for EventPipeline<E> {
    type Item = E;

    fn category(&self) -> EventCategory {
        E::CATEGORY
    }

    fn decode(&self, raw: &Value) -> Result<E, DecodeError> {
        E::decode(raw)
    }

    async fn process(&self, event: E) {
        if !passes(event.amount(), self.minimum) {
            return;
        }
        let category = E::CATEGORY;
        debug!(category = %category, reference = event.reference(), amount = event.amount(), "new event");

        event.record(&self.keepers);
        let message = event.message(&self.formatter);
        announce(self.notifier.as_ref(), category, &message).await;
    }
}

/// Sweeps `head - shift_blocks` for plain-value transfers on every new head.
pub struct TransferPipeline {
    shift_blocks: u64,
    minimum: f64,
    fetchers: Vec<Arc<dyn Fetcher>>,
    formatter: MessageFormatter,
    notifier: Arc<dyn Notify>,
}

impl TransferPipeline {
    pub fn new(
        shift_blocks: u64,
        thresholds: &Thresholds,
        fetchers: Vec<Arc<dyn Fetcher>>,
        formatter: MessageFormatter,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        Self {
            shift_blocks,
            minimum: thresholds.min_transfer_amount,
            fetchers,
            formatter,
            notifier,
        }
    }
}

#[async_trait]
impl Pipeline for TransferPipeline {
    type Item = BlockNumber;

    fn category(&self) -> EventCategory {
        EventCategory::Transfer
    }

    fn decode(&self, raw: &Value) -> Result<BlockNumber, DecodeError> {
        decoder::decode_new_head(raw)
    }

    async fn process(&self, head: BlockNumber) {
        let Some(target) = head.checked_sub(self.shift_blocks) else {
            debug!(head, "chain shorter than shift, nothing to sweep");
            return;
        };

        for fetcher in &self.fetchers {
            let transfers = match fetcher.transfers_in_block(target).await {
                Ok(transfers) => transfers,
                Err(e) => {
                    warn!(fetcher = fetcher.name(), block_number = target, error = %e, "transfer sweep failed");
                    continue;
                }
            };

            for transfer in transfers.iter().filter(|t| passes(t.amount, Some(self.minimum))) {
                debug!(tx_hash = %transfer.tx_hash, block_number = target, "new big transfer event");
                let message = self.formatter.big_transfer(transfer);
                announce(self.notifier.as_ref(), EventCategory::Transfer, &message).await;
            }
            return;
        }
        warn!(block_number = target, "no fetcher could sweep block");
    }
}
