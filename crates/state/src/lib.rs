mod history;
mod validators;

pub use history::History;
pub use validators::ValidatorRegistry;

use std::sync::Arc;

use stakewatch_types::{DelegateInfo, LockedStake, RewardClaimInfo, UndelegateInfo, UnlockedStake};

pub type DelegateHistory = History<DelegateInfo>;
pub type UndelegateHistory = History<UndelegateInfo>;
pub type RewardHistory = History<RewardClaimInfo>;
pub type LockedStakeHistory = History<LockedStake>;
pub type UnlockedStakeHistory = History<UnlockedStake>;

/// Every in-memory registry shared between the watch loops.
///
/// Only the watch loops and the orchestrator write here; message formatting reads.
#[derive(Debug, Default)]
pub struct Keepers {
    pub validators: Arc<ValidatorRegistry>,
    pub delegations: DelegateHistory,
    pub undelegations: UndelegateHistory,
    pub rewards: RewardHistory,
    pub locked_stakes: LockedStakeHistory,
    pub unlocked_stakes: UnlockedStakeHistory,
}

impl Keepers {
    pub fn new() -> Self {
        Self::default()
    }
}
