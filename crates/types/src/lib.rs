mod constants;
mod units;

pub use constants::*;
pub use units::{normalize_amount, wei_to_float};

pub use num_bigint::BigUint;

pub type ValidatorId = u64;
pub type BlockNumber = u64;
/// Identifier of a chat destination (Telegram chat id).
pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventCategory {
    CreatedValidator,
    Delegate,
    Undelegate,
    LockedStake,
    UnlockedStake,
    RewardClaim,
    /// Plain-value transfers, found by sweeping blocks announced by new heads.
    Transfer,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::CreatedValidator,
        EventCategory::Delegate,
        EventCategory::Undelegate,
        EventCategory::LockedStake,
        EventCategory::UnlockedStake,
        EventCategory::RewardClaim,
        EventCategory::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::CreatedValidator => "created_validator",
            EventCategory::Delegate => "delegate",
            EventCategory::Undelegate => "undelegate",
            EventCategory::LockedStake => "locked_stake",
            EventCategory::UnlockedStake => "unlocked_stake",
            EventCategory::RewardClaim => "reward_claim",
            EventCategory::Transfer => "transfer",
        }
    }

    /// Whether this category is delivered as a staking-contract log.
    pub fn is_contract_event(&self) -> bool {
        !matches!(self, EventCategory::Transfer)
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Validator {
    pub id: ValidatorId,
    pub address: String,
    pub created_time: u64,
    pub created_epoch: u64,
    pub deactivated_time: u64,
    pub deactivated_epoch: u64,
    pub is_active: bool,
    pub is_offline: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DelegateInfo {
    pub delegator: String,
    pub to_validator_id: ValidatorId,
    pub amount: f64,
    pub block_number: BlockNumber,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UndelegateInfo {
    pub delegator: String,
    pub to_validator_id: ValidatorId,
    pub amount: f64,
    /// Withdrawal-request id assigned by the staking contract.
    pub wr_id: u64,
    pub block_number: BlockNumber,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LockedStake {
    pub delegator: String,
    pub validator_id: ValidatorId,
    /// Lockup duration in seconds.
    pub duration: u64,
    pub amount: f64,
    pub block_number: BlockNumber,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnlockedStake {
    pub delegator: String,
    pub validator_id: ValidatorId,
    pub amount: f64,
    pub penalty: f64,
    pub block_number: BlockNumber,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RewardClaimInfo {
    pub delegator: String,
    pub to_validator_id: ValidatorId,
    pub lockup_extra_reward: f64,
    pub lockup_base_reward: f64,
    pub unlocked_reward: f64,
    pub block_number: BlockNumber,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransferLog {
    pub block_number: BlockNumber,
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
}
