use sha3::{Digest, Keccak256};
use stakewatch_types::EventCategory;

pub const CREATED_VALIDATOR: &str = "CreatedValidator(uint256,address,uint256,uint256)";
pub const DELEGATED: &str = "Delegated(address,uint256,uint256)";
pub const UNDELEGATED: &str = "Undelegated(address,uint256,uint256,uint256)";
pub const LOCKED_UP_STAKE: &str = "LockedUpStake(address,uint256,uint256,uint256)";
pub const UNLOCKED_STAKE: &str = "UnlockedStake(address,uint256,uint256,uint256)";
pub const CLAIMED_REWARDS: &str = "ClaimedRewards(address,uint256,uint256,uint256,uint256)";

/// Staking-contract event signature for a category, `None` for transfers.
pub fn event_signature(category: EventCategory) -> Option<&'static str> {
    match category {
        EventCategory::CreatedValidator => Some(CREATED_VALIDATOR),
        EventCategory::Delegate => Some(DELEGATED),
        EventCategory::Undelegate => Some(UNDELEGATED),
        EventCategory::LockedStake => Some(LOCKED_UP_STAKE),
        EventCategory::UnlockedStake => Some(UNLOCKED_STAKE),
        EventCategory::RewardClaim => Some(CLAIMED_REWARDS),
        EventCategory::Transfer => None,
    }
}

pub fn keccak_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(signature.as_bytes())))
}

/// The `topics[0]` value that identifies the category's log.
pub fn topic0(category: EventCategory) -> Option<String> {
    event_signature(category).map(keccak_topic)
}
