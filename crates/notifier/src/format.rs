//! HTML message bodies for each watched category.

use stakewatch_state::ValidatorRegistry;
use stakewatch_types::amount::TOKEN_SYMBOL;
use stakewatch_types::{
    glyph, DelegateInfo, LockedStake, RewardClaimInfo, TransferLog, UndelegateInfo, UnlockedStake,
    Validator, ValidatorId,
};
use std::sync::Arc;

pub const STARTUP_MESSAGE: &str = "staking watch started";

#[derive(Clone)]
pub struct MessageFormatter {
    explorer_url: String,
    validators: Arc<ValidatorRegistry>,
}

impl MessageFormatter {
    pub fn new(explorer_url: impl Into<String>, validators: Arc<ValidatorRegistry>) -> Self {
        Self {
            explorer_url: explorer_url.into().trim_end_matches('/').to_string(),
            validators,
        }
    }

    fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }

    fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }

    /// Links the validator when the registry knows its address.
    fn validator_ref(&self, id: ValidatorId) -> String {
        match self.validators.get_by_id(id) {
            Some(validator) => format!(
                "<a href=\"{}\">validator ID {}</a>",
                self.address_url(&validator.address),
                id
            ),
            None => format!("validator ID {}", id),
        }
    }

    fn stake_event(
        &self,
        glyph: &str,
        event: &str,
        tx_hash: &str,
        amount: f64,
        delegator: &str,
        validator_id: ValidatorId,
    ) -> String {
        format!(
            "{} {} <a href=\"{}\">{}</a> of <b>{}</b> from <code>{}</code> to {}",
            glyph,
            article(event),
            self.tx_url(tx_hash),
            event,
            amount_text(amount),
            delegator,
            self.validator_ref(validator_id)
        )
    }

    pub fn created_validator(&self, validator: &Validator) -> String {
        format!(
            "{} A new <a href=\"{}\">created validator</a> with ID <b>{}</b>",
            glyph::NEW,
            self.address_url(&validator.address),
            validator.id
        )
    }

    pub fn delegation(&self, item: &DelegateInfo) -> String {
        self.stake_event(
            glyph::CHECK_MARK,
            "delegation event",
            &item.tx_hash,
            item.amount,
            &item.delegator,
            item.to_validator_id,
        )
    }

    pub fn undelegation(&self, item: &UndelegateInfo) -> String {
        self.stake_event(
            glyph::CROSS_MARK,
            "undelegation event",
            &item.tx_hash,
            item.amount,
            &item.delegator,
            item.to_validator_id,
        )
    }

    pub fn locked_stake(&self, item: &LockedStake) -> String {
        self.stake_event(
            glyph::LOCK,
            "locked up stake event",
            &item.tx_hash,
            item.amount,
            &item.delegator,
            item.validator_id,
        )
    }

    pub fn unlocked_stake(&self, item: &UnlockedStake) -> String {
        self.stake_event(
            glyph::UNLOCK,
            "unlocked stake event",
            &item.tx_hash,
            item.amount,
            &item.delegator,
            item.validator_id,
        )
    }

    pub fn reward_claim(&self, item: &RewardClaimInfo) -> String {
        self.stake_event(
            glyph::STAR,
            "reward claim event",
            &item.tx_hash,
            item.unlocked_reward,
            &item.delegator,
            item.to_validator_id,
        )
    }

    pub fn big_transfer(&self, item: &TransferLog) -> String {
        format!(
            "{} Big <a href=\"{}\">transfer</a> of <b>{}</b> from <code>{}</code> to <code>{}</code>",
            glyph::WHALE,
            self.tx_url(&item.tx_hash),
            amount_text(item.amount),
            item.from,
            item.to
        )
    }
}

fn amount_text(amount: f64) -> String {
    format!("{:.6} {}", amount, TOKEN_SYMBOL)
}

fn article(noun: &str) -> &'static str {
    match noun.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
        _ => "A",
    }
}
