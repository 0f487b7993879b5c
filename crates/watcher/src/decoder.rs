//! Raw JSON-RPC records to typed staking events.
//!
//! Every monetary word goes through [`wei_to_float`]; identifier words must fit in
//! 64 bits. Nothing here performs I/O.

use serde::Deserialize;
use serde_json::Value;
use stakewatch_types::{
    wei_to_float, BigUint, DelegateInfo, EventCategory, LockedStake, RewardClaimInfo,
    TransferLog, UndelegateInfo, UnlockedStake, Validator,
};
use tracing::debug;

use crate::error::DecodeError;
use crate::topics::topic0;

type Word = [u8; 32];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    pub fn parse(raw: &Value) -> Result<Self, DecodeError> {
        RawLog::deserialize(raw).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Rejects logs of another event or logs the node has retracted.
    fn expect(&self, category: EventCategory) -> Result<(), DecodeError> {
        if self.removed {
            return Err(DecodeError::Removed);
        }
        let expected = topic0(category).ok_or(DecodeError::MissingField("topics"))?;
        let actual = self.topics.first().ok_or(DecodeError::MissingField("topics"))?;
        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(DecodeError::UnexpectedTopic(actual.clone()));
        }
        Ok(())
    }

    fn topic(&self, index: usize) -> Result<Word, DecodeError> {
        let topic = self
            .topics
            .get(index)
            .ok_or(DecodeError::MissingField("topics"))?;
        to_word("topics", &hex_bytes("topics", topic)?)
    }

    fn data_words(&self, expected: usize) -> Result<Vec<Word>, DecodeError> {
        let bytes = hex_bytes("data", &self.data)?;
        if bytes.len() < expected * 32 {
            return Err(DecodeError::Malformed(format!(
                "data holds {} bytes, expected {} words",
                bytes.len(),
                expected
            )));
        }
        bytes
            .chunks_exact(32)
            .take(expected)
            .map(|chunk| to_word("data", chunk))
            .collect()
    }

    fn block_number(&self) -> Result<u64, DecodeError> {
        let number = self
            .block_number
            .as_deref()
            .ok_or(DecodeError::MissingField("blockNumber"))?;
        parse_quantity("blockNumber", number)
    }

    fn tx_hash(&self) -> Result<String, DecodeError> {
        self.transaction_hash
            .clone()
            .ok_or(DecodeError::MissingField("transactionHash"))
    }
}

fn hex_bytes(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(value.trim_start_matches("0x")).map_err(|_| DecodeError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

fn to_word(field: &'static str, bytes: &[u8]) -> Result<Word, DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::InvalidHex {
        field,
        value: hex::encode(bytes),
    })
}

fn word_u64(field: &'static str, word: &Word) -> Result<u64, DecodeError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(DecodeError::Overflow(field));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(low))
}

fn word_address(word: &Word) -> String {
    format!("0x{}", hex::encode(&word[12..]))
}

fn word_amount(word: &Word) -> f64 {
    wei_to_float(&BigUint::from_bytes_be(word))
}

/// Parses a `0x`-prefixed hex quantity into a u64.
pub fn parse_quantity(field: &'static str, value: &str) -> Result<u64, DecodeError> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() || digits.len() > 16 {
        return Err(DecodeError::InvalidHex {
            field,
            value: value.to_string(),
        });
    }
    u64::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

/// Parses a `0x`-prefixed hex quantity of arbitrary size.
pub fn parse_big_quantity(field: &'static str, value: &str) -> Result<BigUint, DecodeError> {
    let digits = value.trim_start_matches("0x");
    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| DecodeError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

pub fn decode_created_validator(raw: &Value) -> Result<Validator, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::CreatedValidator)?;
    let words = log.data_words(2)?;

    Ok(Validator {
        id: word_u64("validatorID", &log.topic(1)?)?,
        address: word_address(&log.topic(2)?),
        created_epoch: word_u64("createdEpoch", &words[0])?,
        created_time: word_u64("createdTime", &words[1])?,
        ..Default::default()
    })
}

pub fn decode_delegate(raw: &Value) -> Result<DelegateInfo, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::Delegate)?;
    let words = log.data_words(1)?;

    Ok(DelegateInfo {
        delegator: word_address(&log.topic(1)?),
        to_validator_id: word_u64("toValidatorID", &log.topic(2)?)?,
        amount: word_amount(&words[0]),
        block_number: log.block_number()?,
        tx_hash: log.tx_hash()?,
    })
}

pub fn decode_undelegate(raw: &Value) -> Result<UndelegateInfo, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::Undelegate)?;
    let words = log.data_words(1)?;

    Ok(UndelegateInfo {
        delegator: word_address(&log.topic(1)?),
        to_validator_id: word_u64("toValidatorID", &log.topic(2)?)?,
        wr_id: word_u64("wrID", &log.topic(3)?)?,
        amount: word_amount(&words[0]),
        block_number: log.block_number()?,
        tx_hash: log.tx_hash()?,
    })
}

pub fn decode_locked_stake(raw: &Value) -> Result<LockedStake, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::LockedStake)?;
    let words = log.data_words(2)?;

    Ok(LockedStake {
        delegator: word_address(&log.topic(1)?),
        validator_id: word_u64("validatorID", &log.topic(2)?)?,
        duration: word_u64("duration", &words[0])?,
        amount: word_amount(&words[1]),
        block_number: log.block_number()?,
        tx_hash: log.tx_hash()?,
    })
}

pub fn decode_unlocked_stake(raw: &Value) -> Result<UnlockedStake, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::UnlockedStake)?;
    let words = log.data_words(2)?;

    Ok(UnlockedStake {
        delegator: word_address(&log.topic(1)?),
        validator_id: word_u64("validatorID", &log.topic(2)?)?,
        amount: word_amount(&words[0]),
        penalty: word_amount(&words[1]),
        block_number: log.block_number()?,
        tx_hash: log.tx_hash()?,
    })
}

pub fn decode_reward_claim(raw: &Value) -> Result<RewardClaimInfo, DecodeError> {
    let log = RawLog::parse(raw)?;
    log.expect(EventCategory::RewardClaim)?;
    let words = log.data_words(3)?;

    Ok(RewardClaimInfo {
        delegator: word_address(&log.topic(1)?),
        to_validator_id: word_u64("toValidatorID", &log.topic(2)?)?,
        lockup_extra_reward: word_amount(&words[0]),
        lockup_base_reward: word_amount(&words[1]),
        unlocked_reward: word_amount(&words[2]),
        block_number: log.block_number()?,
        tx_hash: log.tx_hash()?,
    })
}

/// Block number announced by a `newHeads` notification.
pub fn decode_new_head(raw: &Value) -> Result<u64, DecodeError> {
    let number = raw
        .get("number")
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingField("number"))?;
    parse_quantity("number", number)
}

/// Plain-value transfers of an `eth_getBlockByNumber(.., true)` result.
///
/// Transactions carrying call data or without a recipient are not transfers.
/// A malformed transaction is dropped; the rest of the block is kept.
pub fn decode_block_transfers(block_number: u64, block: &Value) -> Result<Vec<TransferLog>, DecodeError> {
    let transactions = block
        .get("transactions")
        .and_then(|v| v.as_array())
        .ok_or(DecodeError::MissingField("transactions"))?;

    let mut transfers = Vec::new();
    for tx in transactions {
        match decode_transfer(block_number, tx) {
            Ok(Some(transfer)) => transfers.push(transfer),
            Ok(None) => {}
            Err(e) => debug!(block_number, error = %e, "dropping malformed transaction"),
        }
    }
    Ok(transfers)
}

fn decode_transfer(block_number: u64, tx: &Value) -> Result<Option<TransferLog>, DecodeError> {
    let input = tx.get("input").and_then(|v| v.as_str()).unwrap_or("0x");
    if input != "0x" && !input.is_empty() {
        return Ok(None);
    }
    let to = match tx.get("to").and_then(|v| v.as_str()) {
        Some(to) => to.to_string(),
        None => return Ok(None),
    };
    let field = |name: &'static str| {
        tx.get(name)
            .and_then(|v| v.as_str())
            .ok_or(DecodeError::MissingField(name))
    };
    let value = parse_big_quantity("value", field("value")?)?;

    Ok(Some(TransferLog {
        block_number,
        tx_hash: field("hash")?.to_string(),
        from: field("from")?.to_string(),
        to,
        amount: wei_to_float(&value),
    }))
}
