use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use stakewatch_types::{wei_to_float, BlockNumber, TransferLog, Validator};
use std::time::Duration;
use tracing::{debug, warn};

use super::Fetcher;
use crate::decoder::{parse_big_quantity, parse_quantity};
use crate::error::{DecodeError, WatchError};

const GRAPHQL_TIMEOUT: Duration = Duration::from_secs(5);

const VALIDATORS_QUERY: &str = r#"
    query {
        stakers {
            id
            stakerAddress
            isActive
            isOffline
            createdTime
            createdEpoch
            deactivatedTime
            deactivatedEpoch
        }
    }
"#;

const BLOCK_TRANSACTIONS_QUERY: &str = r#"
    query ($blockNumber: Long!) {
        block(number: $blockNumber) {
            hash
            transactionCount
            txList {
                hash
                from
                to
                value
                inputData
            }
        }
    }
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Staker {
    id: String,
    staker_address: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    is_offline: bool,
    created_time: String,
    created_epoch: String,
    deactivated_time: String,
    deactivated_epoch: String,
}

impl Staker {
    fn into_validator(self) -> Result<Validator, DecodeError> {
        Ok(Validator {
            id: parse_quantity("id", &self.id)?,
            address: self.staker_address,
            created_time: parse_quantity("createdTime", &self.created_time)?,
            created_epoch: parse_quantity("createdEpoch", &self.created_epoch)?,
            deactivated_time: parse_quantity("deactivatedTime", &self.deactivated_time)?,
            deactivated_epoch: parse_quantity("deactivatedEpoch", &self.deactivated_epoch)?,
            is_active: self.is_active,
            is_offline: self.is_offline,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StakersData {
    stakers: Vec<Staker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockTx {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
    input_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    transaction_count: u64,
    #[serde(default)]
    tx_list: Vec<BlockTx>,
}

#[derive(Debug, Deserialize)]
struct BlockData {
    block: Option<Block>,
}

/// Fetcher backed by the chain's GraphQL API.
pub struct GraphqlFetcher {
    client: reqwest::Client,
    url: String,
}

impl GraphqlFetcher {
    pub fn new(url: impl Into<String>) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder().timeout(GRAPHQL_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, WatchError> {
        let response: Value = self
            .client
            .post(&self.url)
            .json(&json!({"query": query, "variables": variables}))
            .send()
            .await?
            .json()
            .await?;

        take_data(response)
    }
}

fn take_data<T: DeserializeOwned>(mut response: Value) -> Result<T, WatchError> {
    if let Some(errors) = response.get("errors").and_then(|v| v.as_array()) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WatchError::GraphQl(message));
        }
    }
    let data = response
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| WatchError::InvalidResponse("missing data".to_string()))?;
    Ok(serde_json::from_value(data)?)
}

/// Converts stakers, dropping the ones with unparseable quantities.
fn validators_from_stakers(data: StakersData) -> Vec<Validator> {
    let mut validators: Vec<Validator> = data
        .stakers
        .into_iter()
        .filter_map(|staker| match staker.into_validator() {
            Ok(validator) => Some(validator),
            Err(e) => {
                debug!(error = %e, "dropping unparseable staker");
                None
            }
        })
        .collect();
    validators.sort_by_key(|v| v.id);
    validators
}

fn transfers_from_block(block_number: BlockNumber, data: BlockData) -> Result<Vec<TransferLog>, WatchError> {
    let block = data
        .block
        .ok_or_else(|| WatchError::InvalidResponse(format!("block {} not found", block_number)))?;
    if block.transaction_count == 0 {
        return Ok(Vec::new());
    }

    let mut transfers = Vec::new();
    for tx in block.tx_list {
        if tx.input_data != "0x" {
            continue;
        }
        let to = match tx.to {
            Some(to) => to,
            None => continue,
        };
        match parse_big_quantity("value", &tx.value) {
            Ok(value) => transfers.push(TransferLog {
                block_number,
                tx_hash: tx.hash,
                from: tx.from,
                to,
                amount: wei_to_float(&value),
            }),
            Err(e) => debug!(block_number, error = %e, "dropping unparseable transaction"),
        }
    }
    Ok(transfers)
}

#[async_trait]
impl Fetcher for GraphqlFetcher {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn list_validators(&self) -> Result<Vec<Validator>, WatchError> {
        let data: StakersData = self.query(VALIDATORS_QUERY, json!({})).await.map_err(|e| {
            warn!(error = %e, "graphql get list validators error");
            e
        })?;
        Ok(validators_from_stakers(data))
    }

    async fn transfers_in_block(&self, block_number: BlockNumber) -> Result<Vec<TransferLog>, WatchError> {
        let variables = json!({"blockNumber": format!("0x{:x}", block_number)});
        let data: BlockData = self
            .query(BLOCK_TRANSACTIONS_QUERY, variables)
            .await
            .map_err(|e| {
                warn!(block_number, error = %e, "graphql get list transactions error");
                e
            })?;
        transfers_from_block(block_number, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staker(id: &str) -> Value {
        json!({
            "id": id,
            "stakerAddress": format!("0x{:0>40}", id.trim_start_matches("0x")),
            "isActive": true,
            "isOffline": false,
            "createdTime": "0x5f5e1000",
            "createdEpoch": "0x10",
            "deactivatedTime": "0x0",
            "deactivatedEpoch": "0x0"
        })
    }

    #[test]
    fn test_validators_sorted_and_malformed_dropped() {
        let response = json!({"data": {"stakers": [staker("0x3"), staker("0x1"), staker("zz"), staker("0x2")]}});
        let data: StakersData = take_data(response).unwrap();
        let validators = validators_from_stakers(data);

        let ids: Vec<u64> = validators.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(validators[0].is_active);
        assert_eq!(validators[0].created_epoch, 16);
    }

    #[test]
    fn test_graphql_errors_surface() {
        let response = json!({"data": null, "errors": [{"message": "timeout"}]});
        let result: Result<StakersData, _> = take_data(response);
        assert!(matches!(result, Err(WatchError::GraphQl(m)) if m == "timeout"));
    }

    #[test]
    fn test_transfers_keep_plain_value_transactions() {
        let response = json!({"data": {"block": {
            "hash": "0xb",
            "transactionCount": 3,
            "txList": [
                {"hash": "0x1", "from": "0xa", "to": "0xb", "value": "0x3635c9adc5dea00000", "inputData": "0x"},
                {"hash": "0x2", "from": "0xa", "to": "0xc", "value": "0x1", "inputData": "0x095ea7b3"},
                {"hash": "0x3", "from": "0xa", "to": "0xd", "value": "bogus", "inputData": "0x"}
            ]
        }}});
        let data: BlockData = take_data(response).unwrap();
        let transfers = transfers_from_block(4_277_395, data).unwrap();

        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 1_000.0);
        assert_eq!(transfers[0].block_number, 4_277_395);
    }

    #[test]
    fn test_empty_block() {
        let response = json!({"data": {"block": {"hash": "0xb", "transactionCount": 0, "txList": []}}});
        let data: BlockData = take_data(response).unwrap();
        assert!(transfers_from_block(1, data).unwrap().is_empty());
    }
}
