use async_trait::async_trait;
use serde_json::Value;
use stakewatch_types::{BlockNumber, EventCategory, TransferLog, Validator};
use std::sync::Arc;
use tracing::{debug, info};

use super::Fetcher;
use crate::decoder::{decode_block_transfers, decode_created_validator};
use crate::error::WatchError;
use crate::sfc_client::SfcSource;
use crate::source::ChainSource;

/// Fetcher that reads straight from the node: contract logs for validators,
/// full blocks for transfers.
pub struct NodeFetcher {
    source: Arc<SfcSource>,
    deploy_block: BlockNumber,
}

impl NodeFetcher {
    pub fn new(source: Arc<SfcSource>, deploy_block: BlockNumber) -> Self {
        Self { source, deploy_block }
    }
}

/// Decodes `CreatedValidator` logs, dropping malformed ones, sorted by id.
fn validators_from_logs(logs: &[Value]) -> Vec<Validator> {
    let mut validators: Vec<Validator> = logs
        .iter()
        .filter_map(|log| match decode_created_validator(log) {
            Ok(validator) => Some(validator),
            Err(e) => {
                debug!(error = %e, "dropping malformed validator log");
                None
            }
        })
        .collect();
    validators.sort_by_key(|v| v.id);
    validators
}

#[async_trait]
impl Fetcher for NodeFetcher {
    fn name(&self) -> &'static str {
        "node"
    }

    async fn list_validators(&self) -> Result<Vec<Validator>, WatchError> {
        let logs = self
            .source
            .poll(EventCategory::CreatedValidator, self.deploy_block, None)
            .await?;
        let validators = validators_from_logs(&logs);
        info!(logs = logs.len(), validators = validators.len(), "validators read from node");
        Ok(validators)
    }

    async fn transfers_in_block(&self, block_number: BlockNumber) -> Result<Vec<TransferLog>, WatchError> {
        let block = self.source.rpc().get_block_with_transactions(block_number).await?;
        Ok(decode_block_transfers(block_number, &block)?)
    }
}
