use async_trait::async_trait;
use serde_json::{json, Value};
use stakewatch_types::{BlockNumber, EventCategory};
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::error::WatchError;
use crate::rpc_client::RpcClient;
use crate::source::{block_windows, sort_by_block_number, ChainSource, Subscription};
use crate::topics::topic0;
use crate::ws_client::{WsClient, WsTimeouts};

/// Staking-contract (SFC) event source: HTTP JSON-RPC for polling, WebSocket for push.
pub struct SfcSource {
    rpc: RpcClient,
    ws: WsClient,
    contract_address: String,
    block_range: u64,
}

impl SfcSource {
    pub fn new(config: &ChainConfig) -> Result<Self, WatchError> {
        Ok(Self {
            rpc: RpcClient::new(config)?,
            ws: WsClient::new(config.ws_url.clone(), WsTimeouts::from_config(config)),
            contract_address: config.sfc_contract_address.clone(),
            block_range: config.poll_block_range,
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn subscribe_params(&self, category: EventCategory) -> Value {
        match topic0(category) {
            Some(topic) => json!(["logs", {"address": self.contract_address, "topics": [topic]}]),
            None => json!(["newHeads"]),
        }
    }
}

#[async_trait]
impl ChainSource for SfcSource {
    async fn subscribe(&self, category: EventCategory) -> Result<Subscription, WatchError> {
        debug!(category = %category, "opening subscription");
        self.ws.subscribe(self.subscribe_params(category)).await
    }

    async fn poll(
        &self,
        category: EventCategory,
        from_block: BlockNumber,
        to_block: Option<BlockNumber>,
    ) -> Result<Vec<Value>, WatchError> {
        let topic = topic0(category).ok_or_else(|| WatchError::Unsupported(format!("polling {}", category)))?;
        let to_block = match to_block {
            Some(block) => block,
            None => self.rpc.get_block_number().await?,
        };

        let mut logs = Vec::new();
        for (start, end) in block_windows(from_block, to_block, self.block_range) {
            let mut window = self
                .rpc
                .get_logs(start, end, &self.contract_address, &topic)
                .await?;
            debug!(category = %category, start, end, count = window.len(), "polled logs");
            logs.append(&mut window);
        }

        sort_by_block_number(&mut logs);
        info!(category = %category, from_block, to_block, count = logs.len(), "poll finished");
        Ok(logs)
    }

    async fn latest_block_number(&self) -> Result<BlockNumber, WatchError> {
        self.rpc.get_block_number().await
    }
}
