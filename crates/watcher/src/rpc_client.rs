use crate::config::ChainConfig;
use crate::error::WatchError;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// HTTP JSON-RPC client with linear retry.
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl RpcClient {
    pub fn new(config: &ChainConfig) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: config.rpc_url.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, WatchError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay * attempt;
                warn!(
                    method,
                    attempt,
                    max_retries = self.max_retries,
                    error = %last_error.as_ref().map(|e: &WatchError| e.to_string()).unwrap_or_default(),
                    "rpc call failed, retrying in {}s",
                    delay.as_secs()
                );
                sleep(delay).await;
            }

            match self.try_call(&payload).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(method, attempt, "rpc call succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt == self.max_retries {
                        error!(method, "rpc call failed after {} retries", self.max_retries);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WatchError::InvalidResponse("rpc call failed".to_string())))
    }

    async fn try_call(&self, payload: &Value) -> Result<Value, WatchError> {
        let response: Value = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .json()
            .await?;

        take_result(response)
    }

    pub async fn get_block_number(&self) -> Result<u64, WatchError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| WatchError::InvalidResponse("block number is not a string".to_string()))?;

        Ok(crate::decoder::parse_quantity("result", hex_str)?)
    }

    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: &str,
        topic0: &str,
    ) -> Result<Vec<Value>, WatchError> {
        let params = serde_json::json!([{
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "address": address,
            "topics": [topic0]
        }]);

        let result = self.call("eth_getLogs", params).await?;
        match result {
            Value::Array(logs) => Ok(logs),
            other => Err(WatchError::InvalidResponse(format!("expected log array, got {}", other))),
        }
    }

    /// Block with full transaction objects.
    pub async fn get_block_with_transactions(&self, block_number: u64) -> Result<Value, WatchError> {
        let params = serde_json::json!([format!("0x{:x}", block_number), true]);
        let result = self.call("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(WatchError::InvalidResponse(format!("block {} not found", block_number)));
        }
        Ok(result)
    }
}

/// Unwraps a JSON-RPC envelope into its `result`, mapping node errors.
pub(crate) fn take_result(mut response: Value) -> Result<Value, WatchError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown RPC error")
            .to_string();
        let code = error.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);

        // Handle rate limiting
        if code == -32005 || code == 429 {
            return Err(WatchError::RateLimited(message));
        }

        return Err(WatchError::Rpc { code, message });
    }

    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| WatchError::InvalidResponse("missing result".to_string()))
}
