use serde::{Deserialize, Serialize};
use stakewatch_types::watch::{
    DEFAULT_POLL_BLOCK_RANGE, DEFAULT_RESUBSCRIBE_INTERVAL_SECONDS, DEFAULT_SHIFT_BLOCKS,
};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub ws_url: String,
    pub graphql_url: Option<String>,
    pub sfc_contract_address: String,
    pub sfc_deploy_block: u64,
    pub rpc_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub ws_connect_timeout_seconds: u64,
    pub ws_ping_interval_seconds: u64,
    pub ws_idle_timeout_seconds: u64,
    pub resubscribe_interval_seconds: u64,
    pub shift_blocks: u64,
    pub poll_block_range: u64,
}

/// A chain setting is present but does not parse.
#[derive(Debug, Error)]
#[error("invalid {key}: {reason}")]
pub struct InvalidSetting {
    pub key: &'static str,
    pub reason: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, InvalidSetting>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| InvalidSetting {
            key,
            reason: format!("{} ({})", e, raw),
        }),
        None => Ok(default),
    }
}

impl ChainConfig {
    /// Reads every key from the environment, falling back to defaults for absent keys.
    pub fn from_env() -> Result<Self, InvalidSetting> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InvalidSetting> {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        Ok(Self {
            rpc_url: text("RPC_URL", defaults.rpc_url),
            ws_url: text("WS_URL", defaults.ws_url),
            graphql_url: lookup("GRAPHQL_URL").filter(|v| !v.is_empty()),
            sfc_contract_address: text("SFC_CONTRACT_ADDRESS", defaults.sfc_contract_address),
            sfc_deploy_block: parse_or(&lookup, "SFC_DEPLOY_BLOCK", defaults.sfc_deploy_block)?,
            rpc_timeout_seconds: parse_or(&lookup, "RPC_TIMEOUT_SECONDS", defaults.rpc_timeout_seconds)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            retry_delay_seconds: parse_or(&lookup, "RETRY_DELAY_SECONDS", defaults.retry_delay_seconds)?,
            ws_connect_timeout_seconds: parse_or(
                &lookup,
                "WS_CONNECT_TIMEOUT_SECONDS",
                defaults.ws_connect_timeout_seconds,
            )?,
            ws_ping_interval_seconds: parse_or(
                &lookup,
                "WS_PING_INTERVAL_SECONDS",
                defaults.ws_ping_interval_seconds,
            )?,
            ws_idle_timeout_seconds: parse_or(
                &lookup,
                "WS_IDLE_TIMEOUT_SECONDS",
                defaults.ws_idle_timeout_seconds,
            )?,
            resubscribe_interval_seconds: parse_or(
                &lookup,
                "RESUBSCRIBE_INTERVAL_SECONDS",
                defaults.resubscribe_interval_seconds,
            )?,
            shift_blocks: parse_or(&lookup, "SHIFT_BLOCKS", defaults.shift_blocks)?,
            poll_block_range: parse_or(&lookup, "POLL_BLOCK_RANGE", defaults.poll_block_range)?,
        })
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            ws_url: String::new(),
            graphql_url: None,
            sfc_contract_address: String::new(),
            sfc_deploy_block: 0,
            rpc_timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 1,
            ws_connect_timeout_seconds: 10,
            ws_ping_interval_seconds: 30,
            ws_idle_timeout_seconds: 60,
            resubscribe_interval_seconds: DEFAULT_RESUBSCRIBE_INTERVAL_SECONDS,
            shift_blocks: DEFAULT_SHIFT_BLOCKS,
            poll_block_range: DEFAULT_POLL_BLOCK_RANGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_absent_keys_use_defaults() {
        let config = ChainConfig::from_lookup(lookup(&[("RPC_URL", "http://node:8545"), ("SHIFT_BLOCKS", "12")])).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.shift_blocks, 12);
        assert_eq!(config.poll_block_range, DEFAULT_POLL_BLOCK_RANGE);
        assert_eq!(config.ws_ping_interval_seconds, 30);
        assert!(config.graphql_url.is_none());
    }

    #[test]
    fn test_unparseable_number_is_rejected() {
        let err = ChainConfig::from_lookup(lookup(&[("SHIFT_BLOCKS", "abc")])).unwrap_err();
        assert_eq!(err.key, "SHIFT_BLOCKS");

        let err = ChainConfig::from_lookup(lookup(&[("WS_IDLE_TIMEOUT_SECONDS", "-1")])).unwrap_err();
        assert_eq!(err.key, "WS_IDLE_TIMEOUT_SECONDS");
    }
}
