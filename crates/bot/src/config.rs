use serde::{Deserialize, Serialize};
use stakewatch_notifier::{ChannelCredential, DEFAULT_TELEGRAM_API_URL};
use stakewatch_types::ChatId;
use stakewatch_watcher::{ChainConfig, InvalidSetting};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_EXPLORER_URL: &str = "https://ftmscan.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<InvalidSetting> for ConfigError {
    fn from(e: InvalidSetting) -> Self {
        ConfigError::Invalid {
            key: e.key,
            reason: e.reason,
        }
    }
}

/// Minimum normalized amounts; events at or below them are not announced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_staking_amount: f64,
    pub min_claim_amount: f64,
    pub min_transfer_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                reason: format!("unknown format {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    #[serde(flatten)]
    pub chain: ChainConfig,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub explorer_url: String,
    pub telegram_api_url: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<ChatId>,
    pub storage_path: PathBuf,
    pub http_port: Option<u16>,
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            thresholds: Thresholds::default(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            telegram_token: None,
            telegram_chat_id: None,
            storage_path: PathBuf::from("./data"),
            http_port: None,
            log_format: LogFormat::default(),
        }
    }
}

/// What the orchestrator needs from configuration once it is validated.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub thresholds: Thresholds,
    pub backoff: Duration,
    pub shift_blocks: u64,
    pub explorer_url: String,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key: name,
            reason: e.to_string(),
        }),
        None => Ok(None),
    }
}

fn required_amount(name: &'static str) -> Result<f64, ConfigError> {
    env_parse(name)?.ok_or(ConfigError::Missing(name))
}

impl BotConfig {
    /// Reads every setting from the environment. Call [`BotConfig::validate`] afterwards.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            chain: ChainConfig::from_env()?,
            thresholds: Thresholds {
                min_staking_amount: required_amount("MIN_STAKING_AMOUNT")?,
                min_claim_amount: required_amount("MIN_CLAIM_AMOUNT")?,
                min_transfer_amount: required_amount("MIN_TRANSFER_AMOUNT")?,
            },
            explorer_url: env_opt("EXPLORER_URL").unwrap_or(defaults.explorer_url),
            telegram_api_url: env_opt("TELEGRAM_API_URL").unwrap_or(defaults.telegram_api_url),
            telegram_token: env_opt("TELEGRAM_TOKEN"),
            telegram_chat_id: env_parse("TELEGRAM_CHAT_ID")?,
            storage_path: env_opt("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            http_port: env_parse("HTTP_PORT")?,
            log_format: env_parse("LOG_FORMAT")?.unwrap_or_default(),
        })
    }

    /// Reads a JSON file whose keys are the lowercase setting names.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("RPC_URL", &self.chain.rpc_url, &["http://", "https://"])?;
        check_url("WS_URL", &self.chain.ws_url, &["ws://", "wss://"])?;
        if let Some(url) = &self.chain.graphql_url {
            check_url("GRAPHQL_URL", url, &["http://", "https://"])?;
        }
        check_url("EXPLORER_URL", &self.explorer_url, &["http://", "https://"])?;
        check_address("SFC_CONTRACT_ADDRESS", &self.chain.sfc_contract_address)?;

        check_amount("MIN_STAKING_AMOUNT", self.thresholds.min_staking_amount)?;
        check_amount("MIN_CLAIM_AMOUNT", self.thresholds.min_claim_amount)?;
        check_amount("MIN_TRANSFER_AMOUNT", self.thresholds.min_transfer_amount)?;

        if self.chain.resubscribe_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "RESUBSCRIBE_INTERVAL_SECONDS",
                reason: "must be at least 1".to_string(),
            });
        }
        for (key, seconds) in [
            ("WS_CONNECT_TIMEOUT_SECONDS", self.chain.ws_connect_timeout_seconds),
            ("WS_PING_INTERVAL_SECONDS", self.chain.ws_ping_interval_seconds),
        ] {
            if seconds == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if self.chain.ws_idle_timeout_seconds <= self.chain.ws_ping_interval_seconds {
            return Err(ConfigError::Invalid {
                key: "WS_IDLE_TIMEOUT_SECONDS",
                reason: "must be longer than WS_PING_INTERVAL_SECONDS".to_string(),
            });
        }
        if self.chain.poll_block_range == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_BLOCK_RANGE",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Channel used when the store holds no channel list.
    pub fn fallback_channel(&self) -> Option<ChannelCredential> {
        match (&self.telegram_token, self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some(ChannelCredential::Telegram {
                token: token.clone(),
                chat_id,
            }),
            _ => None,
        }
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            thresholds: self.thresholds,
            backoff: Duration::from_secs(self.chain.resubscribe_interval_seconds),
            shift_blocks: self.chain.shift_blocks,
            explorer_url: self.explorer_url.clone(),
        }
    }
}

fn check_url(key: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing(key));
    }
    let host = schemes
        .iter()
        .find_map(|scheme| value.strip_prefix(scheme))
        .ok_or_else(|| ConfigError::Invalid {
            key,
            reason: format!("expected one of {:?}, got {}", schemes, value),
        })?;
    if host.is_empty() || host.starts_with('/') {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("no host in {}", value),
        });
    }
    Ok(())
}

fn check_address(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing(key));
    }
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{} is not a 20-byte hex address", value),
        });
    }
    Ok(())
}

fn check_amount(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be a positive amount, got {}", value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> BotConfig {
        let mut config = BotConfig::default();
        config.chain.rpc_url = "https://rpcapi.fantom.network".to_string();
        config.chain.ws_url = "wss://wsapi.fantom.network".to_string();
        config.chain.sfc_contract_address = "0xFC00FACE00000000000000000000000000000000".to_string();
        config.thresholds = Thresholds {
            min_staking_amount: 100.0,
            min_claim_amount: 50.0,
            min_transfer_amount: 10_000.0,
        };
        config
    }

    #[test]
    fn test_valid_config() {
        valid().validate().unwrap();
    }

    #[test]
    fn test_missing_endpoint() {
        let mut config = valid();
        config.chain.ws_url = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("WS_URL"))));

        let mut config = valid();
        config.chain.rpc_url = "ftp://node".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { key: "RPC_URL", .. })));
    }

    #[test]
    fn test_thresholds_must_be_positive() {
        let mut config = valid();
        config.thresholds.min_claim_amount = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "MIN_CLAIM_AMOUNT", .. })
        ));

        let mut config = valid();
        config.thresholds.min_transfer_amount = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contract_address_format() {
        let mut config = valid();
        config.chain.sfc_contract_address = "0x1234".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "SFC_CONTRACT_ADDRESS", .. })
        ));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "rpc_url": "http://localhost:18545",
                "ws_url": "ws://localhost:18546",
                "sfc_contract_address": "0xfc00face00000000000000000000000000000000",
                "min_staking_amount": 100.0,
                "min_claim_amount": 50.0,
                "min_transfer_amount": 10000.0,
                "log_format": "json",
                "telegram_token": "123:abc",
                "telegram_chat_id": -1001
            }}"#
        )
        .unwrap();

        let config = BotConfig::from_file(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.chain.shift_blocks, 5);
        assert_eq!(config.chain.poll_block_range, 50_000);
        assert_eq!(config.explorer_url, DEFAULT_EXPLORER_URL);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.watch_settings().backoff, Duration::from_secs(1));
        assert_eq!(
            config.fallback_channel(),
            Some(ChannelCredential::Telegram {
                token: "123:abc".to_string(),
                chat_id: -1001
            })
        );
    }

    #[test]
    fn test_invalid_chain_setting_maps_to_config_error() {
        let err = ChainConfig::from_lookup(|key: &str| (key == "SHIFT_BLOCKS").then(|| "abc".to_string()))
            .map_err(ConfigError::from)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SHIFT_BLOCKS", .. }));
    }

    #[test]
    fn test_idle_timeout_must_exceed_ping_interval() {
        let mut config = valid();
        config.chain.ws_idle_timeout_seconds = config.chain.ws_ping_interval_seconds;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "WS_IDLE_TIMEOUT_SECONDS", .. })
        ));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
