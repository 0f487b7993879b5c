pub mod config;
pub mod logging;
mod orchestrator;
pub mod pipelines;

pub use config::{BotConfig, ConfigError, LogFormat, Thresholds, WatchSettings};
pub use orchestrator::Core;
