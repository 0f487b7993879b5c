mod config;
pub mod decoder;
mod error;
mod fetcher;
mod rpc_client;
mod sfc_client;
mod source;
mod supervisor;
pub mod topics;
mod ws_client;

pub use config::{ChainConfig, InvalidSetting};
pub use error::{DecodeError, WatchError};
pub use fetcher::{Fetcher, GraphqlFetcher, NodeFetcher};
pub use rpc_client::RpcClient;
pub use sfc_client::SfcSource;
pub use source::{block_windows, sort_by_block_number, ChainSource, Subscription, SubscriptionFeed, SUBSCRIPTION_BUFFER};
pub use supervisor::{Pipeline, Supervisor};
pub use ws_client::{WsClient, WsTimeouts};
