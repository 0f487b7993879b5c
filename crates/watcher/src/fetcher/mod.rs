mod graphql;
mod node;

pub use graphql::GraphqlFetcher;
pub use node::NodeFetcher;

use async_trait::async_trait;
use stakewatch_types::{BlockNumber, TransferLog, Validator};

use crate::error::WatchError;

/// Alternate data source for bulk lookups the push subscriptions cannot answer.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every registered validator, sorted by id ascending.
    async fn list_validators(&self) -> Result<Vec<Validator>, WatchError>;

    /// Plain-value transfers included in one block.
    async fn transfers_in_block(&self, block_number: BlockNumber) -> Result<Vec<TransferLog>, WatchError>;
}
