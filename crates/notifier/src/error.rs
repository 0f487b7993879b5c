use stakewatch_storage::StorageError;
use stakewatch_types::ChatId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("chat {0} is already registered")]
    AlreadyRegistered(ChatId),
    #[error("chat {0} not found")]
    NotFound(ChatId),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram rejected message ({code}): {description}")]
    Telegram { code: i64, description: String },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
