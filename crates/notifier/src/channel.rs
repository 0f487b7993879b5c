use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stakewatch_types::ChatId;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::NotifyError;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// A destination chat that accepts formatted messages.
#[async_trait]
pub trait SocialChannel: Send + Sync {
    fn chat_id(&self) -> ChatId;

    /// What has to be stored to rebuild this channel after a restart.
    fn credential(&self) -> ChannelCredential;

    async fn send_message(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCredential {
    Telegram { token: String, chat_id: ChatId },
}

impl ChannelCredential {
    pub fn chat_id(&self) -> ChatId {
        match self {
            ChannelCredential::Telegram { chat_id, .. } => *chat_id,
        }
    }

    pub fn into_channel(self, telegram_api_url: &str) -> Result<Arc<dyn SocialChannel>, NotifyError> {
        match self {
            ChannelCredential::Telegram { token, chat_id } => {
                Ok(Arc::new(TelegramChannel::new(telegram_api_url, token, chat_id)?))
            }
        }
    }
}

/// Telegram Bot API chat.
pub struct TelegramChannel {
    client: reqwest::Client,
    api_url: String,
    token: String,
    chat_id: ChatId,
}

impl TelegramChannel {
    pub fn new(api_url: &str, token: impl Into<String>, chat_id: ChatId) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }
}

#[async_trait]
impl SocialChannel for TelegramChannel {
    fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    fn credential(&self) -> ChannelCredential {
        ChannelCredential::Telegram {
            token: self.token.clone(),
            chat_id: self.chat_id,
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true
        });
        let response: Value = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        check_response(&response).map_err(|e| {
            warn!(chat_id = self.chat_id, error = %e, "telegram bot send message error");
            e
        })
    }
}

fn check_response(response: &Value) -> Result<(), NotifyError> {
    if response.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(());
    }
    Err(NotifyError::Telegram {
        code: response.get("error_code").and_then(|v| v.as_i64()).unwrap_or(-1),
        description: response
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string(),
    })
}
