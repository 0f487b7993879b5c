use serde::{Deserialize, Serialize};
use stakewatch_types::ChatId;

#[derive(Debug, Deserialize)]
pub struct AddChatGroupRequest {
    pub token: String,
    pub chat_id: ChatId,
}

/// `chat_id` stays a string so a bad value maps to our own 400 body.
#[derive(Debug, Deserialize)]
pub struct RemoveChatGroupQuery {
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub channels: usize,
}
