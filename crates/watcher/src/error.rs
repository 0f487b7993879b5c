use thiserror::Error;

/// Why a single raw event could not be turned into a domain event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid hex in `{field}`: {value}")]
    InvalidHex { field: &'static str, value: String },
    #[error("unexpected topic {0}")]
    UnexpectedTopic(String),
    #[error("value in `{0}` does not fit in 64 bits")]
    Overflow(&'static str),
    #[error("log was removed by a chain reorganization")]
    Removed,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("rpc error ({code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("graphql error: {0}")]
    GraphQl(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("subscription closed")]
    Closed,
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0} is not supported by this source")]
    Unsupported(String),
}
