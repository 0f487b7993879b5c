//! `eth_subscribe` over a WebSocket JSON-RPC connection.
//!
//! One connection per subscription: the socket is owned by a spawned task that
//! forwards notifications until the socket dies, then fires the terminal error.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::error::WatchError;
use crate::rpc_client::take_result;
use crate::source::{Subscription, SubscriptionFeed};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Deadlines that turn a silent node into a subscription error.
#[derive(Debug, Clone, Copy)]
pub struct WsTimeouts {
    /// Connect, handshake and `eth_subscribe` confirmation together.
    pub connect: Duration,
    pub ping_interval: Duration,
    /// Longest stretch without any frame from the node.
    pub idle: Duration,
}

impl WsTimeouts {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.ws_connect_timeout_seconds),
            ping_interval: Duration::from_secs(config.ws_ping_interval_seconds),
            idle: Duration::from_secs(config.ws_idle_timeout_seconds),
        }
    }
}

pub struct WsClient {
    url: String,
    timeouts: WsTimeouts,
}

impl WsClient {
    pub fn new(url: impl Into<String>, timeouts: WsTimeouts) -> Self {
        Self {
            url: url.into(),
            timeouts,
        }
    }

    /// Opens a connection and issues `eth_subscribe(params)`.
    ///
    /// Returns once the node has confirmed the subscription id.
    pub async fn subscribe(&self, params: Value) -> Result<Subscription, WatchError> {
        let (write, read, subscription_id) = tokio::time::timeout(self.timeouts.connect, self.open(params))
            .await
            .map_err(|_| WatchError::Timeout("subscription confirmation".to_string()))??;
        info!(subscription_id = %subscription_id, "subscription established");

        let timeouts = self.timeouts;
        let (mut feed, subscription) = Subscription::channel();
        let task = tokio::spawn(async move {
            let error = pump(write, read, &subscription_id, &feed, timeouts).await;
            debug!(subscription_id = %subscription_id, error = %error, "subscription ended");
            feed.fail(error);
        });

        Ok(subscription.with_task(task))
    }

    async fn open(
        &self,
        params: Value,
    ) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>, String), WatchError> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = stream.split();

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": "eth_subscribe",
            "params": params
        });
        write.send(Message::Text(request.to_string())).await?;

        let subscription_id = await_confirmation(&mut read).await?;
        Ok((write, read, subscription_id))
    }
}

async fn await_confirmation(read: &mut SplitStream<WsStream>) -> Result<String, WatchError> {
    while let Some(message) = read.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(WatchError::Closed),
            _ => continue,
        };
        let response: Value = serde_json::from_str(&text)?;
        if response.get("id").and_then(|v| v.as_u64()) != Some(SUBSCRIBE_REQUEST_ID) {
            continue;
        }
        let result = take_result(response)?;
        return result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WatchError::InvalidResponse(format!("subscription id {}", result)));
    }
    Err(WatchError::Closed)
}

/// Forwards notifications until the connection fails; returns why it stopped.
///
/// Pings go out every `ping_interval`. Any frame from the node, pongs included,
/// pushes the idle deadline back.
async fn pump(
    mut write: SplitSink<WsStream, Message>,
    mut read: SplitStream<WsStream>,
    subscription_id: &str,
    feed: &SubscriptionFeed,
    timeouts: WsTimeouts,
) -> WatchError {
    let mut ping = interval_at(Instant::now() + timeouts.ping_interval, timeouts.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle = tokio::time::sleep(timeouts.idle);
    tokio::pin!(idle);

    loop {
        let message = tokio::select! {
            message = read.next() => message,
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    return e.into();
                }
                continue;
            }
            _ = &mut idle => {
                return WatchError::Timeout(format!("node activity within {}ms", timeouts.idle.as_millis()));
            }
        };
        idle.as_mut().reset(Instant::now() + timeouts.idle);

        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Ping(payload))) => {
                if let Err(e) = write.send(Message::Pong(payload)).await {
                    return e.into();
                }
                continue;
            }
            Some(Ok(Message::Close(_))) | None => return WatchError::Closed,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return e.into(),
        };

        let notification: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => return e.into(),
        };
        match subscription_payload(notification, subscription_id) {
            Ok(Some(payload)) => {
                if let Err(e) = feed.deliver(payload).await {
                    return e;
                }
            }
            Ok(None) => {}
            Err(e) => return e,
        }
    }
}

/// Extracts the payload of an `eth_subscription` notification addressed to us.
fn subscription_payload(mut notification: Value, subscription_id: &str) -> Result<Option<Value>, WatchError> {
    if notification.get("error").is_some() {
        return take_result(notification).map(|_| None);
    }
    if notification.get("method").and_then(|v| v.as_str()) != Some("eth_subscription") {
        return Ok(None);
    }
    let params = match notification.get_mut("params") {
        Some(params) => params,
        None => return Ok(None),
    };
    if params.get("subscription").and_then(|v| v.as_str()) != Some(subscription_id) {
        return Ok(None);
    }
    Ok(params.get_mut("result").map(Value::take))
}
