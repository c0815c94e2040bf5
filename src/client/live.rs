//! WebSocket live channel
//!
//! Maintains one connection to the live feed and dispatches incoming frames
//! to per-event subscribers. Frames carry an event name and a payload; the
//! payload is handed to subscribers as the raw string the pages used to
//! JSON-parse themselves. Reconnects with exponential backoff when the
//! connection drops.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::client::LiveChannel;
use crate::config::LiveConfig;
use crate::error::{FeedError, Result};

type SubscriberMap = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>;

/// One frame from the live feed
#[derive(Debug, Deserialize)]
struct LiveFrame {
    /// Event name (e.g. "mqtt message2")
    event: String,

    /// Raw payload; a string or an already-structured object
    data: Value,
}

/// WebSocket-backed live channel
pub struct WebSocketChannel {
    config: LiveConfig,
    subscribers: SubscriberMap,
    connected: Arc<RwLock<bool>>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebSocketChannel {
    /// Create a new channel; no connection is made until [`Self::connect`]
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(RwLock::new(false)),
            reader_task: Mutex::new(None),
        }
    }

    /// Start the reader task. Subsequent calls while it is running are
    /// rejected; one connection exists per channel instance.
    pub async fn connect(&self) -> Result<()> {
        let mut task = self.reader_task.lock().await;
        if task.is_some() {
            return Err(FeedError::connection("live channel already connected"));
        }

        let url = self.config.url.clone();
        let reconnect = self.config.reconnect.clone();
        let subscribers = self.subscribers.clone();
        let connected = self.connected.clone();

        *task = Some(tokio::spawn(async move {
            let mut delay = reconnect.initial_delay;
            loop {
                match connect_async(url.as_str()).await {
                    Ok((mut stream, _)) => {
                        info!("live channel connected to {url}");
                        *connected.write().await = true;
                        delay = reconnect.initial_delay;

                        while let Some(frame) = stream.next().await {
                            match frame {
                                Ok(Message::Text(text)) => {
                                    dispatch(&subscribers, &text).await;
                                }
                                Ok(Message::Close(_)) => break,
                                Ok(_) => {}
                                Err(e) => {
                                    warn!("live channel read error: {e}");
                                    break;
                                }
                            }
                        }

                        *connected.write().await = false;
                        warn!("live channel disconnected");
                    }
                    Err(e) => warn!("live channel connect failed: {e}"),
                }

                if !reconnect.enabled {
                    break;
                }
                sleep(delay).await;
                delay = (delay * 2).min(reconnect.max_delay);
            }
        }));

        Ok(())
    }

    /// Whether the underlying connection is currently up
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Stop the reader task and drop the connection
    pub async fn close(&self) {
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        *self.connected.write().await = false;
    }
}

/// Route one frame to its event's subscriber, if any
async fn dispatch(subscribers: &SubscriberMap, text: &str) {
    let frame: LiveFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("ignoring unrecognized live frame: {e}");
            return;
        }
    };

    let payload = match frame.data {
        Value::String(s) => s,
        other => other.to_string(),
    };

    let stale = {
        let subscribers = subscribers.read().await;
        match subscribers.get(&frame.event) {
            Some(sender) => sender.send(payload).is_err(),
            None => false,
        }
    };

    // Receiver has been dropped without an unsubscribe; clean up the entry
    if stale {
        subscribers.write().await.remove(&frame.event);
    }
}

#[async_trait]
impl LiveChannel for WebSocketChannel {
    async fn subscribe(&self, event: &str) -> Result<mpsc::UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.write().await;
        if subscribers.insert(event.to_string(), tx).is_some() {
            debug!("replaced existing subscription for {event:?}");
        }
        Ok(rx)
    }

    async fn unsubscribe(&self, event: &str) -> Result<()> {
        self.subscribers.write().await.remove(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;

    fn test_channel() -> WebSocketChannel {
        WebSocketChannel::new(LiveConfig {
            url: "ws://127.0.0.1:1/live".parse().unwrap(),
            reconnect: ReconnectConfig::default(),
        })
    }

    #[tokio::test]
    async fn dispatch_routes_to_subscriber() {
        let channel = test_channel();
        let mut rx = channel.subscribe("mqtt message2").await.unwrap();

        let frame = r#"{"event": "mqtt message2", "data": "{\"temperature\": 20}"}"#;
        dispatch(&channel.subscribers, frame).await;

        assert_eq!(rx.recv().await.unwrap(), r#"{"temperature": 20}"#);
    }

    #[tokio::test]
    async fn dispatch_serializes_structured_payloads() {
        let channel = test_channel();
        let mut rx = channel.subscribe("mqtt message2").await.unwrap();

        let frame = r#"{"event": "mqtt message2", "data": {"temperature": 20}}"#;
        dispatch(&channel.subscribers, frame).await;

        let payload = rx.recv().await.unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["temperature"], 20);
    }

    #[tokio::test]
    async fn resubscribe_replaces_prior_receiver() {
        let channel = test_channel();
        let mut first = channel.subscribe("mqtt message2").await.unwrap();
        let mut second = channel.subscribe("mqtt message2").await.unwrap();

        let frame = r#"{"event": "mqtt message2", "data": "x"}"#;
        dispatch(&channel.subscribers, frame).await;

        assert!(second.recv().await.is_some());
        // First receiver's sender was replaced; channel reports closed
        assert!(first.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let channel = test_channel();
        let mut rx = channel.subscribe("mqtt message2").await.unwrap();
        channel.unsubscribe("mqtt message2").await.unwrap();

        let frame = r#"{"event": "mqtt message2", "data": "x"}"#;
        dispatch(&channel.subscribers, frame).await;

        // Sender dropped on unsubscribe, channel closed without delivery
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let channel = test_channel();
        let mut rx = channel.subscribe("mqtt message2").await.unwrap();

        dispatch(&channel.subscribers, r#"{"event": "other", "data": "x"}"#).await;
        dispatch(&channel.subscribers, "not json").await;

        channel.unsubscribe("mqtt message2").await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
