//! Mock implementations for testing
//!
//! In-process stand-in for the live channel so aggregator behavior can be
//! driven without a WebSocket server.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::client::LiveChannel;
use crate::error::Result;

/// Mock live channel with call accounting
#[derive(Default)]
pub struct MockLiveChannel {
    subscribers: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl MockLiveChannel {
    /// Create a new mock channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a payload to the event's subscriber; returns whether a
    /// subscriber received it
    pub async fn emit(&self, event: &str, payload: &str) -> bool {
        let subscribers = self.subscribers.read().await;
        match subscribers.get(event) {
            Some(sender) => sender.send(payload.to_string()).is_ok(),
            None => false,
        }
    }

    /// Number of subscribe calls seen
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls seen
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    /// Whether an event currently has a subscriber
    pub async fn has_subscriber(&self, event: &str) -> bool {
        self.subscribers.read().await.contains_key(event)
    }
}

#[async_trait]
impl LiveChannel for MockLiveChannel {
    async fn subscribe(&self, event: &str) -> Result<mpsc::UnboundedReceiver<String>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.insert(event.to_string(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, event: &str) -> Result<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().await.remove(event);
        Ok(())
    }
}
