//! Transports feeding the aggregator
//!
//! Two sources exist per domain: a push-based live channel delivering raw
//! payloads per event name, and a one-shot REST backfill against the history
//! server. Both are injected into the aggregator so lifecycle and teardown
//! stay explicit and testable.

pub mod backfill;
pub mod live;

pub use backfill::BackfillClient;
pub use live::WebSocketChannel;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Push-based live feed transport.
///
/// One subscription exists per event name; subscribing an event that already
/// has a subscriber replaces the prior one, so handlers never double-deliver.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    /// Subscribe to an event, receiving each raw payload as delivered
    async fn subscribe(&self, event: &str) -> Result<mpsc::UnboundedReceiver<String>>;

    /// Drop the subscription for an event. Unsubscribing an event with no
    /// active subscription is a no-op.
    async fn unsubscribe(&self, event: &str) -> Result<()>;
}
