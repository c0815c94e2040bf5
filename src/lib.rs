//! Solarfeed - real-time telemetry aggregation for a solar plant dashboard
//!
//! This crate maintains bounded, time-ordered rolling windows of sensor
//! readings (environment, inverter, server health), each fed from two
//! sources: a push-based live channel and a one-shot historical backfill.
//! A polled weather forecast and a small JSON HTTP surface round out what
//! the dashboard front-end consumes.
//!
//! # Features
//!
//! - Declarative per-domain field schemas with nested extraction paths
//! - Bounded sample buffers (append-evict for live data, wholesale replace
//!   for backfill batches)
//! - WebSocket live channel with reconnection
//! - Teardown-safe lifecycle; late backfill results are discarded
//! - Axum-served JSON views for cards and charts
//!
//! # Example
//!
//! ```rust,no_run
//! use solarfeed::{
//!     aggregator::FeedAggregator,
//!     client::{BackfillClient, WebSocketChannel},
//!     config::FeedConfig,
//!     schema::{Domain, DomainSchema},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::from_env()?;
//!     let channel = Arc::new(WebSocketChannel::new(config.live.clone()));
//!     channel.connect().await?;
//!
//!     let backfill = Arc::new(BackfillClient::new(&config.server)?);
//!     let feed = FeedAggregator::new(
//!         DomainSchema::builtin(Domain::Environment).clone(),
//!         channel,
//!         backfill,
//!         config.buffer.capacity,
//!     );
//!     feed.initialize().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod forecast;
pub mod http;
pub mod logging;
pub mod sample;
pub mod schema;

pub mod mock;

// Re-export main types
pub use crate::{
    aggregator::{FeedAggregator, FeedSnapshot, FeedState},
    config::FeedConfig,
    error::{FeedError, Result},
    sample::{Sample, SampleBuffer},
    schema::{Domain, DomainSchema},
};
