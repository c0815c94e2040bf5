//! Shared helpers for integration tests

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use solarfeed::aggregator::FeedAggregator;
use solarfeed::client::BackfillClient;
use solarfeed::config::HistoryServerConfig;
use solarfeed::mock::MockLiveChannel;
use solarfeed::sample::Sample;
use solarfeed::schema::{Domain, DomainSchema};

/// Backfill client pointed at a port nothing listens on; fetches fail fast
pub fn unreachable_backfill() -> Arc<BackfillClient> {
    let config = HistoryServerConfig {
        base_url: "http://127.0.0.1:9/".parse().unwrap(),
        timeout: Duration::from_millis(200),
        verify_ssl: true,
    };
    Arc::new(BackfillClient::new(&config).unwrap())
}

/// Aggregator over the environment schema with a mock live channel
pub fn environment_feed(capacity: usize) -> (FeedAggregator, Arc<MockLiveChannel>) {
    let channel = Arc::new(MockLiveChannel::new());
    let feed = FeedAggregator::new(
        DomainSchema::builtin(Domain::Environment).clone(),
        channel.clone(),
        unreachable_backfill(),
        capacity,
    );
    (feed, channel)
}

/// An environment sample at a fixed instant
pub fn sample_at(secs: i64, temperature: f64) -> Sample {
    let mut fields = BTreeMap::new();
    fields.insert("temperature".to_string(), temperature);
    fields.insert("humidity".to_string(), 60.0);
    fields.insert("uv".to_string(), 1.0);
    Sample::new(instant(secs), fields)
}

/// Fixed instant `secs` seconds into 2024-03-01
pub fn instant(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

/// Valid environment live payload
pub fn env_payload(temperature: f64) -> String {
    format!(r#"{{"temperature": {temperature}, "humidity": 60, "uv": 1}}"#)
}
