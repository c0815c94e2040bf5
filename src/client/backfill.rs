//! Historical backfill client
//!
//! Fetches one batch of recent records per domain from the history server and
//! projects them into samples. Records with an unparsable timestamp or a
//! missing numeric field are dropped, never fatal to the batch.

use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::HistoryServerConfig;
use crate::error::{FeedError, Result};
use crate::sample::{parse_locale_timestamp, Sample};
use crate::schema::DomainSchema;

/// HTTP client for the history server's backfill endpoints
pub struct BackfillClient {
    client: Client,
    base_url: Url,
}

impl BackfillClient {
    /// Create a new backfill client
    pub fn new(config: &HistoryServerConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(format!("solarfeed/{}", env!("CARGO_PKG_VERSION")));

        if !config.verify_ssl {
            warn!("SSL verification disabled - this is insecure for production use");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| FeedError::connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetch the historical batch for a domain, sorted ascending by timestamp
    pub async fn fetch(&self, schema: &DomainSchema) -> Result<Vec<Sample>> {
        let url = self
            .base_url
            .join(&schema.endpoint)
            .map_err(|e| FeedError::config(format!("bad endpoint {}: {e}", schema.endpoint)))?;

        debug!("fetching backfill for {} from {url}", schema.domain);

        let records: Vec<Value> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(project_records(schema, &records))
    }
}

/// Project raw backfill records into samples, dropping malformed entries and
/// sorting ascending by parsed timestamp.
pub fn project_records(schema: &DomainSchema, records: &[Value]) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(records.len());

    for record in records {
        let raw_ts = match record.get("timestamp").and_then(Value::as_str) {
            Some(ts) => ts,
            None => {
                warn!("{}: backfill record without timestamp dropped", schema.domain);
                continue;
            }
        };
        let timestamp = match parse_locale_timestamp(raw_ts) {
            Ok(ts) => ts,
            Err(e) => {
                warn!("{}: backfill record dropped: {e}", schema.domain);
                continue;
            }
        };
        let fields = match schema.project(record) {
            Some(fields) => fields,
            None => {
                warn!(
                    "{}: backfill record at {raw_ts} missing numeric fields, dropped",
                    schema.domain
                );
                continue;
            }
        };
        samples.push(Sample::new(timestamp, fields));
    }

    samples.sort_by_key(|s| s.timestamp);
    samples
}
