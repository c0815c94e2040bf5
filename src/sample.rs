//! Samples and the bounded, time-ordered sample buffer
//!
//! A [`Sample`] is one point-in-time reading for a domain. The
//! [`SampleBuffer`] keeps the most recent readings as a rolling window: live
//! messages append one sample and evict the oldest, while a historical
//! backfill replaces the window wholesale.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};

use crate::error::{FeedError, Result};

/// Format the history server uses for record timestamps
const LOCALE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Parse a locale-formatted timestamp (`DD/MM/YYYY, HH:MM:SS`) into an
/// absolute instant. The feed carries no zone offset; values are read as UTC.
pub fn parse_locale_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LOCALE_TIMESTAMP_FORMAT)
        .map_err(|e| FeedError::parse(format!("bad timestamp {raw:?}: {e}")))?;
    Ok(naive.and_utc())
}

/// A point-in-time reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Absolute instant the reading refers to
    pub timestamp: DateTime<Utc>,

    /// Metric name to numeric value; the key set is fixed per domain
    pub fields: BTreeMap<String, f64>,
}

impl Sample {
    /// Create a sample from a field projection
    pub fn new(timestamp: DateTime<Utc>, fields: BTreeMap<String, f64>) -> Self {
        Self { timestamp, fields }
    }

    /// Flatten into the `{time, ...fields}` row shape the renderer consumes
    pub fn as_row(&self) -> Value {
        let mut row = Map::new();
        row.insert("time".to_string(), Value::String(self.timestamp.to_rfc3339()));
        for (name, value) in &self.fields {
            if let Some(number) = serde_json::Number::from_f64(*value) {
                row.insert(name.clone(), Value::Number(number));
            }
        }
        Value::Object(row)
    }
}

/// Bounded, time-ordered window of the most recent samples
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    entries: VecDeque<Sample>,
}

impl SampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Maximum number of samples retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of samples
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one sample, evicting the oldest entry once the window is full
    pub fn push(&mut self, sample: Sample) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sample);
    }

    /// Replace the window wholesale with a backfill batch.
    ///
    /// The batch is sorted ascending by timestamp and truncated to the newest
    /// `capacity` entries. Prior contents are discarded regardless of how
    /// recent they were.
    pub fn replace(&mut self, mut samples: Vec<Sample>) {
        samples.sort_by_key(|s| s.timestamp);
        if samples.len() > self.capacity {
            samples.drain(..samples.len() - self.capacity);
        }
        self.entries = samples.into();
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.entries.back()
    }

    /// Samples oldest-first
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.entries.iter()
    }

    /// Ordered `{time, ...fields}` rows for the renderer
    pub fn as_rows(&self) -> Vec<Value> {
        self.entries.iter().map(Sample::as_row).collect()
    }

    /// Clone out the window oldest-first
    pub fn to_vec(&self) -> Vec<Sample> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(secs: i64, value: f64) -> Sample {
        let mut fields = BTreeMap::new();
        fields.insert("temperature".to_string(), value);
        Sample::new(Utc.timestamp_opt(secs, 0).unwrap(), fields)
    }

    #[test]
    fn parses_locale_timestamp() {
        let ts = parse_locale_timestamp("01/03/2024, 10:05:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_timestamp() {
        assert!(parse_locale_timestamp("2024-03-01T10:05:00Z").is_err());
        assert!(parse_locale_timestamp("31/02/2024, 10:05:00").is_err());
        assert!(parse_locale_timestamp("").is_err());
    }

    #[test]
    fn push_keeps_window_bounded() {
        let mut buffer = SampleBuffer::new(10);
        for i in 0..25 {
            buffer.push(sample_at(i, i as f64));
        }
        assert_eq!(buffer.len(), 10);
        // Oldest surviving entry is the 16th pushed
        assert_eq!(buffer.iter().next().unwrap().fields["temperature"], 15.0);
        assert_eq!(buffer.latest().unwrap().fields["temperature"], 24.0);
    }

    #[test]
    fn replace_sorts_ascending() {
        let mut buffer = SampleBuffer::new(10);
        buffer.replace(vec![sample_at(30, 3.0), sample_at(10, 1.0), sample_at(20, 2.0)]);
        let times: Vec<i64> = buffer.iter().map(|s| s.timestamp.timestamp()).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn replace_discards_prior_contents() {
        let mut buffer = SampleBuffer::new(10);
        for i in 0..5 {
            buffer.push(sample_at(100 + i, 0.0));
        }
        buffer.replace(vec![sample_at(10, 1.0), sample_at(20, 2.0)]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.latest().unwrap().timestamp.timestamp(), 20);
    }

    #[test]
    fn replace_truncates_to_newest() {
        let mut buffer = SampleBuffer::new(3);
        buffer.replace((0..8).map(|i| sample_at(i, i as f64)).collect());
        let times: Vec<i64> = buffer.iter().map(|s| s.timestamp.timestamp()).collect();
        assert_eq!(times, vec![5, 6, 7]);
    }

    #[test]
    fn rows_are_ordered_and_flat() {
        let mut buffer = SampleBuffer::new(10);
        buffer.push(sample_at(10, 20.0));
        buffer.push(sample_at(20, 21.0));
        let rows = buffer.as_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["temperature"], 20.0);
        assert!(rows[0]["time"].as_str().unwrap() < rows[1]["time"].as_str().unwrap());
    }
}
