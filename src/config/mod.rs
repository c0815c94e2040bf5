//! Configuration management for the solarfeed server

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::{env, time::Duration};
use url::Url;

use crate::error::{FeedError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// History server (backfill REST endpoints)
    pub server: HistoryServerConfig,

    /// Live channel transport
    pub live: LiveConfig,

    /// Rolling window sizing
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Weather forecast polling
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Renderer-facing HTTP surface
    #[serde(default)]
    pub http: HttpConfig,
}

/// History server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryServerConfig {
    /// Base URL of the history server (e.g. "https://feed.example.com")
    pub base_url: Url,

    /// Request timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Enable SSL/TLS verification
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

/// Live channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// WebSocket URL of the live feed (e.g. "wss://feed.example.com/live")
    pub url: Url,

    /// Reconnection policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Reconnection policy for the live channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection
    pub enabled: bool,

    /// Initial backoff delay
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum backoff delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Rolling window sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Samples retained per domain
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

/// Weather forecast polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// City slug for the forecast endpoint
    pub city: String,

    /// Poll interval
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            city: "joinville".to_string(),
            poll_interval: Duration::from_secs(1800),
        }
    }
}

/// Renderer-facing HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3500)),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

impl FeedConfig {
    /// Load configuration from environment variables.
    ///
    /// `SOLARFEED_SERVER_URL` and `SOLARFEED_LIVE_URL` are required; the rest
    /// fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("SOLARFEED_SERVER_URL")
            .map_err(|_| FeedError::config("SOLARFEED_SERVER_URL not set"))?;
        let live_url = env::var("SOLARFEED_LIVE_URL")
            .map_err(|_| FeedError::config("SOLARFEED_LIVE_URL not set"))?;

        let mut config = Self {
            server: HistoryServerConfig {
                base_url: base_url
                    .parse()
                    .map_err(|e| FeedError::config(format!("invalid server URL: {e}")))?,
                timeout: default_timeout(),
                verify_ssl: true,
            },
            live: LiveConfig {
                url: live_url
                    .parse()
                    .map_err(|e| FeedError::config(format!("invalid live URL: {e}")))?,
                reconnect: ReconnectConfig::default(),
            },
            buffer: BufferConfig::default(),
            forecast: ForecastConfig::default(),
            http: HttpConfig::default(),
        };

        if let Ok(city) = env::var("SOLARFEED_FORECAST_CITY") {
            config.forecast.city = city;
        }
        if let Ok(capacity) = env::var("SOLARFEED_BUFFER_CAPACITY") {
            config.buffer.capacity = capacity
                .parse()
                .map_err(|e| FeedError::config(format!("invalid buffer capacity: {e}")))?;
        }
        if let Ok(bind) = env::var("SOLARFEED_HTTP_BIND") {
            config.http.bind = bind
                .parse()
                .map_err(|e| FeedError::config(format!("invalid bind address: {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| FeedError::config(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.server.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FeedError::config(format!(
                    "server URL must be http(s), got {other}"
                )))
            }
        }
        match self.live.url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(FeedError::config(format!(
                    "live URL must be ws(s), got {other}"
                )))
            }
        }
        if self.server.timeout.is_zero() {
            return Err(FeedError::config("server timeout must be nonzero"));
        }
        if self.buffer.capacity == 0 {
            return Err(FeedError::config("buffer capacity must be nonzero"));
        }
        if self.forecast.city.is_empty() {
            return Err(FeedError::config("forecast city must not be empty"));
        }
        if self.forecast.poll_interval.is_zero() {
            return Err(FeedError::config("forecast poll interval must be nonzero"));
        }
        Ok(())
    }
}
