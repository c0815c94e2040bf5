//! Weather forecast polling
//!
//! The forecast is not a rolling window: one report at a time, fetched on
//! start and refreshed on a fixed interval (30 minutes in the deployed
//! dashboard). Fetch failures keep the last good report.

use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use url::Url;

use crate::config::{ForecastConfig, HistoryServerConfig};
use crate::error::{FeedError, Result};

/// Current weather conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConditions {
    /// Condition description (e.g. "Parcialmente nublado")
    pub condition: String,

    /// Temperature in °C
    pub temperature: f64,

    /// Relative humidity in %
    pub humidity: f64,

    /// Wind direction
    pub wind_direction: String,

    /// Pressure in hPa
    pub pressure: f64,

    /// Report date as given by the provider
    pub date: String,
}

/// Weather report for a city
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    /// City name
    pub name: String,

    /// State / region
    pub state: String,

    /// Conditions
    pub data: WeatherConditions,
}

struct ForecastInner {
    client: Client,
    url: Url,
    config: ForecastConfig,
    report: RwLock<Option<WeatherReport>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Polls the forecast endpoint and keeps the last good report
#[derive(Clone)]
pub struct ForecastService {
    inner: Arc<ForecastInner>,
}

impl ForecastService {
    /// Create a forecast service against the history server
    pub fn new(server: &HistoryServerConfig, config: ForecastConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(server.timeout)
            .user_agent(format!("solarfeed/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::connection(format!("Failed to build HTTP client: {e}")))?;

        let url = server
            .base_url
            .join(&format!("/previsao/{}", config.city))
            .map_err(|e| FeedError::config(format!("bad forecast city {:?}: {e}", config.city)))?;

        Ok(Self {
            inner: Arc::new(ForecastInner {
                client,
                url,
                config,
                report: RwLock::new(None),
                task: Mutex::new(None),
            }),
        })
    }

    /// Fetch once, then refresh on the configured interval until [`Self::stop`]
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            debug!("forecast poller already running");
            return;
        }

        let service = self.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.inner.config.poll_interval);
            loop {
                // First tick fires immediately, giving the initial fetch
                ticker.tick().await;
                service.refresh().await;
            }
        }));
    }

    /// Stop polling; the last report stays available
    pub async fn stop(&self) {
        if let Some(task) = self.inner.task.lock().await.take() {
            task.abort();
        }
    }

    /// Last successfully fetched report, if any
    pub async fn report(&self) -> Option<WeatherReport> {
        self.inner.report.read().await.clone()
    }

    /// Fetch the forecast now and store it on success
    pub async fn refresh(&self) {
        match self.fetch().await {
            Ok(report) => {
                info!(
                    "forecast updated for {}, {}: {}",
                    report.name, report.state, report.data.condition
                );
                *self.inner.report.write().await = Some(report);
            }
            Err(e) => {
                // Keep the stale report rather than blanking the card
                error!("forecast fetch failed: {e}");
            }
        }
    }

    async fn fetch(&self) -> Result<WeatherReport> {
        let report = self
            .inner
            .client
            .get(self.inner.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<WeatherReport>()
            .await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_deserializes_provider_shape() {
        let raw = r#"{
            "name": "Joinville",
            "state": "SC",
            "data": {
                "condition": "Parcialmente nublado",
                "temperature": 24.5,
                "humidity": 78,
                "wind_direction": "NE",
                "pressure": 1015,
                "date": "01/03/2024 10:00"
            }
        }"#;
        let report: WeatherReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.name, "Joinville");
        assert_eq!(report.data.humidity, 78.0);
        assert_eq!(report.data.wind_direction, "NE");
    }
}
