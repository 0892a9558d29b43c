//! Best-effort location lookup for place searches
//!
//! Nothing here is allowed to fail a request: every fault or timeout
//! downgrades to "no location bias".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::state::LatLng;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn locate(&self) -> Result<LatLng>;
}

/// A coordinate taken from the config file
pub struct FixedLocation(pub LatLng);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn locate(&self) -> Result<LatLng> {
        Ok(self.0)
    }
}

/// Coarse location from an IP geolocation service (ip-api.com style JSON)
pub struct IpLocation {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct IpLocationResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude", alias = "lng")]
    lon: Option<f64>,
}

impl IpLocationResponse {
    fn into_lat_lng(self) -> Result<LatLng> {
        if let Some(status) = self.status.as_deref() {
            if status != "success" {
                return Err(anyhow!(
                    "Geolocation lookup failed: {}",
                    self.message.as_deref().unwrap_or(status)
                ));
            }
        }

        match (self.lat, self.lon) {
            (Some(lat), Some(lng)) => Ok(LatLng { lat, lng }),
            _ => Err(anyhow!("Geolocation response had no coordinates")),
        }
    }
}

impl IpLocation {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn locate(&self) -> Result<LatLng> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Geolocation request failed with status: {}", response.status()));
        }

        let body: IpLocationResponse = response.json().await?;
        body.into_lat_lng()
    }
}

/// Pick the provider the config asks for
pub fn provider_from_config(config: &Config) -> Arc<dyn LocationProvider> {
    match config.location {
        Some(location) => Arc::new(FixedLocation(location)),
        None => Arc::new(IpLocation::new(config.geolocation_url())),
    }
}

/// One-shot lookup bounded by `limit`. Faults and timeouts yield None.
pub async fn acquire_location(provider: &dyn LocationProvider, limit: Duration) -> Option<LatLng> {
    match tokio::time::timeout(limit, provider.locate()).await {
        Ok(Ok(location)) => {
            debug!("Location acquired");
            Some(location)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Could not retrieve location, proceeding without it");
            None
        }
        Err(_) => {
            warn!(timeout_secs = limit.as_secs_f32(), "Location lookup timed out, proceeding without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl LocationProvider for Failing {
        async fn locate(&self) -> Result<LatLng> {
            Err(anyhow!("permission denied"))
        }
    }

    struct Slow;

    #[async_trait]
    impl LocationProvider for Slow {
        async fn locate(&self) -> Result<LatLng> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(LatLng { lat: 0.0, lng: 0.0 })
        }
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let here = LatLng { lat: 48.85, lng: 2.35 };
        let found = acquire_location(&FixedLocation(here), Duration::from_secs(5)).await;
        assert_eq!(found, Some(here));
    }

    #[tokio::test]
    async fn test_failure_downgrades_to_none() {
        assert_eq!(acquire_location(&Failing, Duration::from_secs(5)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_downgrades_to_none() {
        assert_eq!(acquire_location(&Slow, Duration::from_secs(5)).await, None);
    }

    #[test]
    fn test_parse_ip_api_shapes() {
        let ok: IpLocationResponse =
            serde_json::from_str(r#"{"status":"success","lat":52.52,"lon":13.40,"city":"Berlin"}"#).unwrap();
        assert_eq!(ok.into_lat_lng().unwrap(), LatLng { lat: 52.52, lng: 13.40 });

        let alt: IpLocationResponse =
            serde_json::from_str(r#"{"latitude":35.68,"longitude":139.69}"#).unwrap();
        assert_eq!(alt.into_lat_lng().unwrap(), LatLng { lat: 35.68, lng: 139.69 });

        let failed: IpLocationResponse =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert!(failed.into_lat_lng().is_err());
    }

    #[test]
    fn test_provider_from_config_prefers_fixed() {
        let config = Config {
            location: Some(LatLng { lat: 1.0, lng: 2.0 }),
            ..Config::new()
        };
        let provider = provider_from_config(&config);
        let found = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(provider.locate())
            .unwrap();
        assert_eq!(found, LatLng { lat: 1.0, lng: 2.0 });
    }
}
