use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GeocodeError;

pub const OPENCAGE_URL: &str = "https://api.opencagedata.com";

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// Address lookup. Candidates come back in provider order.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinate>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
    status: Option<OpenCageStatus>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    geometry: OpenCageGeometry,
}

#[derive(Debug, Deserialize)]
struct OpenCageGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OpenCageStatus {
    code: u16,
    message: String,
}

pub struct OpenCageGeocoder {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<Secret<String>>,
}

impl OpenCageGeocoder {
    pub fn new(base_url: Url, api_key: Option<Secret<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    fn request_url(&self, address: &str, api_key: &str) -> Result<Url, GeocodeError> {
        let endpoint = self.base_url.join("geocode/v1/json")?;
        Ok(Url::parse_with_params(
            endpoint.as_str(),
            &[("q", address), ("key", api_key), ("no_annotations", "1")],
        )?)
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinate>, GeocodeError> {
        let api_key = self.api_key.as_ref().ok_or(GeocodeError::NotConfigured)?;
        let url = self.request_url(address, api_key.expose_secret())?;

        let response = self.client.get(url).send().await?;
        let http_status = response.status();

        if !http_status.is_success() {
            // Error bodies are not always JSON (proxies, empty 403s)
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenCageResponse>(&text)
                .ok()
                .and_then(|body| body.status)
                .map(|s| s.message)
                .unwrap_or_else(|| http_status.to_string());
            return Err(GeocodeError::Provider {
                code: http_status.as_u16(),
                message,
            });
        }

        let body: OpenCageResponse = response.json().await?;
        if let Some(status) = body.status.as_ref().filter(|s| s.code != 200) {
            return Err(GeocodeError::Provider {
                code: status.code,
                message: status.message.clone(),
            });
        }

        Ok(body
            .results
            .into_iter()
            .map(|result| Coordinate {
                latitude: result.geometry.lat,
                longitude: result.geometry.lng,
            })
            .collect())
    }
}
