//! HTTP geocoder speaking the Yandex geocoder JSON format.
//!
//! Lookups never fail from the caller's point of view: transport, status
//! and parse problems are logged and yield an empty result list.

use crate::config::toml_config::GeocodingConfig;
use crate::domain::model::{GeoObject, Point, ProviderId};
use crate::domain::ports::Geocoder;
use crate::utils::error::{GeoError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GEOCODER_ENDPOINT: &str = "https://geocode-maps.yandex.ru/1.x/";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    response: GeocodeBody,
}

#[derive(Debug, Deserialize)]
struct GeocodeBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: FeatureCollection,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: YandexGeoObject,
}

#[derive(Debug, Deserialize)]
struct YandexGeoObject {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "Point")]
    point: YandexPoint,
    #[serde(rename = "metaDataProperty")]
    meta: Option<MetaDataProperty>,
}

#[derive(Debug, Deserialize)]
struct YandexPoint {
    /// `"lng lat"`, space separated.
    pos: String,
}

#[derive(Debug, Deserialize)]
struct MetaDataProperty {
    #[serde(rename = "GeocoderMetaData")]
    geocoder: GeocoderMetaData,
}

#[derive(Debug, Deserialize)]
struct GeocoderMetaData {
    #[serde(default)]
    text: String,
}

fn parse_pos(pos: &str) -> Option<Point> {
    let mut parts = pos.split_whitespace().map(str::parse::<f64>);
    let lng = parts.next()?.ok()?;
    let lat = parts.next()?.ok()?;
    Some(Point::new(lat, lng))
}

impl YandexGeoObject {
    fn into_geo_object(self) -> Option<GeoObject> {
        let coords = parse_pos(&self.point.pos)?;
        Some(GeoObject {
            coords,
            name: self.name,
            description: self.description,
            text: self.meta.map(|m| m.geocoder.text).unwrap_or_default(),
        })
    }
}

pub struct HttpGeocoder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    max_results: Option<u32>,
}

impl HttpGeocoder {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            timeout_seconds: None,
            max_results: None,
        }
    }

    pub fn from_config(config: &GeocodingConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
            max_results: config.max_results,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    fn supports(&self, provider: ProviderId) -> bool {
        if provider == ProviderId::Yandex {
            return true;
        }
        tracing::warn!("Geocoding is not supported for provider {}", provider);
        false
    }

    async fn fetch(&self, query: &str) -> Result<Vec<GeoObject>> {
        let api_key = self.api_key.as_deref().ok_or(GeoError::MissingConfigError {
            field: "geocoding.api_key".to_string(),
        })?;

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("apikey", api_key), ("format", "json"), ("geocode", query)]);
        if let Some(results) = self.max_results {
            request = request.query(&[("results", results)]);
        }
        if let Some(timeout) = self.timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout));
        }

        tracing::debug!("🌍 Geocoding '{}' via {}", query, self.endpoint);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeoError::GeocodeError {
                message: format!("status {}: {}", status, body.trim()),
            });
        }

        let parsed: GeocodeResponse = serde_json::from_str(&response.text().await?)?;
        let results: Vec<GeoObject> = parsed
            .response
            .collection
            .members
            .into_iter()
            .filter_map(|member| member.geo_object.into_geo_object())
            .collect();
        tracing::debug!("🌍 Geocoder returned {} result(s) for '{}'", results.len(), query);
        Ok(results)
    }

    async fn lookup(&self, query: &str) -> Vec<GeoObject> {
        match self.fetch(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, provider: ProviderId, address: &str) -> Vec<GeoObject> {
        if !self.supports(provider) || address.trim().is_empty() {
            return Vec::new();
        }
        self.lookup(address).await
    }

    async fn reverse_geocode(&self, provider: ProviderId, position: Point) -> Vec<GeoObject> {
        if !self.supports(provider) {
            return Vec::new();
        }
        self.lookup(&format!("{},{}", position.lng, position.lat)).await
    }
}
