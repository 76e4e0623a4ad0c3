use crate::adapters::convert::DEFAULT_CIRCLE_SEGMENTS;
use crate::adapters::geocode::DEFAULT_GEOCODER_ENDPOINT;
use crate::domain::model::{
    MapView, MarkerDescriptor, MarkerMeta, Point, ProviderId, ZoneDescriptor, ZoneMeta, ZoneShape, ZoneStyle,
};
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fewer sides than this render circles as visibly jagged polygons.
pub const MIN_CIRCLE_SEGMENTS: usize = 8;

/// A map scene: provider, view, geometry settings and the overlays to show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub map: MapConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub markers: Vec<SceneMarker>,
    #[serde(default)]
    pub zones: Vec<SceneZone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub provider: ProviderId,
    pub center: Option<Point>,
    pub zoom: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub circle_segments: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_results: Option<u32>,
}

fn default_geocoder_endpoint() -> String {
    DEFAULT_GEOCODER_ENDPOINT.to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocoder_endpoint(),
            api_key: None,
            timeout_seconds: None,
            max_results: None,
        }
    }
}

/// Marker entry; `provider` defaults to the scene's map provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMarker {
    pub id: String,
    pub provider: Option<ProviderId>,
    pub position: Point,
    #[serde(default)]
    pub meta: MarkerMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneZone {
    pub id: String,
    pub provider: Option<ProviderId>,
    #[serde(flatten)]
    pub shape: ZoneShape,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub style: ZoneStyle,
    #[serde(default)]
    pub meta: ZoneMeta,
}

impl SceneConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeoError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeoError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left
    /// as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeoError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        self.view().validate()?;
        if let Some(segments) = self.geometry.circle_segments {
            validate_positive_number("geometry.circle_segments", segments, MIN_CIRCLE_SEGMENTS)?;
        }
        validate_url("geocoding.endpoint", &self.geocoding.endpoint)?;
        if let Some(timeout) = self.geocoding.timeout_seconds {
            validate_range("geocoding.timeout_seconds", timeout, 1, 300)?;
        }
        if let Some(key) = &self.geocoding.api_key {
            if key.starts_with("${") {
                tracing::warn!("geocoding.api_key references an unset variable: {}", key);
            }
        }

        for marker in self.markers() {
            marker.validate()?;
        }
        for zone in self.zones() {
            zone.validate()?;
        }
        Ok(())
    }

    pub fn provider(&self) -> ProviderId {
        self.map.provider
    }

    pub fn view(&self) -> MapView {
        MapView::new(self.map.center, self.map.zoom)
    }

    pub fn circle_segments(&self) -> usize {
        self.geometry.circle_segments.unwrap_or(DEFAULT_CIRCLE_SEGMENTS)
    }

    pub fn markers(&self) -> Vec<MarkerDescriptor> {
        self.markers
            .iter()
            .map(|m| MarkerDescriptor {
                id: m.id.clone(),
                provider: m.provider.unwrap_or(self.map.provider),
                position: m.position,
                meta: m.meta.clone(),
            })
            .collect()
    }

    pub fn zones(&self) -> Vec<ZoneDescriptor> {
        self.zones
            .iter()
            .map(|z| ZoneDescriptor {
                id: z.id.clone(),
                provider: z.provider.unwrap_or(self.map.provider),
                shape: z.shape.clone(),
                editable: z.editable,
                style: z.style.clone(),
                meta: z.meta.clone(),
            })
            .collect()
    }

    /// The same scene retargeted at `provider`. Entries pinned to another
    /// provider keep their pin.
    pub fn for_provider(mut self, provider: ProviderId) -> Self {
        let previous = self.map.provider;
        self.map.provider = provider;
        for marker in &mut self.markers {
            if marker.provider == Some(previous) {
                marker.provider = None;
            }
        }
        for zone in &mut self.zones {
            if zone.provider == Some(previous) {
                zone.provider = None;
            }
        }
        self
    }
}

impl Validate for SceneConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
