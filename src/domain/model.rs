use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider-neutral coordinate in degrees, always `{lat, lng}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Highest zoom level every supported SDK accepts.
pub const MAX_ZOOM: u8 = 21;

/// Camera request for the map. Unset fields leave the current value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Option<Point>,
    pub zoom: Option<u8>,
}

impl MapView {
    pub fn new(center: Option<Point>, zoom: Option<u8>) -> Self {
        Self { center, zoom }
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_none() && self.zoom.is_none()
    }

    /// `self` overridden by whatever `newer` sets.
    pub fn merge(self, newer: MapView) -> MapView {
        MapView {
            center: newer.center.or(self.center),
            zoom: newer.zoom.or(self.zoom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "yandex")]
    Yandex,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "2gis")]
    TwoGis,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Yandex, ProviderId::Google, ProviderId::TwoGis];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Yandex => "yandex",
            ProviderId::Google => "google",
            ProviderId::TwoGis => "2gis",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yandex" => Ok(ProviderId::Yandex),
            "google" => Ok(ProviderId::Google),
            "2gis" | "twogis" => Ok(ProviderId::TwoGis),
            other => Err(format!("unknown map provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconSpec {
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_y: Option<i32>,
}

impl IconSpec {
    /// Anchor offset in pixels; defaults to bottom-center of the image.
    pub fn anchor(&self) -> (i32, i32) {
        (
            self.anchor_x.unwrap_or(self.width as i32 / 2),
            self.anchor_y.unwrap_or(self.height as i32),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
}

impl MarkerMeta {
    /// Inline label text, suppressed whenever an icon is set.
    pub fn visible_label(&self) -> Option<&str> {
        if self.icon.is_some() {
            None
        } else {
            self.label.as_deref()
        }
    }

    pub fn is_draggable(&self) -> bool {
        self.draggable.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDescriptor {
    pub id: String,
    pub provider: ProviderId,
    pub position: Point,
    #[serde(default)]
    pub meta: MarkerMeta,
}

impl MarkerDescriptor {
    pub fn new(id: impl Into<String>, provider: ProviderId, position: Point) -> Self {
        Self {
            id: id.into(),
            provider,
            position,
            meta: MarkerMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: MarkerMeta) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Circle,
    Polygon,
    Polyline,
    Rectangle,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneKind::Circle => "circle",
            ZoneKind::Polygon => "polygon",
            ZoneKind::Polyline => "polyline",
            ZoneKind::Rectangle => "rectangle",
        };
        f.write_str(name)
    }
}

/// Zone geometry. A radius exists only on circles, and only circles carry
/// a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ZoneShape {
    Circle { center: Point, radius: f64 },
    Polygon { points: Vec<Point> },
    Polyline { points: Vec<Point> },
    Rectangle { points: Vec<Point> },
}

impl ZoneShape {
    pub fn circle(center: Point, radius: f64) -> Self {
        ZoneShape::Circle { center, radius }
    }

    pub fn polygon(points: Vec<Point>) -> Self {
        ZoneShape::Polygon { points }
    }

    pub fn polyline(points: Vec<Point>) -> Self {
        ZoneShape::Polyline { points }
    }

    /// Axis-aligned rectangle from two opposite corners, as a 4-point ring.
    pub fn rectangle(a: Point, b: Point) -> Self {
        let (south, north) = (a.lat.min(b.lat), a.lat.max(b.lat));
        let (west, east) = (a.lng.min(b.lng), a.lng.max(b.lng));
        ZoneShape::Rectangle {
            points: vec![
                Point::new(south, west),
                Point::new(north, west),
                Point::new(north, east),
                Point::new(south, east),
            ],
        }
    }

    /// Rebuilds a path-based shape of `kind` from edited vertices.
    pub fn from_path(kind: ZoneKind, points: Vec<Point>) -> Option<Self> {
        match kind {
            ZoneKind::Circle => None,
            ZoneKind::Polygon => Some(ZoneShape::Polygon { points }),
            ZoneKind::Polyline => Some(ZoneShape::Polyline { points }),
            ZoneKind::Rectangle => Some(ZoneShape::Rectangle { points }),
        }
    }

    pub fn kind(&self) -> ZoneKind {
        match self {
            ZoneShape::Circle { .. } => ZoneKind::Circle,
            ZoneShape::Polygon { .. } => ZoneKind::Polygon,
            ZoneShape::Polyline { .. } => ZoneKind::Polyline,
            ZoneShape::Rectangle { .. } => ZoneKind::Rectangle,
        }
    }

    pub fn radius(&self) -> Option<f64> {
        match self {
            ZoneShape::Circle { radius, .. } => Some(*radius),
            _ => None,
        }
    }

    pub fn points(&self) -> Option<&[Point]> {
        match self {
            ZoneShape::Circle { .. } => None,
            ZoneShape::Polygon { points }
            | ZoneShape::Polyline { points }
            | ZoneShape::Rectangle { points } => Some(points),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub id: String,
    pub provider: ProviderId,
    #[serde(flatten)]
    pub shape: ZoneShape,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub style: ZoneStyle,
    #[serde(default)]
    pub meta: ZoneMeta,
}

impl ZoneDescriptor {
    pub fn new(id: impl Into<String>, provider: ProviderId, shape: ZoneShape) -> Self {
        Self {
            id: id.into(),
            provider,
            shape,
            editable: false,
            style: ZoneStyle::default(),
            meta: ZoneMeta::default(),
        }
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_style(mut self, style: ZoneStyle) -> Self {
        self.style = style;
        self
    }

    pub fn kind(&self) -> ZoneKind {
        self.shape.kind()
    }
}

/// Result of forward or reverse geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoObject {
    pub coords: Point,
    pub name: String,
    pub description: String,
    pub text: String,
}
