//! Pure coordinate and geometry converters between neutral points and each
//! provider's native encoding. Same input, same output: no hidden state.

use crate::domain::model::Point;
use serde_json::{json, Value};

/// Mean Earth radius used for the spherical circle approximation.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub const DEFAULT_CIRCLE_SEGMENTS: usize = 64;

pub trait CoordinateCodec {
    fn to_native(point: Point) -> Value;

    fn from_native(value: &Value) -> Option<Point>;

    fn path_to_native(points: &[Point]) -> Value {
        Value::Array(points.iter().map(|p| Self::to_native(*p)).collect())
    }

    fn path_from_native(value: &Value) -> Option<Vec<Point>> {
        value.as_array()?.iter().map(Self::from_native).collect()
    }
}

/// `[lat, lng]` arrays (Yandex).
pub struct LatLngArray;

/// `{lat, lng}` object literals (Google).
pub struct LatLngLiteral;

/// `[lng, lat]` arrays (2GIS).
pub struct LngLatArray;

fn pair(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((a.as_f64()?, b.as_f64()?)),
        _ => None,
    }
}

impl CoordinateCodec for LatLngArray {
    fn to_native(point: Point) -> Value {
        json!([point.lat, point.lng])
    }

    fn from_native(value: &Value) -> Option<Point> {
        pair(value).map(|(lat, lng)| Point::new(lat, lng))
    }
}

impl CoordinateCodec for LatLngLiteral {
    fn to_native(point: Point) -> Value {
        json!({ "lat": point.lat, "lng": point.lng })
    }

    fn from_native(value: &Value) -> Option<Point> {
        Some(Point::new(value.get("lat")?.as_f64()?, value.get("lng")?.as_f64()?))
    }
}

impl CoordinateCodec for LngLatArray {
    fn to_native(point: Point) -> Value {
        json!([point.lng, point.lat])
    }

    fn from_native(value: &Value) -> Option<Point> {
        pair(value).map(|(lng, lat)| Point::new(lat, lng))
    }
}

/// Approximates a circle as a closed ring of `segments + 1` points.
///
/// Each vertex is the spherical destination point at `radius_m` from
/// `center` along an evenly spaced bearing, so every vertex is exactly
/// `radius_m` away on the sphere. Ellipsoidal error stays below ~0.5%.
/// Longitudes are normalized into [-180, 180].
pub fn circle_to_polygon(center: Point, radius_m: f64, segments: usize) -> Vec<Point> {
    let segments = segments.max(3);
    let delta = radius_m / EARTH_RADIUS_M;
    let lat1 = center.lat.to_radians();
    let lng1 = center.lng.to_radians();

    (0..=segments)
        .map(|i| {
            // The last vertex repeats the first bearing to close the ring.
            let bearing = 2.0 * std::f64::consts::PI * (i % segments) as f64 / segments as f64;
            let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
            let lng2 = lng1
                + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());
            Point::new(lat2.to_degrees(), normalize_lng(lng2.to_degrees()))
        })
        .collect()
}

fn normalize_lng(lng: f64) -> f64 {
    let wrapped = (lng + 540.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lng > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: Point, b: Point) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// `#RRGGBB` or `#RRGGBBAA` to a CSS `rgba()` string.
pub fn hex_to_rgba(hex: Option<&str>, default_opacity: f64) -> String {
    let fallback = format!("rgba(255, 0, 0, {})", default_opacity);
    let Some(hex) = hex else {
        return fallback;
    };
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => format!("rgba({}, {}, {}, {})", r, g, b, default_opacity),
        (8, Some(r), Some(g), Some(b)) => match channel(6) {
            Some(a) => {
                let alpha = (a as f64 / 255.0 * 100.0).round() / 100.0;
                format!("rgba({}, {}, {}, {})", r, g, b, alpha)
            }
            None => fallback,
        },
        _ => fallback,
    }
}
