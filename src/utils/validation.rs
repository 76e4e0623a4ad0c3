use crate::domain::model::{MapView, MarkerDescriptor, Point, ZoneDescriptor, ZoneShape, MAX_ZOOM};
use crate::utils::error::{GeoError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(GeoError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_point(field_name: &str, point: Point) -> Result<()> {
    if !point.is_valid() {
        return Err(GeoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("({}, {})", point.lat, point.lng),
            reason: "Latitude must be within [-90, 90] and longitude within [-180, 180]".to_string(),
        });
    }
    Ok(())
}

fn descriptor_error(id: &str, err: GeoError) -> GeoError {
    match err {
        GeoError::InvalidConfigValueError { field, reason, .. } => {
            GeoError::invalid_descriptor(id, format!("{}: {}", field, reason))
        }
        other => other,
    }
}

impl Validate for MapView {
    fn validate(&self) -> Result<()> {
        if let Some(center) = self.center {
            validate_point("map.center", center)?;
        }
        if let Some(zoom) = self.zoom {
            validate_range("map.zoom", zoom, 0, MAX_ZOOM)?;
        }
        Ok(())
    }
}

impl Validate for MarkerDescriptor {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("id", &self.id)?;
        validate_point("position", self.position).map_err(|e| descriptor_error(&self.id, e))?;
        if let Some(icon) = &self.meta.icon {
            if icon.url.trim().is_empty() || icon.width == 0 || icon.height == 0 {
                return Err(GeoError::invalid_descriptor(&self.id, "icon needs a url and a non-zero size"));
            }
        }
        Ok(())
    }
}

impl Validate for ZoneDescriptor {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("id", &self.id)?;
        let (points, min_points) = match &self.shape {
            ZoneShape::Circle { center, radius } => {
                validate_point("center", *center).map_err(|e| descriptor_error(&self.id, e))?;
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(GeoError::invalid_descriptor(
                        &self.id,
                        format!("radius must be a positive number of meters, got {}", radius),
                    ));
                }
                return Ok(());
            }
            ZoneShape::Polygon { points } => (points, 3),
            ZoneShape::Polyline { points } => (points, 2),
            ZoneShape::Rectangle { points } => {
                if points.len() != 4 {
                    return Err(GeoError::invalid_descriptor(
                        &self.id,
                        format!("rectangle needs exactly 4 corners, got {}", points.len()),
                    ));
                }
                (points, 4)
            }
        };
        if points.len() < min_points {
            return Err(GeoError::invalid_descriptor(
                &self.id,
                format!("{} needs at least {} points, got {}", self.kind(), min_points, points.len()),
            ));
        }
        for (i, point) in points.iter().enumerate() {
            validate_point(&format!("points[{}]", i), *point).map_err(|e| descriptor_error(&self.id, e))?;
        }
        Ok(())
    }
}
