//! Area-of-interest bounds from GeoJSON.
//!
//! Crops take a bounding box in EPSG:4326. The box comes from the first
//! geometry in a GeoJSON document:
//!
//! - `FeatureCollection` → first feature's geometry (others are ignored)
//! - `Feature` → its geometry
//! - any geometry object (`Polygon`, `MultiPolygon`, `GeometryCollection`, ...)
//!
//! The bounds span every coordinate of that geometry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GeoJSON type {0} not recognized")]
    UnknownType(String),
    #[error("GeoJSON contains no geometry")]
    NoGeometry,
    #[error("Geometry has no coordinates")]
    NoCoordinates,
}

/// Geographic bounding box in longitude/latitude degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Corners in `gdal_translate -projwin` order: upper-left x, upper-left y,
    /// lower-right x, lower-right y.
    pub fn projwin(&self) -> [f64; 4] {
        [self.min_x, self.max_y, self.max_x, self.min_y]
    }

    fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

/// Read a GeoJSON file and return the bounds of its first geometry.
pub fn load_bounds(path: &Path) -> Result<Bounds, GeoError> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    bounds_from_geojson(&value)
}

/// Bounds of the first geometry in a parsed GeoJSON document.
pub fn bounds_from_geojson(value: &Value) -> Result<Bounds, GeoError> {
    let geometry = first_geometry(value)?;
    let mut bounds: Option<Bounds> = None;
    visit_positions(geometry, &mut |x, y| match bounds.as_mut() {
        Some(b) => b.extend(x, y),
        None => {
            bounds = Some(Bounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            })
        }
    });
    bounds.ok_or(GeoError::NoCoordinates)
}

fn type_of(value: &Value) -> &str {
    value.get("type").and_then(Value::as_str).unwrap_or("")
}

fn first_geometry(value: &Value) -> Result<&Value, GeoError> {
    match type_of(value) {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or(GeoError::NoGeometry)?;
            let first = features.first().ok_or(GeoError::NoGeometry)?;
            if features.len() > 1 {
                warn!(
                    "{} features in collection; using the first geometry",
                    features.len()
                );
            }
            first_geometry(first)
        }
        "Feature" => match value.get("geometry") {
            Some(geometry) if !geometry.is_null() => Ok(geometry),
            _ => Err(GeoError::NoGeometry),
        },
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon"
        | "MultiPolygon" | "GeometryCollection" => Ok(value),
        other => Err(GeoError::UnknownType(other.to_string())),
    }
}

/// Call `f` for every `[x, y, ...]` position under a geometry.
fn visit_positions(geometry: &Value, f: &mut impl FnMut(f64, f64)) {
    if type_of(geometry) == "GeometryCollection" {
        if let Some(members) = geometry.get("geometries").and_then(Value::as_array) {
            for member in members {
                visit_positions(member, f);
            }
        }
        return;
    }
    if let Some(coordinates) = geometry.get("coordinates") {
        visit_coordinates(coordinates, f);
    }
}

fn visit_coordinates(value: &Value, f: &mut impl FnMut(f64, f64)) {
    let Some(items) = value.as_array() else {
        return;
    };
    if let (Some(x), Some(y)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        f(x, y);
        return;
    }
    for item in items {
        visit_coordinates(item, f);
    }
}
