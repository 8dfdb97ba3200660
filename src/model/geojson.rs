//! The subset of GeoJSON the pipelines read and write.
//!
//! Only Point, LineString and MultiLineString ever appear in this project's
//! data. Geometry is kept as raw JSON when a file is read so one feature with
//! an unexpected geometry type doesn't fail the whole file; the typed
//! accessor filters such features out instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    /// UTC stamp of the run that produced the file. Not part of the GeoJSON
    /// spec; readers that don't know it ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            features,
            fetched_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Value,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Feature {
            kind: "Feature".to_string(),
            geometry: geometry.into(),
            properties,
        }
    }

    /// Typed view of the geometry. `None` for anything the converters don't
    /// handle, which excludes the feature from output.
    pub fn geometry(&self) -> Option<Geometry> {
        serde_json::from_value(self.geometry.clone()).ok()
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }
}

/// Coordinates are `[lon, lat]` pairs as GeoJSON orders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Value {
        match geometry {
            Geometry::Point { coordinates } => {
                json!({ "type": "Point", "coordinates": coordinates })
            }
            Geometry::LineString { coordinates } => {
                json!({ "type": "LineString", "coordinates": coordinates })
            }
            Geometry::MultiLineString { coordinates } => {
                json!({ "type": "MultiLineString", "coordinates": coordinates })
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GeoJsonError {
    #[error("error reading a geojson file")]
    Io(#[from] std::io::Error),

    #[error("error parsing a geojson file")]
    Json(#[from] serde_json::Error),

    #[error("unsupported root object type {0:?}")]
    UnsupportedRoot(String),
}

/// Reads a `.geojson` file that holds either a whole collection or a single
/// feature, the two shapes the fetchers emit.
pub fn read_features(path: &Path) -> Result<Vec<Feature>, GeoJsonError> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;

    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let collection: FeatureCollection = serde_json::from_value(value)?;
            Ok(collection.features)
        }
        Some("Feature") => Ok(vec![serde_json::from_value(value)?]),
        other => Err(GeoJsonError::UnsupportedRoot(
            other.unwrap_or("missing").to_string(),
        )),
    }
}

/// Merges every `*.geojson` fragment directly under `dir`, in filename order.
/// Unreadable or malformed fragments are logged and skipped.
pub fn read_fragments(dir: &Path) -> Result<Vec<Feature>, GeoJsonError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "geojson"))
        .collect();
    paths.sort();

    let mut features = Vec::new();
    for path in paths {
        match read_features(&path) {
            Ok(mut found) => features.append(&mut found),
            Err(e) => warn!("skipping fragment {}: {e}", path.display()),
        }
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_collection_reloads_with_same_feature_count() -> Result<(), anyhow::Error> {
        let features = vec![
            Feature::new(
                Geometry::Point {
                    coordinates: [107.6, -6.9],
                },
                Map::new(),
            ),
            Feature::new(
                Geometry::LineString {
                    coordinates: vec![[107.6, -6.9], [107.7, -6.8]],
                },
                Map::new(),
            ),
        ];
        let mut collection = FeatureCollection::new(features);
        collection.fetched_at = Some("2024-05-01T00:00:00Z".to_string());

        let text = serde_json::to_string_pretty(&collection)?;
        let reloaded: FeatureCollection = serde_json::from_str(&text)?;

        assert_eq!(reloaded.features.len(), collection.features.len());
        assert_eq!(reloaded.kind, "FeatureCollection");
        Ok(())
    }

    #[test]
    fn unsupported_geometry_is_excluded_by_the_typed_accessor() -> Result<(), anyhow::Error> {
        let feature: Feature = serde_json::from_str(
            r##"{
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] },
                "properties": { "name": "depot" }
            }"##,
        )?;

        assert!(feature.geometry().is_none());
        assert_eq!(feature.name(), Some("depot"));
        Ok(())
    }

    #[test]
    fn single_feature_file_parses_like_a_one_element_collection() -> Result<(), anyhow::Error> {
        let value: Value = serde_json::from_str(
            r##"{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [107.61, -6.91] },
                "properties": {}
            }"##,
        )?;

        let feature: Feature = serde_json::from_value(value)?;
        assert_eq!(
            feature.geometry(),
            Some(Geometry::Point {
                coordinates: [107.61, -6.91]
            })
        );
        Ok(())
    }
}
