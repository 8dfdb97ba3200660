//! `routes.json`, produced by `extract-routes` and consumed by the geometry
//! fetcher and both converters.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct RoutesManifest {
    pub categories: Vec<RouteCategory>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RouteCategory {
    pub name: String,
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    /// OSM relation id, kept as the string the site markup carries.
    #[serde(rename = "relationId")]
    pub relation_id: String,
    pub name: String,
    /// Hex color straight from the site stylesheet, `#RRGGBB` or `#RGB`.
    pub color: String,
    /// Display type of the route on the site, e.g. `ways_with_points`.
    #[serde(rename = "type")]
    pub display_type: String,
}

impl RoutesManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Every route of every category, in manifest order.
    pub fn iter_routes(&self) -> impl Iterator<Item = (&RouteCategory, &RouteEntry)> {
        self.categories
            .iter()
            .flat_map(|category| category.routes.iter().map(move |route| (category, route)))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("error reading the routes manifest")]
    Io(#[from] std::io::Error),

    #[error("error parsing the routes manifest")]
    Json(#[from] serde_json::Error),
}
