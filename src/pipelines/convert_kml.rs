//! Responsible for converting each route's GeoJSON fragments into a styled
//! KML file for Google Earth.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::kml::KmlDocument;
use crate::model::geojson::{read_fragments, Feature, Geometry};
use crate::model::manifest::{RouteEntry, RoutesManifest};
use crate::utils::sanitize_filename;

#[tracing::instrument(err, skip(manifest))]
pub fn convert_kml(
    manifest: &RoutesManifest,
    data_dir: &Path,
    output_dir: &Path,
) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("error creating {}", output_dir.display()))?;

    for (_, route) in manifest.iter_routes() {
        let route_dir = data_dir.join(&route.relation_id);
        if !route_dir.exists() {
            warn!("skipping missing directory: {}", route_dir.display());
            continue;
        }

        let features = read_fragments(&route_dir)
            .with_context(|| format!("error listing {}", route_dir.display()))?;
        if features.is_empty() {
            info!("no features for {}", route.name);
            continue;
        }

        let kml = build_route_kml(route, &features);
        let path = output_dir.join(format!("{}.kml", sanitize_filename(&route.name)));
        fs::write(&path, kml).with_context(|| format!("error writing {}", path.display()))?;
        info!("saved {}", path.display());
    }

    Ok(())
}

fn build_route_kml(route: &RouteEntry, features: &[Feature]) -> String {
    let mut doc = KmlDocument::new(&route.name, &route.color);

    for feature in features {
        match feature.geometry() {
            Some(Geometry::LineString { coordinates }) => {
                doc.add_line_string(feature.name().unwrap_or("Route Segment"), &coordinates);
            }
            Some(Geometry::MultiLineString { coordinates }) => {
                doc.add_multi_line_string(feature.name().unwrap_or("Route Segment"), &coordinates);
            }
            Some(Geometry::Point { coordinates }) => {
                doc.add_point(feature.name().unwrap_or("Stop"), coordinates);
            }
            // Anything else is silently excluded from the output.
            None => {}
        }
    }

    doc.render()
}
