//! Responsible for fetching each route relation's way and stop-node
//! geometry into per-route GeoJSON fragment files.

use std::fs;
use std::path::Path;

use anyhow::Context;
use itertools::Itertools;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::model::geojson::{Feature, FeatureCollection, Geometry};
use crate::model::manifest::{RouteEntry, RoutesManifest};
use crate::overpass::api_model::{Element, ElementKind};
use crate::overpass::{queries, OverpassClient};

/// Routes whose display type wants every stop rendered, not just terminals.
const WAYS_WITH_POINTS: &str = "ways_with_points";

#[tracing::instrument(err, skip(client, manifest))]
pub async fn fetch_route_geometries(
    client: &OverpassClient,
    manifest: &RoutesManifest,
    data_dir: &Path,
) -> anyhow::Result<()> {
    for (_, route) in manifest.iter_routes() {
        info!("processing relation {}", route.relation_id);
        if let Err(e) = fetch_one_route(client, route, data_dir).await {
            error!("error processing relation {}: {e:#}", route.relation_id);
        }
    }
    info!("all routes processed");

    Ok(())
}

async fn fetch_one_route(
    client: &OverpassClient,
    route: &RouteEntry,
    data_dir: &Path,
) -> anyhow::Result<()> {
    let route_dir = data_dir.join(&route.relation_id);
    fs::create_dir_all(&route_dir)
        .with_context(|| format!("error creating {}", route_dir.display()))?;

    let ways = client
        .query(&queries::route_ways(&route.relation_id))
        .await
        .context("error fetching member ways")?;
    let way_features = ways
        .elements
        .iter()
        .filter(|element| element.kind == ElementKind::Way)
        .map(way_feature)
        .collect_vec();
    write_fragment(&route_dir.join("ways.geojson"), way_features)?;

    let all_stops = route.display_type == WAYS_WITH_POINTS;
    let stops = client
        .query(&queries::route_stop_nodes(&route.relation_id, all_stops))
        .await
        .context("error fetching stop nodes")?;
    let stop_features = stops
        .elements
        .iter()
        .filter(|element| element.kind == ElementKind::Node)
        .filter_map(node_feature)
        .collect_vec();
    let file_name = if all_stops {
        "stops.geojson"
    } else {
        "endstops.geojson"
    };
    write_fragment(&route_dir.join(file_name), stop_features)?;

    Ok(())
}

fn way_feature(way: &Element) -> Feature {
    let coordinates = way
        .geometry
        .iter()
        .map(|vertex| [vertex.lon, vertex.lat])
        .collect_vec();

    Feature::new(Geometry::LineString { coordinates }, element_properties(way))
}

fn node_feature(node: &Element) -> Option<Feature> {
    let (lat, lon) = (node.lat?, node.lon?);

    Some(Feature::new(
        Geometry::Point {
            coordinates: [lon, lat],
        },
        element_properties(node),
    ))
}

/// The element id plus all its tags, in stable key order.
fn element_properties(element: &Element) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("id".to_string(), Value::from(element.id));
    for (key, value) in element.tags.iter().sorted() {
        properties.insert(key.clone(), Value::from(value.clone()));
    }
    properties
}

fn write_fragment(path: &Path, features: Vec<Feature>) -> anyhow::Result<()> {
    if features.is_empty() {
        info!("no features for {}, skipping", path.display());
        return Ok(());
    }

    let count = features.len();
    let text = serde_json::to_string(&FeatureCollection::new(features))?;
    fs::write(path, text).with_context(|| format!("error writing {}", path.display()))?;
    info!("saved {count} features to {}", path.display());

    Ok(())
}
