//! Responsible for fetching every bus stop in the bounding box, resolving
//! the routes that serve it and writing one GeoJSON file per shelter/pole
//! category.

use std::fs;
use std::path::Path;

use anyhow::Context;
use itertools::Itertools;
use tracing::info;

use crate::config;
use crate::model::geojson::FeatureCollection;
use crate::model::stop::{Stop, StopCategory};
use crate::overpass::{queries, OverpassClient};
use crate::pipelines::route_association::{associate_routes, AssociationStrategy};

#[tracing::instrument(err, skip(client))]
pub async fn fetch_bus_stops(
    client: &OverpassClient,
    strategy: AssociationStrategy,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let response = client
        .query(&queries::bus_stops_in_bbox(config::BBOX))
        .await
        .context("error fetching bus stops")?;

    let mut stops = response
        .elements
        .iter()
        .filter_map(Stop::from_element)
        .collect_vec();
    info!("got {} bus stops", stops.len());

    let node_ids = stops.iter().map(|stop| stop.id).collect_vec();
    let mut routes = associate_routes(client, strategy, &node_ids, config::BBOX).await;
    for stop in &mut stops {
        stop.routes = routes.remove(&stop.id).unwrap_or_default();
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("error creating {}", output_dir.display()))?;

    let fetched_at = chrono::Utc::now().to_rfc3339();
    let by_category = stops
        .iter()
        .map(|stop| (stop.category(), stop))
        .into_group_map();

    for category in StopCategory::ALL {
        let Some(stops) = by_category.get(&category) else {
            info!("no stops in category {category}, skipping");
            continue;
        };

        let features = stops.iter().map(|stop| stop.to_feature()).collect_vec();
        let mut collection = FeatureCollection::new(features);
        collection.fetched_at = Some(fetched_at.clone());

        // Serialize first so a failure never leaves a half-written file.
        let text = serde_json::to_string_pretty(&collection)?;
        let path = output_dir.join(format!("{category}.geojson"));
        fs::write(&path, text).with_context(|| format!("error writing {}", path.display()))?;

        info!("saved {} stops to {}", stops.len(), path.display());
    }

    Ok(())
}
