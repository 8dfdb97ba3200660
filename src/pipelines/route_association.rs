//! Strategies for mapping bus-stop nodes to the route relations that
//! reference them.
//!
//! All three produce the same mapping; they differ in how many interpreter
//! round trips they cost. A failed node or batch never aborts the run, the
//! affected nodes just keep empty route lists.

use std::collections::HashMap;

use futures::{stream, StreamExt};
use itertools::Itertools;
use tracing::{error, info};

use crate::config;
use crate::overpass::api_model::{ElementKind, OverpassResponse};
use crate::overpass::{queries, OverpassClient};

/// Member roles under which a stop node can appear in a route relation.
const ACCEPTED_ROLES: [&str; 5] = [
    "",
    "stop",
    "platform",
    "platform_entry_only",
    "platform_exit_only",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AssociationStrategy {
    /// One query per stop node, fanned out over a small worker pool.
    PerNode,
    /// One query per batch of node ids.
    Batched,
    /// One query for every bus route in the bounding box, matched locally.
    Bulk,
}

/// Resolves the routes for every given node. Every input id gets a key in
/// the result, empty when no relation references it.
pub async fn associate_routes(
    client: &OverpassClient,
    strategy: AssociationStrategy,
    node_ids: &[i64],
    bbox: &str,
) -> HashMap<i64, Vec<i64>> {
    match strategy {
        AssociationStrategy::PerNode => per_node(client, node_ids).await,
        AssociationStrategy::Batched => batched(client, node_ids).await,
        AssociationStrategy::Bulk => bulk(client, node_ids, bbox).await,
    }
}

async fn per_node(client: &OverpassClient, node_ids: &[i64]) -> HashMap<i64, Vec<i64>> {
    stream::iter(node_ids.iter().copied())
        .map(|node_id| async move {
            let routes = match client.query(&queries::relations_for_node(node_id)).await {
                Ok(response) => relation_ids(&response),
                Err(e) => {
                    error!("failed to fetch relations for node {node_id}: {e}");
                    Vec::new()
                }
            };
            (node_id, routes)
        })
        .buffer_unordered(config::ASSOCIATION_WORKERS)
        .collect()
        .await
}

async fn batched(client: &OverpassClient, node_ids: &[i64]) -> HashMap<i64, Vec<i64>> {
    let mut mapping = HashMap::new();

    for batch in node_ids.chunks(config::ASSOCIATION_BATCH_SIZE) {
        match client.query(&queries::relations_for_nodes(batch)).await {
            Ok(response) => mapping.extend(membership(&response, batch)),
            Err(e) => {
                error!(
                    "batch of {} nodes failed, keeping them unassociated: {e}",
                    batch.len()
                );
                mapping.extend(batch.iter().map(|id| (*id, Vec::new())));
            }
        }
    }

    mapping
}

async fn bulk(client: &OverpassClient, node_ids: &[i64], bbox: &str) -> HashMap<i64, Vec<i64>> {
    match client.query(&queries::bus_routes_in_bbox(bbox)).await {
        Ok(response) => {
            info!(
                "matching {} nodes against {} relations locally",
                node_ids.len(),
                response.elements.len()
            );
            membership(&response, node_ids)
        }
        Err(e) => {
            error!("bulk route query failed, keeping all nodes unassociated: {e}");
            node_ids.iter().map(|id| (*id, Vec::new())).collect()
        }
    }
}

/// Relation ids in a per-node `out ids` response, sorted for stable output.
fn relation_ids(response: &OverpassResponse) -> Vec<i64> {
    let mut ids = response
        .elements
        .iter()
        .filter(|element| element.kind == ElementKind::Relation)
        .map(|element| element.id)
        .collect_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Scans relation members for the given nodes under the accepted stop roles.
fn membership(response: &OverpassResponse, node_ids: &[i64]) -> HashMap<i64, Vec<i64>> {
    let mut mapping: HashMap<i64, Vec<i64>> =
        node_ids.iter().map(|id| (*id, Vec::new())).collect();

    for relation in response
        .elements
        .iter()
        .filter(|element| element.kind == ElementKind::Relation)
    {
        for member in &relation.members {
            if member.kind != ElementKind::Node || !ACCEPTED_ROLES.contains(&member.role.as_str())
            {
                continue;
            }
            if let Some(routes) = mapping.get_mut(&member.id) {
                routes.push(relation.id);
            }
        }
    }

    for routes in mapping.values_mut() {
        routes.sort_unstable();
        routes.dedup();
    }

    mapping
}
