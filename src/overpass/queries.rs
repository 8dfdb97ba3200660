//! Overpass QL text the pipelines send.

use itertools::Itertools;

/// Every `highway=bus_stop` node in the bounding box, with tags.
pub fn bus_stops_in_bbox(bbox: &str) -> String {
    format!("[out:json][timeout:90];\nnode[\"highway\"=\"bus_stop\"]({bbox});\nout body;")
}

/// Bus route relations referencing one stop node, ids only.
pub fn relations_for_node(node_id: i64) -> String {
    format!(
        "[out:json][timeout:20];node({node_id})->.stop;relation(bn.stop)[\"type\"=\"route\"][\"route\"=\"bus\"];out ids;"
    )
}

/// Bus route relations referencing any of the given nodes, with members so
/// membership can be matched back to individual nodes.
pub fn relations_for_nodes(node_ids: &[i64]) -> String {
    let ids = node_ids.iter().join(",");
    format!(
        "[out:json][timeout:60];node(id:{ids});rel(bn)[\"type\"=\"route\"][\"route\"=\"bus\"];out body;"
    )
}

/// Every bus route relation in the bounding box, with members.
pub fn bus_routes_in_bbox(bbox: &str) -> String {
    format!(
        "[out:json][timeout:180];relation[\"type\"=\"route\"][\"route\"=\"bus\"]({bbox});out body;"
    )
}

/// Member ways of a route relation, with vertex geometry.
pub fn route_ways(relation_id: &str) -> String {
    format!("[out:json];relation({relation_id});way(r);out geom;")
}

/// Stop nodes of a route relation. `all_stops` takes every stop role;
/// otherwise only the entry/exit terminals are fetched.
pub fn route_stop_nodes(relation_id: &str, all_stops: bool) -> String {
    if all_stops {
        format!(
            "[out:json];relation({relation_id});(node(r:\"stop\");node(r:\"stop_entry_only\");node(r:\"stop_exit_only\"););out geom;"
        )
    } else {
        format!(
            "[out:json];relation({relation_id});(node(r:\"stop_entry_only\");node(r:\"stop_exit_only\"););out geom;"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_stop_query_filters_on_the_bbox() {
        let query = bus_stops_in_bbox("-7.1,107.3,-6.7,108.0");
        assert!(query.starts_with("[out:json]"));
        assert!(query.contains("node[\"highway\"=\"bus_stop\"](-7.1,107.3,-6.7,108.0);"));
        assert!(query.ends_with("out body;"));
    }

    #[test]
    fn per_node_query_asks_for_ids_only() {
        let query = relations_for_node(5280644761);
        assert!(query.contains("node(5280644761)->.stop;"));
        assert!(query.contains("relation(bn.stop)[\"type\"=\"route\"][\"route\"=\"bus\"]"));
        assert!(query.ends_with("out ids;"));
    }

    #[test]
    fn batched_query_lists_every_node_id() {
        let query = relations_for_nodes(&[1, 2, 3]);
        assert!(query.contains("node(id:1,2,3);"));
        assert!(query.ends_with("out body;"));
    }

    #[test]
    fn stop_node_query_selects_roles_by_display_type() {
        let all = route_stop_nodes("13538340", true);
        assert!(all.contains("node(r:\"stop\");"));
        assert!(all.contains("node(r:\"stop_entry_only\");"));

        let terminals = route_stop_nodes("13538340", false);
        assert!(!terminals.contains("node(r:\"stop\");"));
        assert!(terminals.contains("node(r:\"stop_exit_only\");"));
    }
}
