//! Responsible for converting each route's GeoJSON fragments into line and
//! point shapefiles with a QGIS style sidecar.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use itertools::Itertools;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polyline};
use tracing::{info, warn};

use crate::config;
use crate::kml::hex_to_rgb;
use crate::model::geojson::{read_fragments, Feature, Geometry};
use crate::model::manifest::{RouteEntry, RoutesManifest};
use crate::utils::sanitize_filename;

/// WGS84, the CRS the fragments already come in. Written as-is, no
/// reprojection happens anywhere in the converter.
const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;

#[tracing::instrument(err, skip(manifest))]
pub fn convert_shapefile(
    manifest: &RoutesManifest,
    data_dir: &Path,
    output_dir: &Path,
) -> anyhow::Result<()> {
    for (_, route) in manifest.iter_routes() {
        let route_dir = data_dir.join(&route.relation_id);
        if !route_dir.exists() {
            warn!("skipping missing directory: {}", route_dir.display());
            continue;
        }

        let features = read_fragments(&route_dir)
            .with_context(|| format!("error listing {}", route_dir.display()))?;

        let route_output_dir = output_dir.join(sanitize_filename(&route.name));
        fs::create_dir_all(&route_output_dir)
            .with_context(|| format!("error creating {}", route_output_dir.display()))?;

        write_route_layers(route, &features, &route_output_dir)
            .with_context(|| format!("error converting {}", route.name))?;
    }

    Ok(())
}

fn write_route_layers(
    route: &RouteEntry,
    features: &[Feature],
    output_dir: &Path,
) -> anyhow::Result<()> {
    let mut lines: Vec<(Polyline, Record)> = Vec::new();
    let mut points: Vec<(Point, Record)> = Vec::new();

    for feature in features {
        // Unsupported geometry types are excluded here, everything else in
        // the fragment still converts.
        match feature.geometry() {
            Some(Geometry::LineString { coordinates }) => {
                if let Some(polyline) = polyline(vec![coordinates]) {
                    lines.push((polyline, record(route, feature)));
                }
            }
            Some(Geometry::MultiLineString { coordinates }) => {
                if let Some(polyline) = polyline(coordinates) {
                    lines.push((polyline, record(route, feature)));
                }
            }
            Some(Geometry::Point { coordinates }) => {
                points.push((
                    Point::new(coordinates[0], coordinates[1]),
                    record(route, feature),
                ));
            }
            None => {}
        }
    }

    if !lines.is_empty() {
        let path = output_dir.join("route_lines.shp");
        write_layer(&path, lines)?;
        fs::write(output_dir.join("route_lines.prj"), WGS84_WKT)?;
        fs::write(output_dir.join("route_lines.qml"), line_style_qml(&route.color))?;
        info!("saved {}", path.display());
    } else {
        info!("no line features for {}", route.name);
    }

    if !points.is_empty() {
        let path = output_dir.join("stops.shp");
        write_layer(&path, points)?;
        fs::write(output_dir.join("stops.prj"), WGS84_WKT)?;
        info!("saved {}", path.display());
    }

    Ok(())
}

fn write_layer<S: shapefile::record::EsriShape>(
    path: &Path,
    shapes: Vec<(S, Record)>,
) -> anyhow::Result<()> {
    let mut writer = shapefile::Writer::from_path(path, attribute_table()?)
        .with_context(|| format!("error creating {}", path.display()))?;

    for (shape, record) in shapes {
        writer.write_shape_and_record(&shape, &record)?;
    }

    Ok(())
}

/// Shapefile attribute columns. DBF limits names to 10 characters, which is
/// exactly what `route_name` spends.
fn attribute_table() -> anyhow::Result<TableWriterBuilder> {
    let mut builder = TableWriterBuilder::new();
    for field in ["name", "route_name", "color", "source"] {
        let name =
            FieldName::try_from(field).map_err(|_| anyhow!("invalid dbf field name {field}"))?;
        builder = builder.add_character_field(name, 120);
    }
    Ok(builder)
}

fn record(route: &RouteEntry, feature: &Feature) -> Record {
    let mut record = Record::default();
    record.insert(
        "name".to_string(),
        FieldValue::Character(feature.name().map(str::to_string)),
    );
    record.insert(
        "route_name".to_string(),
        FieldValue::Character(Some(route.name.clone())),
    );
    record.insert(
        "color".to_string(),
        FieldValue::Character(Some(route.color.clone())),
    );
    record.insert(
        "source".to_string(),
        FieldValue::Character(Some(config::SOURCE_NAME.to_string())),
    );
    record
}

/// Builds the polyline parts, dropping degenerate ones. `None` when nothing
/// drawable remains.
fn polyline(line_coordinates: Vec<Vec<[f64; 2]>>) -> Option<Polyline> {
    let parts = line_coordinates
        .into_iter()
        .filter(|coordinates| coordinates.len() >= 2)
        .map(|coordinates| {
            coordinates
                .iter()
                .map(|c| Point::new(c[0], c[1]))
                .collect_vec()
        })
        .collect_vec();

    if parts.is_empty() {
        return None;
    }
    Some(Polyline::with_parts(parts))
}

/// QGIS style with the route color and a fixed stroke width, saved next to
/// the line layer so the shapefile opens pre-styled.
fn line_style_qml(hex_color: &str) -> String {
    let (r, g, b) = hex_to_rgb(hex_color);
    format!(
        r#"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="3.28.0" styleCategories="Symbology">
  <renderer-v2 type="singleSymbol" forceraster="0" enableorderby="0">
    <symbols>
      <symbol type="line" name="0" alpha="1" clip_to_extent="1">
        <layer class="SimpleLine" enabled="1" locked="0">
          <Option type="Map">
            <Option type="QString" name="line_color" value="{r},{g},{b},255"/>
            <Option type="QString" name="line_style" value="solid"/>
            <Option type="QString" name="line_width" value="1.2"/>
            <Option type="QString" name="line_width_unit" value="MM"/>
          </Option>
        </layer>
      </symbol>
    </symbols>
  </renderer-v2>
</qgis>
"#
    )
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    #[test]
    fn qml_style_carries_the_route_color_as_rgb() {
        let qml = line_style_qml("#FF8000");
        assert!(qml.contains(r#"name="line_color" value="255,128,0,255""#));
        assert!(qml.contains(r#"name="line_width" value="1.2""#));
    }

    #[test]
    fn degenerate_line_parts_are_dropped() {
        assert!(polyline(vec![vec![[0.0, 0.0]]]).is_none());

        let mixed = polyline(vec![
            vec![[0.0, 0.0]],
            vec![[0.0, 0.0], [1.0, 1.0]],
        ]);
        assert!(mixed.is_some());
    }

    #[test]
    fn records_inject_the_route_metadata() {
        let route = RouteEntry {
            relation_id: "13538340".to_string(),
            name: "Koridor 1".to_string(),
            color: "#FF0000".to_string(),
            display_type: "ways".to_string(),
        };
        let feature = Feature::new(
            Geometry::Point {
                coordinates: [107.6, -6.9],
            },
            Map::new(),
        );

        let record = record(&route, &feature);
        assert_eq!(
            record.get("route_name"),
            Some(&FieldValue::Character(Some("Koridor 1".to_string())))
        );
        assert_eq!(
            record.get("source"),
            Some(&FieldValue::Character(Some(
                "Transport for Bandung".to_string()
            )))
        );
    }
}
