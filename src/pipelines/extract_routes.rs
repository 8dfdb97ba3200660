//! Responsible for building `routes.json` from the route-picker HTML page
//! of the site.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::model::manifest::{RouteCategory, RouteEntry, RoutesManifest};

#[tracing::instrument(err)]
pub fn extract_routes(input_html: &Path, output_json: &Path) -> anyhow::Result<()> {
    let html = fs::read_to_string(input_html)
        .with_context(|| format!("error reading {}", input_html.display()))?;

    let manifest = parse_route_page(&html)?;
    info!(
        "extracted {} routes in {} categories",
        manifest.iter_routes().count(),
        manifest.categories.len()
    );

    if let Some(parent) = output_json.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_json, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("error writing {}", output_json.display()))?;

    Ok(())
}

fn parse_route_page(html: &str) -> anyhow::Result<RoutesManifest> {
    let document = Html::parse_document(html);

    let collapsible = selector(".route-map-collapsible")?;
    let category_label = selector(".route-map-collapsible-bar span")?;
    let checkbox = selector(r#".route-option input[type="checkbox"]"#)?;

    let mut categories = Vec::new();
    for section in document.select(&collapsible) {
        let name = section
            .select(&category_label)
            .next()
            .map(|label| label.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let routes = section
            .select(&checkbox)
            .filter_map(route_entry)
            .collect::<Vec<_>>();

        // Empty sections are headers under construction on the site.
        if !routes.is_empty() {
            categories.push(RouteCategory { name, routes });
        }
    }

    Ok(RoutesManifest { categories })
}

fn route_entry(checkbox: ElementRef<'_>) -> Option<RouteEntry> {
    let relation_id = required_attr(checkbox, "data-relation-id")?;
    let color = required_attr(checkbox, "data-route-color")?;
    let display_type = required_attr(checkbox, "data-display-type")?;

    // The route label is the text right after the checkbox element.
    let name = checkbox
        .next_siblings()
        .find_map(|node| {
            node.value()
                .as_text()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_else(|| {
            warn!("checkbox for relation {relation_id} has no label, using the id");
            relation_id.clone()
        });

    Some(RouteEntry {
        relation_id,
        name,
        color,
        display_type,
    })
}

fn required_attr(checkbox: ElementRef<'_>, attr: &str) -> Option<String> {
    let value = checkbox.attr(attr);
    if value.is_none() {
        warn!("skipping a route checkbox without {attr}");
    }
    value.map(str::to_string)
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}
