use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::model::manifest::RoutesManifest;
use crate::overpass::{OverpassClient, RetryPolicy};
use crate::pipelines::route_association::AssociationStrategy;

mod config;
mod kml;
mod model;
mod overpass;
mod pipelines;
mod utils;

/// Data pipelines for the Bandung transit map.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every bus stop in the bounding box and write per-category GeoJSON.
    FetchBusStops {
        #[arg(long, default_value = "route-data/bus-stop")]
        output_dir: PathBuf,

        /// How stop-to-route membership is resolved.
        #[arg(long, value_enum, default_value = "batched")]
        strategy: AssociationStrategy,

        /// Attempts per Overpass query before giving up.
        #[arg(long, default_value_t = 4)]
        retries: u32,
    },
    /// Fetch way and stop geometry for every route in the manifest.
    FetchRouteGeometries {
        #[arg(long, default_value = "route-data/routes.json")]
        routes: PathBuf,

        #[arg(long, default_value = "route-data/geojson")]
        data_dir: PathBuf,

        /// Attempts per Overpass query before giving up.
        #[arg(long, default_value_t = 4)]
        retries: u32,
    },
    /// Extract the route manifest from the route-picker HTML page.
    ExtractRoutes {
        input_html: PathBuf,
        output_json: PathBuf,
    },
    /// Convert per-route GeoJSON fragments into styled KML files.
    ConvertKml {
        #[arg(long, default_value = "route-data/routes.json")]
        routes: PathBuf,

        #[arg(long, default_value = "route-data/geojson")]
        data_dir: PathBuf,

        #[arg(long, default_value = "route-data/kml-named")]
        output_dir: PathBuf,
    },
    /// Convert per-route GeoJSON fragments into shapefiles with QGIS styles.
    ConvertShapefile {
        #[arg(long, default_value = "route-data/routes.json")]
        routes: PathBuf,

        #[arg(long, default_value = "route-data/geojson")]
        data_dir: PathBuf,

        #[arg(long, default_value = "route-data/shp-named")]
        output_dir: PathBuf,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();
    let _guard = init_tracing();

    let args = Args::parse();
    match args.command {
        Command::FetchBusStops {
            output_dir,
            strategy,
            retries,
        } => {
            let client = overpass_client(retries)?;
            pipelines::fetch_stops::fetch_bus_stops(&client, strategy, &output_dir).await?;
        }
        Command::FetchRouteGeometries {
            routes,
            data_dir,
            retries,
        } => {
            let client = overpass_client(retries)?;
            let manifest = RoutesManifest::load(&routes)
                .with_context(|| format!("error loading {}", routes.display()))?;
            pipelines::fetch_route_geometries::fetch_route_geometries(&client, &manifest, &data_dir)
                .await?;
        }
        Command::ExtractRoutes {
            input_html,
            output_json,
        } => {
            pipelines::extract_routes::extract_routes(&input_html, &output_json)?;
        }
        Command::ConvertKml {
            routes,
            data_dir,
            output_dir,
        } => {
            let manifest = RoutesManifest::load(&routes)
                .with_context(|| format!("error loading {}", routes.display()))?;
            pipelines::convert_kml::convert_kml(&manifest, &data_dir, &output_dir)?;
        }
        Command::ConvertShapefile {
            routes,
            data_dir,
            output_dir,
        } => {
            let manifest = RoutesManifest::load(&routes)
                .with_context(|| format!("error loading {}", routes.display()))?;
            pipelines::convert_shapefile::convert_shapefile(&manifest, &data_dir, &output_dir)?;
        }
    }

    Ok(())
}

fn overpass_client(max_attempts: u32) -> Result<OverpassClient> {
    let policy = RetryPolicy {
        max_attempts,
        ..RetryPolicy::default()
    };

    OverpassClient::new(
        config::overpass_servers(),
        policy,
        config::MIN_REQUEST_INTERVAL,
    )
    .context("error building the http client")
}

fn init_tracing() -> WorkerGuard {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily("./logs", "bandung_transit_data.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(appender);

    // A layer that logs events to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    Registry::default()
        .with(file_log)
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    guard
}
