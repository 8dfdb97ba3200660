//! Run-wide constants. These are script knobs rather than user
//! configuration; the only override points are the environment variables
//! noted below.

use std::time::Duration;

/// Greater Bandung bounding box, `south,west,north,east` as Overpass wants it.
pub const BBOX: &str =
    "-7.119970883040842,107.29935103886602,-6.7164372353137045,108.00522056337834";

/// Public interpreter endpoints, rotated per attempt.
pub const OVERPASS_SERVERS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.osm.ch/api/interpreter",
];

/// Minimum spacing between any two interpreter requests of one run.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Concurrent per-node association requests.
pub const ASSOCIATION_WORKERS: usize = 4;

/// Node ids per batched association query.
pub const ASSOCIATION_BATCH_SIZE: usize = 25;

/// `source` attribute stamped onto converted shapefile records.
pub const SOURCE_NAME: &str = "Transport for Bandung";

/// Endpoints for this run: `OVERPASS_URL` (when set) first, then the public
/// mirrors.
pub fn overpass_servers() -> Vec<String> {
    let mut servers = Vec::new();
    if let Ok(url) = dotenvy::var("OVERPASS_URL") {
        servers.push(url);
    }
    servers.extend(OVERPASS_SERVERS.iter().map(|s| s.to_string()));
    servers
}
