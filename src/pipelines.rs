pub mod convert_kml;
pub mod convert_shapefile;
pub mod extract_routes;
pub mod fetch_route_geometries;
pub mod fetch_stops;
pub mod route_association;
