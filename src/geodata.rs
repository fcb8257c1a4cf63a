use anyhow::{Context, Result};
use geo_types::Coord;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::route::{Route, RouteCollection};

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    geom_type: String,
    #[serde(default)]
    coordinates: serde_json::Value,
}

pub fn load_routes(path: &Path) -> Result<RouteCollection> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let routes =
        parse_geojson(&data).with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(
        "Loaded {}: {} routes, {} points",
        path.display(),
        routes.routes.len(),
        routes.total_points(),
    );
    Ok(routes)
}

/// Read the `LineString` features of a `FeatureCollection`, in order.
pub fn parse_geojson(json: &str) -> Result<RouteCollection> {
    let collection: FeatureCollection =
        serde_json::from_str(json).context("Not a GeoJSON FeatureCollection")?;

    let mut routes = Vec::new();
    for (i, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            warn!("Skipping feature {i}: no geometry");
            continue;
        };
        if geometry.geom_type != "LineString" {
            warn!(
                "Skipping feature {i} ({}): {} geometry",
                feature_name(&feature.properties),
                geometry.geom_type
            );
            continue;
        }

        let positions: Vec<Vec<f64>> = serde_json::from_value(geometry.coordinates)
            .with_context(|| format!("Feature {i}: malformed LineString coordinates"))?;
        let mut coords = Vec::with_capacity(positions.len());
        for (j, pos) in positions.iter().enumerate() {
            match pos.as_slice() {
                [lon, lat, ..] => coords.push(Coord { x: *lon, y: *lat }),
                _ => anyhow::bail!("Feature {i}: position {j} has fewer than two numbers"),
            }
        }
        routes.push(Route::new(coords));
    }

    Ok(RouteCollection::new(routes))
}

fn feature_name(properties: &Option<serde_json::Map<String, serde_json::Value>>) -> String {
    properties
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unnamed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linestrings_in_order() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "a"},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1, 120.5]]}},
                {"type": "Feature", "properties": {"name": "boundary"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "LineString", "coordinates": [[2, 2], [3, 3], [4, 4]]}}
            ]
        }"#;
        let routes = parse_geojson(json).unwrap();
        assert_eq!(routes.routes.len(), 2);
        assert_eq!(routes.routes[0].len(), 2);
        assert_eq!(routes.routes[0][1], Coord { x: 1.0, y: 1.0 });
        assert_eq!(routes.routes[1].key().to_string(), "3-2,2-4,4");
        assert!(routes.single_run().is_none());
    }

    #[test]
    fn test_single_feature_is_single_run() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
        ]}"#;
        assert!(parse_geojson(json).unwrap().single_run().is_some());
    }

    #[test]
    fn test_short_position_rejected() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1]]}}
        ]}"#;
        assert!(parse_geojson(json).is_err());
    }

    #[test]
    fn test_not_a_collection() {
        assert!(parse_geojson(r#"{"type": "Point", "coordinates": [0, 0]}"#).is_err());
    }
}
