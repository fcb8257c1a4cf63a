use anyhow::{Context, Result};
use geo_types::Coord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::route::{Route, RouteCollection};

/// Load a GPX file: every non-empty track segment becomes one route.
pub fn load_routes(path: &Path) -> Result<RouteCollection> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let routes = parse_gpx(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    info!(
        "Loaded {}: {} routes, {} points",
        path.display(),
        routes.routes.len(),
        routes.total_points(),
    );
    Ok(routes)
}

fn parse_gpx<R: Read>(reader: R) -> Result<RouteCollection> {
    let gpx_data = gpx::read(reader)?;

    let mut routes = Vec::new();

    for track in &gpx_data.tracks {
        for segment in &track.segments {
            let coords: Vec<_> = segment
                .points
                .iter()
                .map(|p| Coord {
                    x: p.point().x(),
                    y: p.point().y(),
                })
                .collect();

            if coords.is_empty() {
                debug!(
                    "Skipping empty segment in track {}",
                    track.name.as_deref().unwrap_or("<unnamed>")
                );
                continue;
            }

            routes.push(Route::new(coords));
        }
    }

    Ok(RouteCollection::new(routes))
}
