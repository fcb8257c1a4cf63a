use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::{AnimationPacing, DEFAULT_POLYLINE_PRECISION};
use crate::polyline;
use crate::route::Route;

/// One tick of the playback, as the animator would emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub step: usize,
    pub at: Duration,
    pub points: usize,
}

/// The frames the animator produces for `route`, with their offsets from the
/// first tick.
pub fn timeline(route: &Route, pacing: &AnimationPacing) -> Vec<Frame> {
    let n = route.len();
    if n < 2 {
        return Vec::new();
    }
    let delay = pacing.step_delay(n);
    (1..n)
        .map(|i| Frame {
            step: i,
            at: delay * (i - 1) as u32,
            points: i + 1,
        })
        .collect()
}

pub fn export_json(route: &Route, pacing: &AnimationPacing, output: &Path) -> Result<()> {
    let frames = timeline(route, pacing);
    let data = build_collection(route, pacing, &frames)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let json_str = serde_json::to_string(&data).context("Failed to serialize timeline")?;
    fs::write(output, &json_str)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Exported {} frames to {} ({} ms total)",
        frames.len(),
        output.display(),
        pacing.total_duration(route.len()).as_millis(),
    );
    Ok(())
}

fn build_collection(
    route: &Route,
    pacing: &AnimationPacing,
    frames: &[Frame],
) -> Result<Value> {
    let features: Vec<Value> = frames
        .iter()
        .map(|frame| {
            let coords: Vec<Value> = route[..frame.points]
                .iter()
                .map(|c| json!([c.x, c.y]))
                .collect();

            json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": coords,
                },
                "properties": {
                    "step": frame.step,
                    "at_ms": frame.at.as_millis() as u64,
                    "points": frame.points,
                },
            })
        })
        .collect();

    let encoded = polyline::encode(route, DEFAULT_POLYLINE_PRECISION)?;

    Ok(json!({
        "type": "FeatureCollection",
        "route_key": route.key().to_string(),
        "polyline": encoded,
        "step_ms": pacing.step_delay(route.len()).as_millis() as u64,
        "total_ms": pacing.total_duration(route.len()).as_millis() as u64,
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route::from_lon_lat(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]])
    }

    #[test]
    fn test_timeline_matches_ticks() {
        let pacing = AnimationPacing::fixed(Duration::from_millis(20));
        let frames = timeline(&route(), &pacing);
        assert_eq!(
            frames,
            vec![
                Frame {
                    step: 1,
                    at: Duration::ZERO,
                    points: 2,
                },
                Frame {
                    step: 2,
                    at: Duration::from_millis(20),
                    points: 3,
                },
                Frame {
                    step: 3,
                    at: Duration::from_millis(40),
                    points: 4,
                },
            ]
        );
        assert!(timeline(&Route::from_lon_lat(&[[5.0, 5.0]]), &pacing).is_empty());
    }

    #[test]
    fn test_collection_layout() {
        let pacing = AnimationPacing::fixed(Duration::from_millis(20));
        let r = route();
        let value = build_collection(&r, &pacing, &timeline(&r, &pacing)).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["route_key"], "4-0,0-3,3");
        assert_eq!(value["polyline"], polyline::encode(&r, 5).unwrap());
        assert_eq!(value["step_ms"], 20);
        assert_eq!(value["total_ms"], 40);

        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(
            features[0]["geometry"]["coordinates"],
            json!([[0.0, 0.0], [1.0, 1.0]])
        );
        assert_eq!(features[2]["properties"]["at_ms"], 40);
        assert_eq!(features[2]["properties"]["points"], 4);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = std::env::temp_dir().join(format!("runmap-export-{}", std::process::id()));
        let output = dir.join("frames.geojson");
        export_json(&route(), &AnimationPacing::default(), &output).unwrap();

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["features"].as_array().unwrap().len(), 3);
        // 3000 ms over 3 steps, capped at 50 ms per step
        assert_eq!(written["step_ms"], 50);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_export_fails_on_unencodable_route() {
        let dir = std::env::temp_dir().join(format!("runmap-export-bad-{}", std::process::id()));
        let output = dir.join("frames.geojson");
        let route = Route::from_lon_lat(&[[0.0, 1e300], [0.0, -1e300]]);

        assert!(export_json(&route, &AnimationPacing::default(), &output).is_err());
        assert!(!output.exists());

        let _ = fs::remove_dir_all(dir);
    }
}
