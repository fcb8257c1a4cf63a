//! Encoded polyline format: zig-zag varints of coordinate deltas, five bits per
//! printable character, latitude before longitude.

use anyhow::{Context, Result};
use geo_types::Coord;

use crate::route::{Coordinate, Route};

const CHUNK_BITS: u32 = 5;
const CHUNK_MASK: u64 = 0x1f;
const CONTINUATION: u64 = 0x20;
const CHAR_OFFSET: u8 = 63;

pub fn decode(encoded: &str, precision: u32) -> Result<Route> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.trim().as_bytes();

    let mut coords = Vec::new();
    let mut pos = 0;
    let (mut lat, mut lon) = (0_i64, 0_i64);

    while pos < bytes.len() {
        let start = pos;
        lat = lat
            .checked_add(next_value(bytes, &mut pos)?)
            .with_context(|| format!("Polyline latitude at byte {start} overflows"))?;
        lon = lon
            .checked_add(next_value(bytes, &mut pos)?)
            .with_context(|| format!("Polyline longitude at byte {start} overflows"))?;
        coords.push(Coord {
            x: lon as f64 / factor,
            y: lat as f64 / factor,
        });
    }

    Ok(Route::new(coords))
}

pub fn encode(coords: &[Coordinate], precision: u32) -> Result<String> {
    let factor = 10_f64.powi(precision as i32);
    let mut out = String::new();
    let (mut prev_lat, mut prev_lon) = (0_i64, 0_i64);

    for (i, c) in coords.iter().enumerate() {
        let lat = to_fixed(c.y, factor)
            .with_context(|| format!("Latitude {} of point {i} cannot be encoded", c.y))?;
        let lon = to_fixed(c.x, factor)
            .with_context(|| format!("Longitude {} of point {i} cannot be encoded", c.x))?;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lon - prev_lon);
        prev_lat = lat;
        prev_lon = lon;
    }

    Ok(out)
}

/// Scaled integer value of `v`, kept within +-2^62 so deltas between two
/// values always fit in an i64.
fn to_fixed(v: f64, factor: f64) -> Option<i64> {
    const LIMIT: f64 = (1_i64 << 62) as f64;
    let scaled = (v * factor).round();
    (scaled.is_finite() && scaled.abs() < LIMIT).then_some(scaled as i64)
}

fn next_value(bytes: &[u8], pos: &mut usize) -> Result<i64> {
    let start = *pos;
    let mut result = 0_u64;
    let mut shift = 0_u32;

    loop {
        let Some(&b) = bytes.get(*pos) else {
            anyhow::bail!("Truncated polyline: value starting at byte {start} never terminates");
        };
        if !(CHAR_OFFSET..=CHAR_OFFSET + 0x3f).contains(&b) {
            anyhow::bail!("Invalid polyline character {:?} at byte {}", b as char, *pos);
        }
        if shift >= 64 {
            anyhow::bail!("Polyline value starting at byte {start} overflows");
        }
        let chunk = (b - CHAR_OFFSET) as u64;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += CHUNK_BITS;
        *pos += 1;
        if chunk & CONTINUATION == 0 {
            break;
        }
    }

    // zig-zag
    let value = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !value } else { value })
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 {
        !((value as u64) << 1)
    } else {
        (value as u64) << 1
    };
    while v >= CONTINUATION {
        out.push(((CONTINUATION | (v & CHUNK_MASK)) as u8 + CHAR_OFFSET) as char);
        v >>= CHUNK_BITS;
    }
    out.push((v as u8 + CHAR_OFFSET) as char);
}
