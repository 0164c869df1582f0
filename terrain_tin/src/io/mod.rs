//! File input and output for surfaces and data sets.

use std::fs::File;
use std::io::{self, Read, Write};

use crate::error::{Result, TinError};
use crate::geometry::Point3;

pub mod geojson;
pub mod landxml;
pub mod snapshot;

pub use self::geojson::{read_geojson_dataset, write_geojson_dataset};
pub use landxml::{read_landxml_surface, write_landxml_surface};
pub use snapshot::{read_snapshot, write_snapshot};

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Writes a string to a file, replacing its contents.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())
}

/// Parses whitespace separated numbers, skipping anything unparsable.
pub(crate) fn parse_numbers(text: &str) -> Vec<f64> {
    text.split_whitespace().filter_map(|s| s.parse().ok()).collect()
}

/// Reads `x,y[,z]` lines; blank lines are skipped.
pub fn read_points_csv(path: &str) -> Result<Vec<Point3>> {
    let text = read_to_string(path)?;
    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let values = line
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| TinError::Parse(format!("line {}: {e}", idx + 1)))?;
        match values.as_slice() {
            [x, y] => points.push(Point3::new(*x, *y, 0.0)),
            [x, y, z] => points.push(Point3::new(*x, *y, *z)),
            _ => {
                return Err(TinError::Parse(format!(
                    "line {}: expected x,y or x,y,z",
                    idx + 1
                )))
            }
        }
    }
    Ok(points)
}
