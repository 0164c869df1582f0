//! Tunable constants of the terrain engine.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings carried by every mesh and inherited by clones and scratch meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TinSettings {
    /// Entries per arena partition.
    pub partition_size: usize,
    /// Multiplier applied to machine precision for point and line merges.
    pub point_tolerance_factor: f64,
    /// Multiplier used while inserting a clip boundary.
    pub clip_tolerance_factor: f64,
    /// Upper bound on bisection steps when estimating machine precision.
    pub machine_precision_iterations: usize,
    /// Unsorted points tolerated before the spatial index is rebuilt.
    pub resort_threshold: usize,
    /// Drape misses tolerated by the delta engine.
    pub drape_failure_limit: usize,
    /// Smallest polygon piece kept after an external clip.
    pub min_polygon_area: f64,
    /// Smallest area/perimeter ratio kept after an external clip.
    pub min_area_perimeter_ratio: f64,
    /// Run the topology check after every mutating operation.
    pub integrity_checks: bool,
}

impl Default for TinSettings {
    fn default() -> Self {
        Self {
            partition_size: 4096,
            point_tolerance_factor: 1000.0,
            clip_tolerance_factor: 10000.0,
            machine_precision_iterations: 80,
            resort_threshold: 1500,
            drape_failure_limit: 100,
            min_polygon_area: 0.1,
            min_area_perimeter_ratio: 1e-5,
            integrity_checks: false,
        }
    }
}

impl TinSettings {
    /// Loads settings from a JSON file; omitted keys keep their defaults.
    pub fn from_json_file(path: &str) -> Result<Self> {
        let data = crate::io::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(data)?;
        Ok(settings)
    }
}
