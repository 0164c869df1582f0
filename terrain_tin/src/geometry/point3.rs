//! Basic 3D point type used throughout the crate.

/// Representation of a 3D point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the point with its elevation replaced.
    pub fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }

    /// Planimetric distance to `other`, ignoring elevation.
    pub fn distance_xy(&self, other: &Point3) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// True when both planimetric coordinates are bit-identical.
    pub fn same_xy(&self, other: &Point3) -> bool {
        self.x == other.x && self.y == other.y
    }
}
