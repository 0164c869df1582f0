//! Machine precision estimate and the merge tolerances derived from it.

use serde::{Deserialize, Serialize};

use crate::geometry::Bounds3;

/// Merge tolerances of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Spacing of representable values near the largest coordinate.
    pub machine: f64,
    /// Two points closer than this are the same point.
    pub point_point: f64,
    /// A point closer than this to a line lies on it.
    pub point_line: f64,
}

impl Tolerances {
    /// Tolerances scaled from the machine precision of `bounds`.
    pub fn derive(bounds: &Bounds3, factor: f64, iterations: usize) -> Self {
        let machine = machine_precision(bounds.largest_coordinate(), iterations);
        Self::from_machine(machine, factor)
    }

    pub fn from_machine(machine: f64, factor: f64) -> Self {
        Self {
            machine,
            point_point: machine * factor,
            point_line: machine * factor,
        }
    }

    /// A zero point tolerance marks a mesh written before tolerances were stored.
    pub fn is_legacy(&self) -> bool {
        self.point_point == 0.0
    }

    /// Tolerances capped at `machine * factor`, used while inserting clip boundaries.
    pub fn capped(&self, factor: f64) -> Self {
        let cap = self.machine * factor;
        Self {
            machine: self.machine,
            point_point: self.point_point.min(cap),
            point_line: self.point_line.min(cap),
        }
    }

    /// The tighter of two tolerance sets.
    pub fn tighter(&self, other: &Tolerances) -> Self {
        Self {
            machine: self.machine.min(other.machine),
            point_point: self.point_point.min(other.point_point),
            point_line: self.point_line.min(other.point_line),
        }
    }
}

/// Estimates the gap between `large` and the next smaller representable value
/// by bisecting between zero and `large` until the midpoint stops moving.
///
/// Values below one are clamped to one so that small coordinate ranges still
/// get a usable tolerance.
pub fn machine_precision(large: f64, iterations: usize) -> f64 {
    let large = if large.is_finite() { large.abs().max(1.0) } else { 1.0 };
    let mut last = 0.0;
    let mut mid = large / 2.0;
    let mut steps = 0;
    while mid != last && mid != large && steps < iterations {
        last = mid;
        mid = (mid + large) / 2.0;
        steps += 1;
    }
    large - last
}
