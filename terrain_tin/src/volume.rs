//! Cut and fill volumes against a flat plane.
//!
//! Surface lying above the plane counts as cut and surface below it as fill.
//! Triangles that cross the plane are split along the zero line, so the
//! result is exact for the piecewise linear surface. Triangles inside voids
//! only add to `void_area`.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clip::{clone_and_clip, ClipMode};
use crate::delta::{delta_between, DeltaSurface};
use crate::error::{Result, TinError};
use crate::geometry::{lerp, orient2d, Point3};
use crate::reconcile::void_triangles;
use crate::store::TinMesh;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Volumes {
    pub cut: f64,
    pub fill: f64,
    /// Planimetric area lying above the plane.
    pub cut_area: f64,
    /// Planimetric area lying below the plane.
    pub fill_area: f64,
    pub void_area: f64,
}

impl Volumes {
    /// Net volume, positive when cut exceeds fill.
    pub fn balance(&self) -> f64 {
        self.cut - self.fill
    }

    fn add_prism(&mut self, corners: [Point3; 3], elevation: f64) {
        let heights = corners.map(|p| p.z - elevation);
        let mut above: Vec<Point3> = Vec::with_capacity(4);
        let mut below: Vec<Point3> = Vec::with_capacity(4);
        for i in 0..3 {
            let j = (i + 1) % 3;
            let (hp, hq) = (heights[i], heights[j]);
            if hp >= 0.0 {
                above.push(corners[i]);
            }
            if hp <= 0.0 {
                below.push(corners[i]);
            }
            if (hp > 0.0 && hq < 0.0) || (hp < 0.0 && hq > 0.0) {
                let crossing = lerp(&corners[i], &corners[j], hp / (hp - hq));
                above.push(crossing);
                below.push(crossing);
            }
        }
        let (volume, area) = fan_volume(&above, elevation);
        if volume > 0.0 {
            self.cut += volume;
            self.cut_area += area;
        }
        let (volume, area) = fan_volume(&below, elevation);
        if volume < 0.0 {
            self.fill -= volume;
            self.fill_area += area;
        }
    }
}

/// Signed volume and area of a convex polygon over the plane at `elevation`.
fn fan_volume(polygon: &[Point3], elevation: f64) -> (f64, f64) {
    let mut volume = 0.0;
    let mut area = 0.0;
    for i in 1..polygon.len().saturating_sub(1) {
        let (a, b, c) = (&polygon[0], &polygon[i], &polygon[i + 1]);
        let t = 0.5 * orient2d(a, b, c).abs();
        volume += t * ((a.z + b.z + c.z) / 3.0 - elevation);
        area += t;
    }
    (volume, area)
}

/// Volumes of `mesh` against the horizontal plane at `elevation`.
pub fn volumes_to_elevation(mesh: &TinMesh, elevation: f64) -> Result<Volumes> {
    mesh.require_tin()?;
    if !elevation.is_finite() {
        return Err(TinError::invalid("volume elevation must be finite"));
    }
    let excluded = void_triangles(mesh)?;
    let mut out = Volumes::default();
    for t in mesh.triangles() {
        if excluded.contains(&t) {
            out.void_area += mesh.triangle_area(&t);
            continue;
        }
        out.add_prism(t.map(|p| mesh.point(p)), elevation);
    }
    debug!(
        "volumes at {elevation}: cut {} over {}, fill {} over {}",
        out.cut, out.cut_area, out.fill, out.fill_area
    );
    Ok(out)
}

/// Like [`volumes_to_elevation`], counting only the part of `mesh` inside `region`.
pub fn volumes_within(mesh: &TinMesh, elevation: f64, region: &[Point3]) -> Result<Volumes> {
    let clipped = clone_and_clip(mesh, region, ClipMode::Internal)?;
    volumes_to_elevation(&clipped, elevation)
}

/// Cut where `a` lies above `b` and fill where it lies below, over their
/// common region.
pub fn volumes_between(a: &TinMesh, b: &TinMesh, region: Option<&[Point3]>) -> Result<Volumes> {
    delta_between(a, b, region)?.volumes()
}

impl DeltaSurface {
    /// Volumes of the difference surface against zero.
    pub fn volumes(&self) -> Result<Volumes> {
        volumes_to_elevation(&self.mesh, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_triangle_is_split_at_the_plane() {
        let mut v = Volumes::default();
        v.add_prism(
            [
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(2.0, 0.0, -1.0),
                Point3::new(0.0, 2.0, -1.0),
            ],
            0.0,
        );
        assert!((v.cut - 1.0 / 6.0).abs() < 1e-12);
        assert!((v.fill - 5.0 / 6.0).abs() < 1e-12);
        assert!((v.cut_area - 0.5).abs() < 1e-12);
        assert!((v.fill_area - 1.5).abs() < 1e-12);
        assert!((v.balance() + 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn triangle_on_the_plane_has_no_area_either_side() {
        let mut v = Volumes::default();
        v.add_prism(
            [
                Point3::new(0.0, 0.0, 3.0),
                Point3::new(1.0, 0.0, 3.0),
                Point3::new(0.0, 1.0, 3.0),
            ],
            3.0,
        );
        assert_eq!(v, Volumes::default());
    }

    #[test]
    fn triangle_touching_the_plane_counts_one_side() {
        let mut v = Volumes::default();
        v.add_prism(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 3.0),
            ],
            0.0,
        );
        assert!((v.cut - 0.5).abs() < 1e-12);
        assert_eq!(v.fill, 0.0);
        assert_eq!(v.fill_area, 0.0);
        assert!((v.cut_area - 0.5).abs() < 1e-12);
    }
}
