//! Elevation difference surfaces.
//!
//! Two meshes are trimmed to their common region, the smaller one absorbs
//! the other's points and edges so both surfaces are piecewise linear on the
//! same triangles, and each merged point stores the elevation difference
//! found by draping it on the other mesh.

use log::{debug, info, warn};
use std::collections::HashMap;

use crate::check::{check_scratch_clear, check_topology};
use crate::clip::{clip_to_polygon, clone_and_clip, ClipMode};
use crate::error::{Result, TinError};
use crate::geometry::Point3;
use crate::oracle::{clean_polygon, Classification, Intersection, Oracle};
use crate::reconcile::reconcile;
use crate::store::{FeatureType, PointId, TinMesh};

/// Result of [`delta_between`].
#[derive(Debug, Clone)]
pub struct DeltaSurface {
    /// Surface whose elevations are `A - B`.
    pub mesh: TinMesh,
    /// `true` when `B` had fewer points and received `A`'s points.
    pub swapped: bool,
    /// Points of the merged surface that could not be draped on the other mesh.
    pub unlocated: usize,
    /// Secondary points and edges that could not be inserted into the primary.
    pub merge_failures: usize,
}

/// Counts tolerated failures of one phase and aborts once `limit` is exceeded.
#[derive(Debug, Clone, Copy)]
struct FailureBudget {
    failures: usize,
    limit: usize,
}

impl FailureBudget {
    fn new(limit: usize) -> Self {
        Self { failures: 0, limit }
    }

    fn charge(&mut self) -> Result<()> {
        self.failures += 1;
        if self.failures > self.limit {
            return Err(TinError::PartialFailureThreshold {
                failures: self.failures,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Computes `a - b` over the overlap of both hulls, optionally limited to `region`.
///
/// Neither input is modified. Unlocated points keep a difference of zero;
/// more than `drape_failure_limit` of them aborts with
/// [`TinError::PartialFailureThreshold`]. Secondary points and edges that
/// cannot be merged are counted against the same limit.
pub fn delta_between(a: &TinMesh, b: &TinMesh, region: Option<&[Point3]>) -> Result<DeltaSurface> {
    a.require_tin()?;
    b.require_tin()?;
    check_scratch_clear(a)?;
    check_scratch_clear(b)?;

    let tolerances = a.tolerances().tighter(&b.tolerances());
    if a.tolerances() != b.tolerances() {
        info!(
            "surfaces carry different tolerances; using the tighter point tolerance {:e}",
            tolerances.point_point
        );
    }
    let oracle = Oracle::new(a.settings()).with_basis(tolerances);
    let mut common = largest_overlap(&oracle.intersect(&a.hull_polygon()?, &b.hull_polygon()?)?)?;
    if let Some(region) = region {
        let region = clean_polygon(region, tolerances.point_point)?;
        common = largest_overlap(&oracle.intersect(&common, &region)?)?;
    }

    let mut clipped_a = clone_and_clip(a, &common, ClipMode::Internal)?;
    let mut clipped_b = clone_and_clip(b, &common, ClipMode::Internal)?;
    clipped_a.set_tolerances(tolerances);
    clipped_b.set_tolerances(tolerances);

    let swapped = clipped_b.point_count() < clipped_a.point_count();
    let (mut primary, secondary) = if swapped {
        (clipped_b, clipped_a)
    } else {
        (clipped_a, clipped_b)
    };
    info!(
        "delta: primary has {} points, secondary {} (swapped: {swapped})",
        primary.point_count(),
        secondary.point_count()
    );

    let merge_failures = merge_surface(&mut primary, &secondary)?;
    carry_voids(&mut primary, &secondary)?;
    let unlocated = drape_difference(&mut primary, &secondary)?;
    if swapped {
        for p in primary.live_points() {
            let z = primary.point(p).z;
            primary.set_z(p, -z);
        }
    }
    reconcile(&mut primary)?;

    primary.update_bounds();
    primary.touch();
    check_scratch_clear(&primary)?;
    if primary.settings().integrity_checks {
        check_topology(&primary)?;
    }
    Ok(DeltaSurface {
        mesh: primary,
        swapped,
        unlocated,
        merge_failures,
    })
}

/// Subtracts `elevation` from every point, after clipping to `region` when given.
///
/// The work is done on a copy that replaces `mesh` only on success, so a
/// failure leaves `mesh` as it was.
pub fn delta_to_elevation(mesh: &mut TinMesh, elevation: f64, region: Option<&[Point3]>) -> Result<()> {
    let result = clone_and_delta_to_elevation(mesh, elevation, region)?;
    *mesh = result;
    Ok(())
}

/// Like [`delta_to_elevation`], returning a new mesh.
pub fn clone_and_delta_to_elevation(mesh: &TinMesh, elevation: f64, region: Option<&[Point3]>) -> Result<TinMesh> {
    mesh.require_tin()?;
    if !elevation.is_finite() {
        return Err(TinError::invalid("delta elevation must be finite"));
    }
    let mut out = mesh.clone();
    if let Some(region) = region {
        clip_to_polygon(&mut out, region, ClipMode::Internal)?;
    }
    for p in out.live_points() {
        let z = out.point(p).z;
        out.set_z(p, z - elevation);
    }
    out.update_bounds();
    out.touch();
    Ok(out)
}

fn largest_overlap(result: &Intersection) -> Result<Vec<Point3>> {
    if result.classification == Classification::Disjoint {
        return Err(TinError::DisjointGeometry);
    }
    result
        .largest()
        .map(|p| p.points.clone())
        .ok_or_else(|| TinError::corrupt("overlap produced no outline"))
}

/// Inserts the secondary's points, then its edges, into the primary.
/// Returns the number of points and edges that could not be merged.
fn merge_surface(primary: &mut TinMesh, secondary: &TinMesh) -> Result<usize> {
    let mut mapped: HashMap<PointId, PointId> = HashMap::new();
    let mut budget = FailureBudget::new(primary.settings().drape_failure_limit);
    for p in secondary.live_points() {
        let c = secondary.point(p);
        match primary.insert_point(c.x, c.y) {
            Ok(id) => {
                mapped.insert(p, id);
            }
            Err(e) if !e.is_fatal() => {
                warn!("cannot merge point {p} at ({}, {}): {e}", c.x, c.y);
                budget.charge()?;
            }
            Err(e) => return Err(e),
        }
    }
    for p in secondary.live_points() {
        for q in secondary.ring(p) {
            if q <= p {
                continue;
            }
            let (Some(&u), Some(&v)) = (mapped.get(&p), mapped.get(&q)) else {
                continue;
            };
            if u == v || primary.has_link(u, v) {
                continue;
            }
            match primary.insert_line(u, v) {
                Ok(_) => {}
                Err(e) if !e.is_fatal() => {
                    warn!("cannot merge edge {p}-{q}: {e}");
                    budget.charge()?;
                }
                Err(e) => return Err(e),
            }
        }
    }
    debug!("merged {} secondary points, {} failures", mapped.len(), budget.failures);
    Ok(budget.failures)
}

/// Copies the secondary's void, hole and island outlines into the primary.
fn carry_voids(primary: &mut TinMesh, secondary: &TinMesh) -> Result<()> {
    for f in secondary.active_features() {
        let record = secondary.feature(f);
        let feature_type = match record.feature_type {
            t if t.excludes_surface() => FeatureType::Void,
            FeatureType::Island => FeatureType::Island,
            _ => continue,
        };
        if record.first_point.is_none() {
            continue;
        }
        let attributes = record.attributes;
        let coords = secondary.feature_coordinates(f)?;
        let ids = primary.resolve_points(&coords)?;
        if ids.len() < 3 {
            continue;
        }
        let chain = primary.link_ring(&ids)?;
        primary.add_feature(feature_type, attributes, &chain)?;
        debug!("carried {feature_type:?} {f} into the delta surface");
    }
    Ok(())
}

/// Replaces every primary elevation with its difference to the secondary.
fn drape_difference(primary: &mut TinMesh, secondary: &TinMesh) -> Result<usize> {
    let mut budget = FailureBudget::new(primary.settings().drape_failure_limit);
    for p in primary.live_points() {
        let c = primary.point(p);
        match secondary.drape(c.x, c.y)? {
            Some(z) => primary.set_z(p, c.z - z),
            None => {
                warn!("point {p} at ({}, {}) is outside the other surface", c.x, c.y);
                budget.charge()?;
                primary.set_z(p, 0.0);
            }
        }
    }
    Ok(budget.failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TinSettings;

    fn plane(cells: usize, step: f64, settings: TinSettings) -> TinMesh {
        let n = cells + 1;
        let mut points = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let (x, y) = (i as f64 * step, j as f64 * step);
                points.push(Point3::new(x, y, x + y));
            }
        }
        let mut triangles = Vec::new();
        for j in 0..cells {
            for i in 0..cells {
                let a = j * n + i;
                triangles.push([a, a + 1, a + n + 1]);
                triangles.push([a, a + n + 1, a + n]);
            }
        }
        TinMesh::from_triangles(points, &triangles, settings).unwrap()
    }

    #[test]
    fn budget_allows_exactly_the_limit() {
        let mut budget = FailureBudget::new(2);
        assert!(budget.charge().is_ok());
        assert!(budget.charge().is_ok());
        match budget.charge() {
            Err(TinError::PartialFailureThreshold { failures, limit }) => {
                assert_eq!((failures, limit), (3, 2));
            }
            other => panic!("expected threshold error, got {other:?}"),
        }
    }

    #[test]
    fn drape_misses_beyond_limit_abort() {
        // 13 x 13 points, only the 3 x 3 corner lies on the other surface.
        let mut primary = plane(12, 1.0, TinSettings::default());
        let secondary = plane(2, 1.0, TinSettings::default());
        match drape_difference(&mut primary, &secondary) {
            Err(TinError::PartialFailureThreshold { failures, limit }) => {
                assert_eq!(limit, 100);
                assert_eq!(failures, 101);
            }
            other => panic!("expected threshold error, got {other:?}"),
        }
    }

    #[test]
    fn drape_misses_within_limit_are_zeroed_and_counted() {
        let settings = TinSettings {
            drape_failure_limit: 200,
            ..TinSettings::default()
        };
        let mut primary = plane(12, 1.0, settings.clone());
        let secondary = plane(2, 1.0, settings);
        let unlocated = drape_difference(&mut primary, &secondary).unwrap();
        assert_eq!(unlocated, 169 - 9);
        for p in primary.live_points() {
            assert!(primary.point(p).z.abs() < 1e-9);
        }
    }

    #[test]
    fn merge_of_matching_surface_has_no_failures() {
        let mut primary = plane(3, 1.0, TinSettings::default());
        let secondary = plane(2, 1.5, TinSettings::default());
        let failures = merge_surface(&mut primary, &secondary).unwrap();
        assert_eq!(failures, 0);
        // Five secondary points are new; crossing edges add more.
        assert!(primary.point_count() >= 16 + 5);
        crate::check::check_topology(&primary).unwrap();
    }
}
