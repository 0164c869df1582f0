//! Point location: nearest point search, triangle walk and draping.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TinError};
use crate::geometry::{distance_to_segment, lerp, plane_elevation, projection_parameter, signed_distance_to_line, Point3};
use crate::store::{PartitionedVec, PointId, TinMesh};

/// Points sorted by x, plus a tail of points added since the last sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndex {
    sorted: Vec<PointId>,
    pending: Vec<PointId>,
}

impl SpatialIndex {
    pub fn insert(&mut self, id: PointId) {
        self.pending.push(id);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Folds the pending tail into the sorted run.
    pub fn resort(&mut self, points: &PartitionedVec<Point3>) {
        self.sorted.append(&mut self.pending);
        self.sorted.sort_by(|a, b| {
            let (pa, pb) = (&points[a.0], &points[b.0]);
            pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y)).then(a.cmp(b))
        });
    }

    /// Closest point to (`x`, `y`) accepted by `alive`; ties go to the lower id.
    pub fn nearest(
        &self,
        points: &PartitionedVec<Point3>,
        x: f64,
        y: f64,
        alive: impl Fn(PointId) -> bool,
    ) -> Option<PointId> {
        let target = Point3::new(x, y, 0.0);
        let mut best: Option<(f64, PointId)> = None;
        let consider = |id: PointId, best: &mut Option<(f64, PointId)>| {
            if !alive(id) {
                return;
            }
            let d = points[id.0].distance_xy(&target);
            let better = match best {
                None => true,
                Some((bd, bid)) => d < *bd || (d == *bd && id < *bid),
            };
            if better {
                *best = Some((d, id));
            }
        };
        let start = self.sorted.partition_point(|id| points[id.0].x < x);
        for &id in &self.sorted[start..] {
            if let Some((bd, _)) = best {
                if points[id.0].x - x > bd {
                    break;
                }
            }
            consider(id, &mut best);
        }
        for &id in self.sorted[..start].iter().rev() {
            if let Some((bd, _)) = best {
                if x - points[id.0].x > bd {
                    break;
                }
            }
            consider(id, &mut best);
        }
        for &id in &self.pending {
            consider(id, &mut best);
        }
        best.map(|(_, id)| id)
    }
}

/// Where a planimetric position falls on a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Coincides with a mesh point.
    Point(PointId),
    /// Lies on the edge between two points.
    Edge(PointId, PointId),
    /// Strictly inside an anticlockwise triangle.
    Triangle(PointId, PointId, PointId),
    /// Outside the hull.
    Outside,
}

enum Step {
    Found(Location),
    Cross(PointId, PointId),
    Stuck,
}

impl TinMesh {
    /// Live point nearest to (`x`, `y`).
    pub fn closest_point(&self, x: f64, y: f64) -> Option<PointId> {
        self.index
            .nearest(&self.points, x, y, |id| !self.is_deleted(id))
    }

    /// Points added since the spatial index was last sorted.
    pub fn unsorted_points(&self) -> usize {
        self.index.pending_len()
    }

    fn first_triangle_at(&self, p: PointId) -> Result<[PointId; 3]> {
        let ring = self.ring(p);
        for (i, &a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            if ring.len() > 1 && !self.is_hull_gap(p, a, b) {
                return Ok([p, a, b]);
            }
        }
        Err(TinError::corrupt(format!("{p} is not part of any triangle")))
    }

    fn classify(&self, t: [PointId; 3], target: &Point3) -> Result<Step> {
        let tol = self.tolerances;
        let pts = [self.point(t[0]), self.point(t[1]), self.point(t[2])];
        for (i, q) in pts.iter().enumerate() {
            if q.distance_xy(target) <= tol.point_point {
                return Ok(Step::Found(Location::Point(t[i])));
            }
        }
        let d = [
            signed_distance_to_line(&pts[0], &pts[1], target),
            signed_distance_to_line(&pts[1], &pts[2], target),
            signed_distance_to_line(&pts[2], &pts[0], target),
        ];
        if d.iter().all(|&v| v >= -tol.point_line) {
            for i in 0..3 {
                if d[i] <= tol.point_line {
                    return Ok(Step::Found(Location::Edge(t[i], t[(i + 1) % 3])));
                }
            }
            return Ok(Step::Found(Location::Triangle(t[0], t[1], t[2])));
        }
        let mut order: Vec<usize> = (0..3).filter(|&i| d[i] < -tol.point_line).collect();
        order.sort_by(|&a, &b| d[a].total_cmp(&d[b]));
        for i in order {
            let (u, v) = (t[i], t[(i + 1) % 3]);
            if self.triangle_apex(v, u)?.is_some() {
                return Ok(Step::Cross(u, v));
            }
        }
        Ok(Step::Stuck)
    }

    /// Locates (`x`, `y`) by walking across triangles from the nearest point.
    ///
    /// Falls back to scanning every triangle when the walk does not settle or
    /// runs into a concave stretch of hull.
    pub fn locate(&self, x: f64, y: f64) -> Result<Location> {
        let target = Point3::new(x, y, 0.0);
        let start = self
            .closest_point(x, y)
            .ok_or_else(|| TinError::invalid("mesh has no points"))?;
        if self.point(start).distance_xy(&target) <= self.tolerances.point_point {
            return Ok(Location::Point(start));
        }
        let mut tri = self.first_triangle_at(start)?;
        let limit = 2 * self.point_slots() + 16;
        for _ in 0..limit {
            match self.classify(tri, &target)? {
                Step::Found(loc) => return Ok(loc),
                Step::Cross(u, v) => {
                    if let Some(w) = self.triangle_apex(v, u)? {
                        tri = [v, u, w];
                    }
                }
                Step::Stuck => break,
            }
        }
        for t in self.triangles() {
            if let Step::Found(loc) = self.classify(t, &target)? {
                return Ok(loc);
            }
        }
        self.nearest_hull_location(&target)
    }

    /// Snaps a position just outside the hull onto the nearest hull edge.
    fn nearest_hull_location(&self, target: &Point3) -> Result<Location> {
        let Some((a, b, d)) = self.nearest_hull_edge(target)? else {
            return Ok(Location::Outside);
        };
        if d > self.tolerances.point_line {
            return Ok(Location::Outside);
        }
        let (pa, pb) = (self.point(a), self.point(b));
        if pa.distance_xy(target) <= self.tolerances.point_point {
            return Ok(Location::Point(a));
        }
        if pb.distance_xy(target) <= self.tolerances.point_point {
            return Ok(Location::Point(b));
        }
        Ok(Location::Edge(a, b))
    }

    /// Hull edge `a -> b` closest to `target`, with its distance.
    pub fn nearest_hull_edge(&self, target: &Point3) -> Result<Option<(PointId, PointId, f64)>> {
        let mut best: Option<(PointId, PointId, f64)> = None;
        let Some(_) = self.hull_start else {
            return Ok(None);
        };
        for a in self.hull_points()? {
            let Some(b) = self.hull_next(a) else { continue };
            let d = distance_to_segment(&self.point(a), &self.point(b), target);
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((a, b, d));
            }
        }
        Ok(best)
    }

    /// Elevation of the surface at a located position.
    pub fn elevation_at_location(&self, location: Location, x: f64, y: f64) -> Option<f64> {
        match location {
            Location::Point(p) => Some(self.point(p).z),
            Location::Edge(a, b) => {
                let (pa, pb) = (self.point(a), self.point(b));
                let t = projection_parameter(&pa, &pb, &Point3::new(x, y, 0.0)).clamp(0.0, 1.0);
                Some(lerp(&pa, &pb, t).z)
            }
            Location::Triangle(a, b, c) => {
                plane_elevation(&self.point(a), &self.point(b), &self.point(c), x, y)
            }
            Location::Outside => None,
        }
    }

    /// Surface elevation at (`x`, `y`), or `None` outside the hull.
    pub fn drape(&self, x: f64, y: f64) -> Result<Option<f64>> {
        let location = self.locate(x, y)?;
        Ok(self.elevation_at_location(location, x, y))
    }
}
