//! Point and line insertion.
//!
//! Insertions split triangles and edges in place and never flip edges, so
//! the surface keeps its shape. Features running along a split edge are
//! rethreaded through the new point.

use log::trace;

use crate::error::{Result, TinError};
use crate::geometry::{lerp, line_intersection_parameter, orient2d, plane_elevation, projection_parameter, Point3};
use crate::locate::Location;
use crate::store::{FeatureIndex, NodeFlags, PointId, TinMesh};

impl TinMesh {
    /// Inserts a point at (`x`, `y`) with an elevation taken from the surface.
    ///
    /// Returns an existing point when one lies within the point tolerance.
    /// Positions just outside the hull snap onto the nearest hull edge.
    pub fn insert_point(&mut self, x: f64, y: f64) -> Result<PointId> {
        self.require_tin()?;
        match self.locate(x, y)? {
            Location::Point(p) => Ok(p),
            Location::Edge(a, b) => self.split_edge(a, b, x, y),
            Location::Triangle(a, b, c) => self.split_triangle(a, b, c, x, y),
            Location::Outside => Err(TinError::invalid(format!("({x}, {y}) lies outside the hull"))),
        }
    }

    /// Points every membership at `from` whose next point is `old` to `new`,
    /// returning the features touched.
    fn redirect_memberships(&mut self, from: PointId, old: PointId, new: PointId) -> Vec<FeatureIndex> {
        let mut touched = Vec::new();
        let mut cursor = self.nodes[from.0].features;
        while let Some(slot) = cursor {
            let entry = &mut self.feature_list[slot];
            if entry.next_point == Some(old) {
                entry.next_point = Some(new);
                touched.push(entry.feature);
            }
            cursor = entry.next;
        }
        touched
    }

    /// Splits edge `u`-`v` at the projection of (`x`, `y`).
    ///
    /// A chain held in `scratch_a` along the edge is extended through the
    /// new point.
    pub(crate) fn split_edge(&mut self, u: PointId, v: PointId, x: f64, y: f64) -> Result<PointId> {
        let left = self.triangle_apex(u, v)?;
        let right = self.triangle_apex(v, u)?;
        if left.is_none() && right.is_none() {
            return Err(TinError::corrupt(format!("edge {u}-{v} borders no triangle")));
        }
        let (pu, pv) = (self.point(u), self.point(v));
        let t = projection_parameter(&pu, &pv, &Point3::new(x, y, 0.0)).clamp(0.0, 1.0);
        let position = lerp(&pu, &pv, t);
        let n = self.add_point(position)?;
        trace!("split {u}-{v} at {n}");

        self.push_link(n, u)?;
        if let Some(d) = right {
            self.push_link(n, d)?;
        }
        self.push_link(n, v)?;
        if let Some(c) = left {
            self.push_link(n, c)?;
        }
        self.replace_link(u, v, n)?;
        self.replace_link(v, u, n)?;
        if let Some(c) = left {
            self.insert_link_after(c, u, n)?;
        }
        if let Some(d) = right {
            self.insert_link_after(d, v, n)?;
        }

        if left.is_none() && self.hull_next(v) == Some(u) {
            self.node_mut(v).hull_next = Some(n);
            self.node_mut(n).hull_next = Some(u);
        } else if right.is_none() && self.hull_next(u) == Some(v) {
            self.node_mut(u).hull_next = Some(n);
            self.node_mut(n).hull_next = Some(v);
        }

        if self.nodes[u.0].scratch_a == Some(v) {
            self.node_mut(u).scratch_a = Some(n);
            self.node_mut(n).scratch_a = Some(v);
        } else if self.nodes[v.0].scratch_a == Some(u) {
            self.node_mut(v).scratch_a = Some(n);
            self.node_mut(n).scratch_a = Some(u);
        }

        for feature in self.redirect_memberships(u, v, n) {
            self.add_membership(n, feature, Some(v))?;
        }
        for feature in self.redirect_memberships(v, u, n) {
            self.add_membership(n, feature, Some(u))?;
        }

        let void = self.is_void(u) && self.is_void(v);
        self.node_mut(n).flags.set(NodeFlags::VOID, void);
        Ok(n)
    }

    /// Splits anticlockwise triangle `a`, `b`, `c` at (`x`, `y`).
    pub(crate) fn split_triangle(&mut self, a: PointId, b: PointId, c: PointId, x: f64, y: f64) -> Result<PointId> {
        let (pa, pb, pc) = (self.point(a), self.point(b), self.point(c));
        let z = plane_elevation(&pa, &pb, &pc, x, y).unwrap_or((pa.z + pb.z + pc.z) / 3.0);
        let n = self.add_point(Point3::new(x, y, z))?;
        trace!("split triangle {a} {b} {c} at {n}");
        self.push_link(n, a)?;
        self.push_link(n, b)?;
        self.push_link(n, c)?;
        self.insert_link_after(a, b, n)?;
        self.insert_link_after(b, c, n)?;
        self.insert_link_after(c, a, n)?;
        let void = self.is_void(a) && self.is_void(b) && self.is_void(c);
        self.node_mut(n).flags.set(NodeFlags::VOID, void);
        Ok(n)
    }

    /// Forces a chain of mesh edges from `a` to `b` and returns it.
    ///
    /// Neighbours lying on the segment are reused; crossed edges are split at
    /// the crossing, snapping onto an edge end within the point tolerance.
    pub fn insert_line(&mut self, a: PointId, b: PointId) -> Result<Vec<PointId>> {
        let mut chain = vec![a];
        let mut cur = a;
        let limit = 4 * self.point_slots() + 64;
        for _ in 0..limit {
            if cur == b {
                return Ok(chain);
            }
            if self.has_link(cur, b) {
                chain.push(b);
                return Ok(chain);
            }
            let next = self.next_line_step(cur, b)?;
            if chain.contains(&next) {
                return Err(TinError::corrupt(format!("line {a}-{b} revisits {next}")));
            }
            chain.push(next);
            cur = next;
        }
        Err(TinError::corrupt(format!("line {a}-{b} did not reach its end")))
    }

    fn next_line_step(&mut self, cur: PointId, b: PointId) -> Result<PointId> {
        let tol = self.tolerances;
        let (pc, pb) = (self.point(cur), self.point(b));
        let length = pc.distance_xy(&pb);
        let ring = self.ring(cur);

        let mut ahead: Option<(f64, PointId)> = None;
        for &n in &ring {
            let pn = self.point(n);
            let along = projection_parameter(&pc, &pb, &pn) * length;
            let offset = orient2d(&pc, &pb, &pn).abs() / length;
            if along > tol.point_point && along < length + tol.point_point && offset <= tol.point_line {
                if ahead.map_or(true, |(t, _)| along < t) {
                    ahead = Some((along, n));
                }
            }
        }
        if let Some((_, n)) = ahead {
            return Ok(n);
        }

        for (i, &n1) in ring.iter().enumerate() {
            let n2 = ring[(i + 1) % ring.len()];
            if ring.len() < 2 || self.is_hull_gap(cur, n1, n2) {
                continue;
            }
            let (p1, p2) = (self.point(n1), self.point(n2));
            if orient2d(&pc, &p1, &pb) > 0.0 && orient2d(&pc, &p2, &pb) < 0.0 {
                let s = line_intersection_parameter(&pc, &pb, &p1, &p2)
                    .ok_or_else(|| TinError::corrupt("crossed edge is parallel to the line"))?
                    .clamp(0.0, 1.0);
                let crossing = lerp(&p1, &p2, s);
                if crossing.distance_xy(&p1) <= tol.point_point {
                    return Ok(n1);
                }
                if crossing.distance_xy(&p2) <= tol.point_point {
                    return Ok(n2);
                }
                return self.split_edge(n1, n2, crossing.x, crossing.y);
            }
        }
        Err(TinError::invalid(format!(
            "line from {cur} towards {b} leaves the triangulated area"
        )))
    }

    /// Resolves coordinates to mesh points, reusing points within the point
    /// tolerance and inserting the rest. Repeats and a closing point are dropped.
    pub(crate) fn resolve_points(&mut self, coords: &[Point3]) -> Result<Vec<PointId>> {
        let tol = self.tolerances.point_point;
        let mut ids: Vec<PointId> = Vec::with_capacity(coords.len());
        for c in coords {
            let existing = self
                .closest_point(c.x, c.y)
                .filter(|&p| self.point(p).distance_xy(c) <= tol);
            let id = match existing {
                Some(p) => p,
                None => self.insert_point(c.x, c.y)?,
            };
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        while ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        Ok(ids)
    }

    /// Links a ring of points with line insertion; the returned chain is
    /// closed (its last point repeats the first).
    pub(crate) fn link_ring(&mut self, ids: &[PointId]) -> Result<Vec<PointId>> {
        if ids.len() < 3 {
            return Err(TinError::invalid("ring needs at least three distinct points"));
        }
        let mut chain: Vec<PointId> = Vec::new();
        for i in 0..ids.len() {
            let segment = self.insert_line(ids[i], ids[(i + 1) % ids.len()])?;
            let skip = usize::from(!chain.is_empty());
            chain.extend(segment.into_iter().skip(skip));
        }
        Ok(chain)
    }
}
