//! Exact polygon booleans computed on a disposable triangulation.
//!
//! Both operands are triangulated together, their edges forced into the
//! scratch mesh as tagged breaklines (operand A carries user tag 1, operand B
//! tag 2), so every crossing becomes a mesh point shared by both features.
//! Triangles are then classified by parity flooding across tagged edges and
//! the requested region is read back as boundary loops. The scratch mesh
//! lives only for the duration of one call.

use log::trace;
use std::collections::HashMap;

use crate::error::{Result, TinError};
use crate::geometry::{polygon_perimeter, signed_area, signed_distance_to_line, Bounds3, Point3};
use crate::precision::{machine_precision, Tolerances};
use crate::region::{canonical, trace_loops, TriangleKey};
use crate::settings::TinSettings;
use crate::store::{FeatureAttributes, FeatureType, PointId, TinMesh};
use crate::triangulate::triangulate_with_map;

/// Which input a result loop came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    A,
    B,
}

impl Operand {
    /// User tag carried by the operand's edges in the scratch mesh.
    pub fn tag(self) -> i64 {
        match self {
            Operand::A => 1,
            Operand::B => 2,
        }
    }
}

/// A transient result polygon: an open anticlockwise ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point3>,
    pub area: f64,
    pub operand: Operand,
    /// The loop bounded a hole of the result region.
    pub hole: bool,
}

impl Polygon {
    /// Ring with the first point repeated at the end.
    pub fn closed_points(&self) -> Vec<Point3> {
        let mut out = self.points.clone();
        if let Some(&first) = self.points.first() {
            out.push(first);
        }
        out
    }

    pub fn perimeter(&self) -> f64 {
        polygon_perimeter(&self.points)
    }
}

/// Spatial relation of two polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Disjoint,
    /// Partial overlap producing this many result polygons.
    Overlapping(usize),
    AInsideB,
    BInsideA,
    Coincident,
}

/// Result of one oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub classification: Classification,
    pub polygons: Vec<Polygon>,
    /// Points where the two boundaries meet.
    pub crossings: usize,
}

impl Intersection {
    /// Result polygon with the largest area; the first one wins ties.
    pub fn largest(&self) -> Option<&Polygon> {
        self.polygons
            .iter()
            .filter(|p| !p.hole)
            .fold(None, |best: Option<&Polygon>, p| match best {
                Some(b) if b.area >= p.area => Some(b),
                _ => Some(p),
            })
    }

    /// Outer loops only.
    pub fn outer(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.iter().filter(|p| !p.hole)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Intersect,
    Exclusive,
    Union,
}

/// Polygon boolean engine.
#[derive(Debug, Clone)]
pub struct Oracle {
    settings: TinSettings,
    factor: f64,
    machine: Option<f64>,
}

impl Oracle {
    pub fn new(settings: &TinSettings) -> Self {
        Self {
            settings: settings.clone(),
            factor: settings.point_tolerance_factor,
            machine: None,
        }
    }

    /// Multiplier applied to machine precision for merges.
    pub fn with_tolerance_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Reuses the machine precision of an existing mesh instead of deriving
    /// one from the operands, so repeated calls on one data set agree.
    pub fn with_basis(mut self, tolerances: Tolerances) -> Self {
        self.machine = Some(tolerances.machine);
        self
    }

    /// Region covered by both polygons.
    pub fn intersect(&self, a: &[Point3], b: &[Point3]) -> Result<Intersection> {
        self.run(a, b, Mode::Intersect)
    }

    /// Region of `a` outside `b`. Outer loops carry operand A, holes operand B.
    pub fn exclusive(&self, a: &[Point3], b: &[Point3]) -> Result<Intersection> {
        self.run(a, b, Mode::Exclusive)
    }

    /// Region covered by either polygon.
    pub fn union(&self, a: &[Point3], b: &[Point3]) -> Result<Intersection> {
        self.run(a, b, Mode::Union)
    }

    fn tolerances(&self, a: &[Point3], b: &[Point3]) -> Tolerances {
        let machine = self.machine.unwrap_or_else(|| {
            let bounds = Bounds3::from_points(a.iter().chain(b.iter()));
            machine_precision(
                bounds.largest_coordinate(),
                self.settings.machine_precision_iterations,
            )
        });
        Tolerances::from_machine(machine, self.factor)
    }

    fn run(&self, a: &[Point3], b: &[Point3], mode: Mode) -> Result<Intersection> {
        let tolerances = self.tolerances(a, b);
        let a = clean_polygon(a, tolerances.point_point)?;
        let b = clean_polygon(b, tolerances.point_point)?;

        let mut settings = self.settings.clone();
        settings.point_tolerance_factor = self.factor;
        settings.integrity_checks = false;
        let mut all = a.clone();
        all.extend_from_slice(&b);
        let (mut scratch, map) = triangulate_with_map(&all, &settings).map_err(|e| match e {
            TinError::Validation(msg) => TinError::corrupt(format!("scratch triangulation failed: {msg}")),
            other => other,
        })?;
        scratch.tolerances = tolerances;

        let ids_a: Vec<PointId> = map[..a.len()].to_vec();
        let ids_b: Vec<PointId> = map[a.len()..].to_vec();
        thread_operand(&mut scratch, &ids_a, Operand::A)?;
        thread_operand(&mut scratch, &ids_b, Operand::B)?;

        let overlay = Overlay::classify(&scratch)?;
        let classification = overlay.classification();
        let loops = match mode {
            Mode::Intersect => trace_loops(&scratch, |t| overlay.get(t) == (true, true))?,
            Mode::Exclusive => trace_loops(&scratch, |t| overlay.get(t) == (true, false))?,
            Mode::Union => trace_loops(&scratch, |t| {
                let (ia, ib) = overlay.get(t);
                ia || ib
            })?,
        };
        let mut polygons = Vec::with_capacity(loops.len());
        for ring in loops {
            if let Some(polygon) = overlay.polygon(&scratch, &ring, mode)? {
                polygons.push(polygon);
            }
        }
        let classification = match (mode, classification) {
            (Mode::Intersect, Classification::Overlapping(_)) => {
                Classification::Overlapping(polygons.len())
            }
            (_, c) => c,
        };
        trace!(
            "oracle {:?}: {:?} with {} polygons",
            mode,
            classification,
            polygons.len()
        );
        Ok(Intersection {
            classification,
            polygons,
            crossings: overlay.crossings,
        })
    }
}

/// Removes repeated and closing points; rejects rings without area.
pub fn clean_polygon(points: &[Point3], tolerance: f64) -> Result<Vec<Point3>> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(TinError::invalid("polygon has non-finite coordinates"));
    }
    let mut ring: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points {
        if ring.last().map_or(true, |q: &Point3| q.distance_xy(p) > tolerance) {
            ring.push(*p);
        }
    }
    while ring.len() > 1 && ring[0].distance_xy(&ring[ring.len() - 1]) <= tolerance {
        ring.pop();
    }
    if ring.len() < 3 {
        return Err(TinError::invalid("polygon needs at least three distinct points"));
    }
    if signed_area(&ring).abs() <= tolerance * polygon_perimeter(&ring) {
        return Err(TinError::invalid("polygon has no area"));
    }
    Ok(ring)
}

/// Threads a closed operand ring through the scratch mesh as a tagged breakline.
fn thread_operand(scratch: &mut TinMesh, ids: &[PointId], operand: Operand) -> Result<()> {
    let mut chain: Vec<PointId> = Vec::new();
    for i in 0..ids.len() {
        let (from, to) = (ids[i], ids[(i + 1) % ids.len()]);
        if from == to {
            continue;
        }
        let segment = scratch.insert_line(from, to)?;
        let skip = usize::from(!chain.is_empty());
        chain.extend(segment.into_iter().skip(skip));
    }
    if chain.len() < 4 || chain.first() != chain.last() {
        return Err(TinError::invalid("polygon collapses at the working tolerance"));
    }
    let attributes = FeatureAttributes {
        user_tag: Some(operand.tag()),
        feature_id: None,
    };
    scratch.add_feature(FeatureType::Breakline, attributes, &chain)?;
    Ok(())
}

/// Inside/outside state of every scratch triangle for both operands.
struct Overlay {
    state: HashMap<TriangleKey, (bool, bool)>,
    crossings: usize,
}

impl Overlay {
    fn edge_tags(scratch: &TinMesh, p: PointId, q: PointId) -> (bool, bool) {
        let tagged = |tag: i64| scratch.is_feature_edge(p, q, |r| r.attributes.user_tag == Some(tag));
        (tagged(Operand::A.tag()), tagged(Operand::B.tag()))
    }

    fn classify(scratch: &TinMesh) -> Result<Overlay> {
        let start = scratch
            .hull_start()
            .ok_or_else(|| TinError::corrupt("scratch mesh has no hull"))?;
        let next = scratch
            .hull_next(start)
            .ok_or_else(|| TinError::corrupt("scratch hull is broken"))?;
        let apex = scratch
            .triangle_apex(start, next)?
            .ok_or_else(|| TinError::corrupt("hull edge borders no triangle"))?;
        let seed = canonical([start, next, apex]);
        let seed_state = Self::edge_tags(scratch, start, next);

        let mut state: HashMap<TriangleKey, (bool, bool)> = HashMap::new();
        let mut stack = vec![(seed, seed_state)];
        while let Some((t, s)) = stack.pop() {
            if let Some(&existing) = state.get(&t) {
                if existing != s {
                    return Err(TinError::corrupt("operand boundaries do not close"));
                }
                continue;
            }
            state.insert(t, s);
            for i in 0..3 {
                let (a, b) = (t[i], t[(i + 1) % 3]);
                if let Some(c) = scratch.triangle_apex(b, a)? {
                    let (ta, tb) = Self::edge_tags(scratch, a, b);
                    stack.push((canonical([b, a, c]), (s.0 ^ ta, s.1 ^ tb)));
                }
            }
        }

        let crossings = scratch
            .live_points()
            .into_iter()
            .filter(|&p| {
                let tags: Vec<Option<i64>> = scratch
                    .features_at(p)
                    .into_iter()
                    .map(|(f, _)| scratch.feature(f).attributes.user_tag)
                    .collect();
                tags.contains(&Some(Operand::A.tag())) && tags.contains(&Some(Operand::B.tag()))
            })
            .count();
        Ok(Overlay { state, crossings })
    }

    fn get(&self, t: &TriangleKey) -> (bool, bool) {
        self.state.get(t).copied().unwrap_or((false, false))
    }

    fn classification(&self) -> Classification {
        let mut in_a = 0;
        let mut in_b = 0;
        let mut both = 0;
        for &(a, b) in self.state.values() {
            in_a += usize::from(a);
            in_b += usize::from(b);
            both += usize::from(a && b);
        }
        if both == 0 {
            Classification::Disjoint
        } else if both == in_a && both == in_b {
            Classification::Coincident
        } else if both == in_a {
            Classification::AInsideB
        } else if both == in_b {
            Classification::BInsideA
        } else {
            Classification::Overlapping(0)
        }
    }

    /// Converts a traced loop to a polygon, dropping points that lie on the
    /// straight line through their neighbours.
    fn polygon(&self, scratch: &TinMesh, ring: &[PointId], mode: Mode) -> Result<Option<Polygon>> {
        let tol = scratch.tolerances().point_line;
        let mut only_a = 0usize;
        let mut only_b = 0usize;
        for i in 0..ring.len() {
            match Self::edge_tags(scratch, ring[i], ring[(i + 1) % ring.len()]) {
                (true, false) => only_a += 1,
                (false, true) => only_b += 1,
                _ => {}
            }
        }
        let mut points: Vec<Point3> = ring.iter().map(|&p| scratch.point(p)).collect();
        let mut i = 0;
        while points.len() > 3 && i < points.len() {
            let n = points.len();
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            if signed_distance_to_line(&prev, &next, &points[i]).abs() <= tol {
                points.remove(i);
            } else {
                i += 1;
            }
        }
        let area = signed_area(&points);
        if area == 0.0 {
            return Ok(None);
        }
        let hole = area < 0.0;
        if hole {
            points.reverse();
        }
        let operand = match mode {
            Mode::Exclusive if hole => Operand::B,
            Mode::Exclusive => Operand::A,
            _ if only_b > only_a => Operand::B,
            _ => Operand::A,
        };
        Ok(Some(Polygon {
            points,
            area: area.abs(),
            operand,
            hole,
        }))
    }
}
