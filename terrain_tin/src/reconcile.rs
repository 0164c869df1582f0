//! Post-edit reconciliation of void, island and hole features.
//!
//! Rules are applied in passes until nothing changes:
//! voids that share an edge or overlap are merged through the oracle's
//! union; islands no void encloses become breaklines; islands enclosed only
//! by voids carrying their own feature id are dropped. Void-interior marks
//! are then recomputed by flooding inside every void and hole and clearing
//! the islands again. Hull runs still flagged void from an earlier edit but
//! covered by no feature get a synthesized void first. Each surviving island
//! finally records the void that hosts it in `internal_to`.

use log::{debug, warn};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::check::{check_scratch_clear, check_topology};
use crate::error::Result;
use crate::geometry::{Bounds3, Point3};
use crate::oracle::{Classification, Oracle};
use crate::region::{anticlockwise_ring, open_ring, points_inside, triangles_inside, TriangleKey};
use crate::store::{FeatureAttributes, FeatureIndex, FeatureType, NodeFlags, PointId, TinMesh};

/// Reconciles polygonal features of `mesh` after an edit.
pub fn reconcile(mesh: &mut TinMesh) -> Result<()> {
    check_scratch_clear(mesh)?;
    synthesize_orphan_voids(mesh)?;
    let limit = mesh.feature_slots() + 8;
    for _ in 0..limit {
        let mut changed = merge_adjoining_voids(mesh)?;
        refresh_void_marks(mesh)?;
        changed |= demote_orphan_islands(mesh)?;
        changed |= remove_self_nested_islands(mesh)?;
        if !changed {
            break;
        }
    }
    refresh_void_marks(mesh)?;
    record_island_hosts(mesh)?;
    check_scratch_clear(mesh)?;
    if mesh.settings.integrity_checks {
        check_topology(mesh)?;
    }
    Ok(())
}

fn threaded(mesh: &TinMesh, types: &[FeatureType]) -> Vec<FeatureIndex> {
    mesh.active_features()
        .into_iter()
        .filter(|&f| {
            let r = mesh.feature(f);
            r.first_point.is_some() && types.contains(&r.feature_type)
        })
        .collect()
}

/// Threaded features whose interior is cut out of the surface.
fn exclusions(mesh: &TinMesh) -> Vec<FeatureIndex> {
    mesh.active_features()
        .into_iter()
        .filter(|&f| {
            let r = mesh.feature(f);
            r.first_point.is_some() && r.feature_type.excludes_surface()
        })
        .collect()
}

/// Points every island at the lowest-indexed void or hole enclosing it.
fn record_island_hosts(mesh: &mut TinMesh) -> Result<()> {
    for island in threaded(mesh, &[FeatureType::Island]) {
        let host = enclosing_voids(mesh, island)?.and_then(|voids| voids.first().copied());
        mesh.feature_mut(island).internal_to = host;
    }
    Ok(())
}

/// Recomputes the void-interior bit from the current features.
pub fn refresh_void_marks(mesh: &mut TinMesh) -> Result<()> {
    mesh.clear_flag(NodeFlags::VOID);
    for f in exclusions(mesh) {
        let chain = mesh.feature_points(f)?;
        for p in points_inside(mesh, &chain)? {
            mesh.node_mut(p).flags.insert(NodeFlags::VOID);
        }
    }
    for f in threaded(mesh, &[FeatureType::Island]) {
        let chain = mesh.feature_points(f)?;
        for p in points_inside(mesh, &chain)?.into_iter().chain(chain) {
            mesh.node_mut(p).flags.remove(NodeFlags::VOID);
        }
    }
    Ok(())
}

fn edge_set(chain: &[PointId]) -> HashSet<(PointId, PointId)> {
    chain
        .windows(2)
        .map(|w| (w[0].min(w[1]), w[0].max(w[1])))
        .collect()
}

fn bounds_overlap(a: &Bounds3, b: &Bounds3) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}

/// Merges the first pair of voids that share an edge or overlap, repeatedly.
fn merge_adjoining_voids(mesh: &mut TinMesh) -> Result<bool> {
    let mut merged_any = false;
    let oracle = Oracle::new(&mesh.settings).with_basis(mesh.tolerances);
    loop {
        let voids = threaded(mesh, &[FeatureType::Void]);
        let mut chains = Vec::with_capacity(voids.len());
        for &v in &voids {
            let coords = mesh.feature_coordinates(v)?;
            chains.push((mesh.feature_points(v)?, Bounds3::from_points(coords.iter()), coords));
        }
        let mut pair = None;
        'search: for i in 0..voids.len() {
            for j in (i + 1)..voids.len() {
                if !bounds_overlap(&chains[i].1, &chains[j].1) {
                    continue;
                }
                let shares_edge = !edge_set(&chains[i].0).is_disjoint(&edge_set(&chains[j].0));
                let overlaps = shares_edge
                    || oracle.intersect(&chains[i].2, &chains[j].2)?.classification
                        != Classification::Disjoint;
                if overlaps {
                    pair = Some((i, j));
                    break 'search;
                }
            }
        }
        let Some((i, j)) = pair else {
            return Ok(merged_any);
        };
        let union = oracle.union(&chains[i].2, &chains[j].2)?;
        let attributes = mesh.feature(voids[i]).attributes;
        debug!("merging voids {} and {}", voids[i], voids[j]);
        mesh.remove_feature(voids[i])?;
        mesh.remove_feature(voids[j])?;
        for polygon in &union.polygons {
            let feature_type = if polygon.hole {
                FeatureType::Island
            } else {
                FeatureType::Void
            };
            add_polygon(mesh, feature_type, attributes, &polygon.points)?;
        }
        merged_any = true;
    }
}

fn add_polygon(
    mesh: &mut TinMesh,
    feature_type: FeatureType,
    attributes: FeatureAttributes,
    coords: &[Point3],
) -> Result<Option<FeatureIndex>> {
    let ids = mesh.resolve_points(coords)?;
    if ids.len() < 3 {
        return Ok(None);
    }
    let chain = mesh.link_ring(&ids)?;
    Ok(Some(mesh.add_feature(feature_type, attributes, &chain)?))
}

/// Voids whose boundaries are reached by flooding outward from an island,
/// or `None` when the flood escapes to an open stretch of hull.
fn enclosing_voids(mesh: &TinMesh, island: FeatureIndex) -> Result<Option<BTreeSet<FeatureIndex>>> {
    let mut barrier: HashMap<PointId, Vec<FeatureIndex>> = HashMap::new();
    for v in exclusions(mesh) {
        for p in open_ring(&mesh.feature_points(v)?) {
            barrier.entry(p).or_default().push(v);
        }
    }
    let ring = anticlockwise_ring(mesh, &mesh.feature_points(island)?);
    let own: HashSet<PointId> = ring.iter().copied().collect();
    let mut touched = BTreeSet::new();
    let mut queue = VecDeque::new();
    let n = ring.len();
    for i in 0..n {
        let (s, next, prev) = (ring[i], ring[(i + 1) % n], ring[(i + n - 1) % n]);
        match barrier.get(&s) {
            Some(vs) => touched.extend(vs.iter().copied()),
            None if mesh.is_hull_point(s) => return Ok(None),
            None => {}
        }
        let mut c = mesh.next_clockwise(s, next)?;
        let mut steps = 0;
        while c != prev && steps <= mesh.point_slots() {
            if !own.contains(&c) {
                queue.push_back(c);
            }
            c = mesh.next_clockwise(s, c)?;
            steps += 1;
        }
    }
    let mut seen: HashSet<PointId> = HashSet::new();
    while let Some(p) = queue.pop_front() {
        if !seen.insert(p) {
            continue;
        }
        if let Some(vs) = barrier.get(&p) {
            touched.extend(vs.iter().copied());
            continue;
        }
        if mesh.is_hull_point(p) {
            return Ok(None);
        }
        for q in mesh.ring(p) {
            if !own.contains(&q) && !seen.contains(&q) {
                queue.push_back(q);
            }
        }
    }
    Ok(Some(touched))
}

fn demote_orphan_islands(mesh: &mut TinMesh) -> Result<bool> {
    let mut changed = false;
    for island in threaded(mesh, &[FeatureType::Island]) {
        if enclosing_voids(mesh, island)?.is_none() {
            debug!("island {island} lies in no void; demoting to breakline");
            let record = mesh.feature_mut(island);
            record.feature_type = FeatureType::Breakline;
            record.internal_to = None;
            changed = true;
        }
    }
    Ok(changed)
}

fn remove_self_nested_islands(mesh: &mut TinMesh) -> Result<bool> {
    let mut changed = false;
    for island in threaded(mesh, &[FeatureType::Island]) {
        let Some(own_id) = mesh.feature(island).attributes.feature_id else {
            continue;
        };
        let Some(voids) = enclosing_voids(mesh, island)? else {
            continue;
        };
        let nested = !voids.is_empty()
            && voids
                .iter()
                .all(|&v| mesh.feature(v).attributes.feature_id == Some(own_id));
        if nested {
            debug!("island {island} is nested in its own void; removing");
            mesh.remove_feature(island)?;
            changed = true;
        }
    }
    Ok(changed)
}

/// Turns runs of hull points still flagged void, but bounded by no void or
/// hole feature, into void features closed by a chord back along the run.
fn synthesize_orphan_voids(mesh: &mut TinMesh) -> Result<()> {
    let mut covered: HashSet<PointId> = HashSet::new();
    for v in exclusions(mesh) {
        covered.extend(mesh.feature_points(v)?);
    }
    let hull = mesh.hull_points()?;
    if hull.is_empty() {
        return Ok(());
    }
    let orphan: Vec<bool> = hull
        .iter()
        .map(|&p| mesh.is_void(p) && !covered.contains(&p))
        .collect();
    if orphan.iter().all(|&o| o) {
        let mut chain = hull.clone();
        chain.push(hull[0]);
        debug!("whole hull is void; synthesizing a void along it");
        mesh.add_feature(FeatureType::Void, FeatureAttributes::default(), &chain)?;
        return Ok(());
    }
    let Some(start) = orphan.iter().position(|&o| !o) else {
        return Ok(());
    };
    let n = hull.len();
    let mut runs: Vec<Vec<PointId>> = Vec::new();
    let mut run: Vec<PointId> = Vec::new();
    for k in 1..=n {
        let i = (start + k) % n;
        if orphan[i] {
            run.push(hull[i]);
        } else if !run.is_empty() {
            runs.push(std::mem::take(&mut run));
        }
    }
    for run in runs {
        if run.len() < 3 {
            continue;
        }
        let (first, last) = (run[0], run[run.len() - 1]);
        let chord = match mesh.insert_line(last, first) {
            Ok(chord) => chord,
            Err(e) if !e.is_fatal() => {
                warn!("cannot close orphan void run from {first} to {last}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        let mut chain = run.clone();
        chain.extend(chord.into_iter().skip(1));
        if mesh.chain_signed_area(&chain) <= 0.0 {
            continue;
        }
        debug!("synthesizing void along {} orphan hull points", run.len());
        mesh.add_feature(FeatureType::Void, FeatureAttributes::default(), &chain)?;
    }
    Ok(())
}

/// Triangles excluded from the surface: inside a void or hole and not inside an island.
pub(crate) fn void_triangles(mesh: &TinMesh) -> Result<HashSet<TriangleKey>> {
    let mut out = HashSet::new();
    for f in exclusions(mesh) {
        out.extend(triangles_inside(mesh, &mesh.feature_points(f)?)?);
    }
    for f in threaded(mesh, &[FeatureType::Island]) {
        for t in triangles_inside(mesh, &mesh.feature_points(f)?)? {
            out.remove(&t);
        }
    }
    Ok(out)
}

impl TinMesh {
    /// Planimetric area of the surface, voids excluded.
    pub fn surface_area(&self) -> Result<f64> {
        let excluded = void_triangles(self)?;
        Ok(self
            .triangles()
            .iter()
            .filter(|t| !excluded.contains(*t))
            .map(|t| self.triangle_area(t))
            .sum())
    }

    /// Planimetric area covered by void and hole features.
    pub fn void_area(&self) -> Result<f64> {
        Ok(void_triangles(self)?
            .iter()
            .map(|t| self.triangle_area(t))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TinSettings;

    fn grid(cells: usize) -> TinMesh {
        let n = cells + 1;
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                points.push(Point3::new(i as f64, j as f64, 0.0));
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
        TinMesh::from_triangles(points, &triangles, TinSettings::default()).unwrap()
    }

    fn at(mesh: &TinMesh, x: f64, y: f64) -> PointId {
        mesh.closest_point(x, y).unwrap()
    }

    #[test]
    fn flagged_hull_run_becomes_void() {
        let mut mesh = grid(4);
        for (x, y) in [(2.0, 0.0), (3.0, 0.0), (4.0, 0.0), (4.0, 1.0)] {
            let p = at(&mesh, x, y);
            mesh.node_mut(p).flags.insert(NodeFlags::VOID);
        }
        reconcile(&mut mesh).unwrap();
        assert_eq!(mesh.count_features(FeatureType::Void), 1);
        assert!(mesh.surface_area().unwrap() < 16.0);
    }

    #[test]
    fn short_flagged_run_is_ignored() {
        let mut mesh = grid(4);
        let p = at(&mesh, 2.0, 0.0);
        mesh.node_mut(p).flags.insert(NodeFlags::VOID);
        reconcile(&mut mesh).unwrap();
        assert_eq!(mesh.count_features(FeatureType::Void), 0);
        assert!(!mesh.is_void(p));
    }
}
